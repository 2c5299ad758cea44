//! # 网络模块
//!
//! 这个模块包含资源获取相关的功能：
//!
//! - `Fetcher` 抽象，遍历只通过它访问网络
//! - 基于 reqwest 的默认实现 `Session`
//!
//! # 模块组织
//!
//! - `session` - HTTP会话管理、请求处理、资源下载

pub mod session;

// Re-export commonly used items for convenience
pub use session::{FetchedResource, Fetcher, Session};
