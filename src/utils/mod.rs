//! # 工具模块
//!
//! 这个模块包含各种工具函数和实用程序：
//!
//! - URL处理和解析工具
//! - 数据URL创建和解析
//! - 本地资源句柄
//!
//! # 模块组织
//!
//! - `url` - URL处理、数据URL、资源句柄等工具函数

pub mod url;

// Re-export commonly used items for convenience
pub use self::url::{
    create_data_url, get_referer_url, is_data_url, parse_data_url, resolve_url, with_cache_bust,
    ResourceHandle, Url, EMPTY_IMAGE_DATA_URL,
};
