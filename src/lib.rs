//! # Monolith Embed
//!
//! 把一棵已经克隆好的 HTML/SVG 节点子树变成自包含的：内联样式中的背景和遮罩
//! 图片、`<img>` 元素以及 SVG `<image>` 元素引用的外部图片，都会被获取、解码
//! 并替换为 data URL，渲染时不再需要访问网络。
//!
//! 单个资源失败只影响它自己，其余节点照常处理。
//!
//! ## 模块组织
//!
//! - `core` - 配置、错误类型、处理结果与统计
//! - `env` - 环境变量配置
//! - `network` - 资源获取
//! - `parsers` - DOM 遍历、样式解析、图片解码
//! - `utils` - URL 与 data URL 工具函数
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use monolith_embed::{embed_images, html_to_dom, EmbedOptions};
//!
//! let dom = html_to_dom(&html, "utf-8".to_string());
//! let options = EmbedOptions::from_env()?;
//! let report = embed_images(&dom.document, &options).await?;
//! ```

pub mod core;
pub mod env;
pub mod network;
pub mod parsers;
pub mod utils;

// Re-export commonly used items for convenience
pub use self::core::{EmbedError, EmbedOptions, EmbedOutcome, EmbedReport, FanIn};
pub use env::{generate_env_docs, EnvConfig, EnvError};
pub use network::{FetchedResource, Fetcher, Session};
pub use parsers::html::{find_nodes, get_node_attr, html_to_dom, InlineStyle};
pub use parsers::{
    embed_css_value, embed_images, CssResolver, Decoder, ImageDecoder, ImageEmbedder, ResolvedValue,
    Resolver,
};
pub use utils::{is_data_url, ResourceHandle};
