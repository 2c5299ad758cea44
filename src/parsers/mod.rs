//! # 解析器模块
//!
//! 这个模块包含所有用于解析和处理不同类型web资源的功能：
//!
//! - HTML DOM 遍历与资源嵌入
//! - CSS 样式值中 `url()` 引用的解析与替换
//! - 图片数据的解码校验
//!
//! # 模块组织
//!
//! - `html` - DOM 操作、内联样式、资源元素、遍历器
//! - `css` - 样式值解析、URL 嵌入（`Resolver`）
//! - `image` - 图片解码校验（`Decoder`）

pub mod css;
pub mod html;
pub mod image;

// Re-export commonly used items for convenience
pub use css::{embed_css_value, CssResolver, ResolvedValue, Resolver};
pub use html::{embed_images, ImageEmbedder};
pub use self::image::{Decoder, ImageDecoder};
