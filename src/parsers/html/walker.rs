//! 图片嵌入入口
//!
//! 使用默认协作者（reqwest 会话、cssparser 样式解析器、`image` 解码器）
//! 遍历节点子树，把其中引用的外部图片全部内联。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use monolith_embed::parsers::html::{dom::html_to_dom, walker::embed_images};
//! use monolith_embed::EmbedOptions;
//!
//! let dom = html_to_dom(&html, "utf-8".to_string());
//! let options = EmbedOptions {
//!     base_url: Some(Url::parse("https://example.com/")?),
//!     timeout: 30,
//!     ..Default::default()
//! };
//! let report = embed_images(&dom.document, &options).await?;
//! ```

use std::rc::Rc;

use markup5ever_rcdom::Handle;

use crate::core::{EmbedError, EmbedOptions, EmbedReport};
use crate::network::session::Session;
use crate::parsers::css::CssResolver;
use crate::parsers::image::ImageDecoder;

use super::dom_walker::ImageEmbedder;

/// 内联子树中所有外部图片
///
/// 单个资源失败不会中断遍历；只有取消，以及在 `FanIn::AllOrNothing`
/// 下的子树失败会作为错误返回。
pub async fn embed_images(node: &Handle, options: &EmbedOptions) -> Result<EmbedReport, EmbedError> {
    let session = Rc::new(Session::new(options.clone())?);
    let resolver = CssResolver::new(session.clone());
    let embedder = ImageEmbedder::new(session, resolver, ImageDecoder, options.clone());

    embedder.run(node).await
}
