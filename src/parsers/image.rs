//! 图片解码校验
//!
//! 嵌入前确认获取到的字节确实是可渲染的图片，避免把错误页面或损坏的数据
//! 写进节点。

use crate::core::EmbedError;
use crate::network::session::FetchedResource;

/// 图片解码器
///
/// 解码成功才允许修改节点；失败由元素嵌入器记录并忽略。
#[allow(async_fn_in_trait)]
pub trait Decoder {
    async fn decode(&self, resource: &FetchedResource) -> Result<(), EmbedError>;
}

impl<D: Decoder + ?Sized> Decoder for &D {
    async fn decode(&self, resource: &FetchedResource) -> Result<(), EmbedError> {
        (**self).decode(resource).await
    }
}

/// 默认解码器：SVG 检查根元素，位图交给 `image` crate 完整解码
///
/// 支持的位图格式：PNG、JPEG、GIF、WebP、BMP、ICO、TIFF。AVIF 解码依赖系统
/// 的 dav1d 库，没有启用，这类图片会解码失败并保留原始引用。
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageDecoder;

impl Decoder for ImageDecoder {
    async fn decode(&self, resource: &FetchedResource) -> Result<(), EmbedError> {
        if is_svg(resource) {
            return if String::from_utf8_lossy(&resource.data).contains("<svg") {
                Ok(())
            } else {
                Err(EmbedError::Decode(format!(
                    "{} 不是有效的 SVG 文档",
                    resource.final_url
                )))
            };
        }

        let data = resource.data.clone();
        let url = resource.final_url.to_string();

        // 位图解码是 CPU 密集操作，放到阻塞线程池中执行
        tokio::task::spawn_blocking(move || ::image::load_from_memory(&data).map(|_| ()))
            .await
            .map_err(|e| EmbedError::Decode(format!("{}: {}", url, e)))?
            .map_err(|e| EmbedError::Decode(format!("{}: {}", url, e)))
    }
}

fn is_svg(resource: &FetchedResource) -> bool {
    if resource.media_type.eq_ignore_ascii_case("image/svg+xml") {
        return true;
    }

    let head = &resource.data[..resource.data.len().min(256)];
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}
