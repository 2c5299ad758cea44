//! 元素资源嵌入
//!
//! 把 `<img>` 和 SVG `<image>` 引用的图片获取、解码并替换为 data URL。
//!
//! 单个元素的任何失败（网络、状态码、解码、超时）都只影响该元素：错误被记录
//! 后丢弃，元素保持原状。取消是唯一的例外，会继续向上传播让整个遍历停止。

use markup5ever_rcdom::Handle;

use crate::core::{run_guarded, EmbedError, EmbedOptions, EmbedOutcome};
use crate::network::session::Fetcher;
use crate::parsers::image::Decoder;
use crate::utils::url::{is_data_url, resolve_url, ResourceHandle};

use super::element_handlers::ResourceElementRegistry;

/// 嵌入资源元素引用的图片
///
/// 节点不是资源元素时返回 `Ok(None)`，且不发生任何 I/O。
/// 引用为空或已经是 data URL 时返回 `Skipped`。
pub async fn embed_image_node<F, D>(
    node: &Handle,
    registry: &ResourceElementRegistry,
    fetcher: &F,
    decoder: &D,
    options: &EmbedOptions,
) -> Result<Option<EmbedOutcome>, EmbedError>
where
    F: Fetcher,
    D: Decoder,
{
    let Some(element) = registry.find(node) else {
        return Ok(None);
    };

    let source = match element.source(node) {
        Some(source) if !source.trim().is_empty() && !is_data_url(&source) => source,
        _ => return Ok(Some(EmbedOutcome::Skipped)),
    };

    match retrieve_image(&source, fetcher, decoder, options).await {
        Ok(handle) => {
            // 改写在一个同步步骤内完成，中间没有挂起点
            element.assign(node, &handle);
            tracing::debug!("{} 已嵌入: {}", element.name(), source);
            Ok(Some(EmbedOutcome::Embedded))
        }
        Err(EmbedError::Cancelled) => Err(EmbedError::Cancelled),
        Err(error) => {
            tracing::warn!("{} 嵌入失败，保留原始引用 {}: {}", element.name(), source, error);
            Ok(Some(EmbedOutcome::Failed(error.to_string())))
        }
    }
}

/// 获取并解码，成功后返回本地句柄
///
/// 获取与解码作为一个整体受单资源超时和取消信号约束。
async fn retrieve_image<F: Fetcher, D: Decoder>(
    source: &str,
    fetcher: &F,
    decoder: &D,
    options: &EmbedOptions,
) -> Result<ResourceHandle, EmbedError> {
    let url = resolve_url(options.base_url.as_ref(), source)?;

    run_guarded(options, url.as_str(), async {
        let resource = fetcher.fetch(&url).await?;
        decoder.decode(&resource).await?;
        Ok(ResourceHandle::from_resource(&resource).with_fragment(url.fragment()))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::session::FetchedResource;
    use crate::parsers::html::dom::{find_nodes, get_node_attr, html_to_dom};
    use std::cell::Cell;
    use url::Url;

    struct CountingFetcher {
        calls: Cell<usize>,
    }

    impl Fetcher for CountingFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedResource, EmbedError> {
            self.calls.set(self.calls.get() + 1);
            Ok(FetchedResource {
                data: b"GIF89a".to_vec(),
                final_url: url.clone(),
                media_type: "image/gif".to_string(),
                charset: String::new(),
            })
        }
    }

    struct AcceptAll;

    impl Decoder for AcceptAll {
        async fn decode(&self, _resource: &FetchedResource) -> Result<(), EmbedError> {
            Ok(())
        }
    }

    struct RejectAll;

    impl Decoder for RejectAll {
        async fn decode(&self, resource: &FetchedResource) -> Result<(), EmbedError> {
            Err(EmbedError::Decode(resource.final_url.to_string()))
        }
    }

    fn options() -> EmbedOptions {
        EmbedOptions {
            base_url: Some(Url::parse("https://example.com/page/").unwrap()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn skips_data_urls_without_fetching() {
        let dom = html_to_dom(b"<img src='data:image/gif;base64,R0lGODlh'>", "utf-8".to_string());
        let img = &find_nodes(&dom.document, vec!["img"])[0];
        let fetcher = CountingFetcher { calls: Cell::new(0) };

        let outcome = embed_image_node(
            img,
            &ResourceElementRegistry::new(),
            &fetcher,
            &AcceptAll,
            &options(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, Some(EmbedOutcome::Skipped));
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[tokio::test]
    async fn non_resource_elements_are_ignored() {
        let dom = html_to_dom(b"<p style='x'>text</p>", "utf-8".to_string());
        let p = &find_nodes(&dom.document, vec!["p"])[0];
        let fetcher = CountingFetcher { calls: Cell::new(0) };

        let outcome = embed_image_node(
            p,
            &ResourceElementRegistry::new(),
            &fetcher,
            &AcceptAll,
            &options(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, None);
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[tokio::test]
    async fn decode_failure_leaves_node_untouched() {
        let dom = html_to_dom(
            b"<img src=a.gif srcset='b.gif 2x' loading=lazy>",
            "utf-8".to_string(),
        );
        let img = &find_nodes(&dom.document, vec!["img"])[0];
        let fetcher = CountingFetcher { calls: Cell::new(0) };

        let outcome = embed_image_node(
            img,
            &ResourceElementRegistry::new(),
            &fetcher,
            &RejectAll,
            &options(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, Some(EmbedOutcome::Failed(_))));
        assert_eq!(get_node_attr(img, "src").as_deref(), Some("a.gif"));
        assert_eq!(get_node_attr(img, "srcset").as_deref(), Some("b.gif 2x"));
        assert_eq!(get_node_attr(img, "loading").as_deref(), Some("lazy"));
    }

    #[tokio::test]
    async fn relative_source_without_base_fails_softly() {
        let dom = html_to_dom(b"<img src=a.gif>", "utf-8".to_string());
        let img = &find_nodes(&dom.document, vec!["img"])[0];
        let fetcher = CountingFetcher { calls: Cell::new(0) };

        let outcome = embed_image_node(
            img,
            &ResourceElementRegistry::new(),
            &fetcher,
            &AcceptAll,
            &EmbedOptions::default(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, Some(EmbedOutcome::Failed(_))));
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[tokio::test]
    async fn cancellation_is_not_swallowed() {
        let dom = html_to_dom(b"<img src=a.gif>", "utf-8".to_string());
        let img = &find_nodes(&dom.document, vec!["img"])[0];
        let fetcher = CountingFetcher { calls: Cell::new(0) };
        let options = options();
        options.cancel.cancel();

        let result = embed_image_node(
            img,
            &ResourceElementRegistry::new(),
            &fetcher,
            &AcceptAll,
            &options,
        )
        .await;

        assert!(matches!(result, Err(EmbedError::Cancelled)));
        assert_eq!(get_node_attr(img, "src").as_deref(), Some("a.gif"));
    }
}
