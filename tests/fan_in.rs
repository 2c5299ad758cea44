//! 子节点汇合策略集成测试
//!
//! 样式解析错误会从所在节点向上传播，由父节点按汇合策略处理

mod common;

use monolith_embed::{is_data_url, EmbedError, EmbedOptions, FanIn};

use common::*;

const PAGE: &str = r#"
<div id="bad" style="background: url(broken.png)">
  <img id="inner" src="inner.png">
</div>
<img id="sibling" src="sibling.png">
"#;

#[tokio::test]
async fn best_effort_absorbs_failed_subtree() {
    let dom = parse(PAGE);
    let (embedder, fetcher) = stub_embedder(StubFetcher::new(), options());

    let report = embedder.run(&dom.document).await.unwrap();

    assert_eq!(report.failed_subtrees, 1);
    // 出错节点的子树不再继续处理
    assert_eq!(attr(&by_id(&dom, "inner"), "src").as_deref(), Some("inner.png"));
    assert!(is_data_url(&attr(&by_id(&dom, "sibling"), "src").unwrap()));
    assert_eq!(
        fetcher.requests(),
        vec!["https://example.com/page/sibling.png"]
    );
}

#[tokio::test]
async fn all_or_nothing_propagates_first_error() {
    let dom = parse(PAGE);
    let options = EmbedOptions {
        fan_in: FanIn::AllOrNothing,
        ..options()
    };
    let (embedder, _) = stub_embedder(StubFetcher::new(), options);

    let result = embedder.run(&dom.document).await;

    assert!(matches!(result, Err(EmbedError::Resolve(_))));
    assert_eq!(attr(&by_id(&dom, "inner"), "src").as_deref(), Some("inner.png"));
}

#[tokio::test]
async fn all_or_nothing_still_absorbs_element_failures() {
    let dom = parse(r#"<img id="a" src="missing.png"><img id="b" src="b.png">"#);
    let options = EmbedOptions {
        fan_in: FanIn::AllOrNothing,
        ..options()
    };
    let (embedder, _) = stub_embedder(StubFetcher::new().failing("missing.png"), options);

    let report = embedder.run(&dom.document).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.embedded, 1);
    assert!(is_data_url(&attr(&by_id(&dom, "b"), "src").unwrap()));
}

#[tokio::test]
async fn root_style_error_reaches_the_caller() {
    let dom = parse(PAGE);
    let (embedder, _) = stub_embedder(StubFetcher::new(), options());

    let result = embedder.run(&by_id(&dom, "bad")).await;

    assert!(matches!(result, Err(EmbedError::Resolve(_))));
}
