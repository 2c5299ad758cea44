// 集成测试公共模块
//
// 提供可控的获取器、样式解析器和解码器，以及 DOM 辅助函数

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::{Handle, NodeData, RcDom};
use url::Url;

use monolith_embed::env::EnvConfig;
use monolith_embed::{
    find_nodes, get_node_attr, html_to_dom, Decoder, EmbedError, EmbedOptions, FetchedResource,
    Fetcher, ImageEmbedder, InlineStyle, ResolvedValue, Resolver,
};

pub const BASE_URL: &str = "https://example.com/page/";

/// 按 `MONOLITH_LOG_LEVEL` 安装日志订阅者（只会成功一次）
pub fn init_tracing() {
    let level = EnvConfig::from_env()
        .map(|config| config.log_level)
        .unwrap_or_else(|_| "info".to_string());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(level))
        .with_test_writer()
        .try_init();
}

/// 1x1 的透明 PNG
pub fn pixel_png() -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbaImage::new(1, 1)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

pub fn options() -> EmbedOptions {
    EmbedOptions {
        base_url: Some(Url::parse(BASE_URL).unwrap()),
        ..Default::default()
    }
}

/// 可控的获取器
///
/// 默认对任何地址都返回一张 PNG；可以让指定文件名失败或延迟返回，
/// 并记录所有请求过的地址。
#[derive(Default)]
pub struct StubFetcher {
    requests: RefCell<Vec<String>>,
    failures: Vec<String>,
    delays: HashMap<String, Duration>,
    in_flight: Cell<usize>,
    max_in_flight: Cell<usize>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 路径以 `name` 结尾的请求返回 404
    pub fn failing(mut self, name: &str) -> Self {
        self.failures.push(name.to_string());
        self
    }

    /// 路径以 `name` 结尾的请求在 `delay` 之后才返回
    pub fn delayed(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// 同时进行中的最大请求数
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.get()
    }
}

impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, EmbedError> {
        self.requests.borrow_mut().push(url.to_string());
        self.in_flight.set(self.in_flight.get() + 1);
        self.max_in_flight
            .set(self.max_in_flight.get().max(self.in_flight.get()));

        let delay = self
            .delays
            .iter()
            .find(|(name, _)| url.path().ends_with(name.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.set(self.in_flight.get() - 1);

        if self
            .failures
            .iter()
            .any(|name| url.path().ends_with(name.as_str()))
        {
            return Err(EmbedError::HttpStatus {
                url: url.to_string(),
                status: 404,
            });
        }

        Ok(FetchedResource {
            data: pixel_png(),
            final_url: url.clone(),
            media_type: "image/png".to_string(),
            charset: String::new(),
        })
    }
}

/// 确定性的样式解析器
///
/// 把值包装成 `resolved(...)`；已经包装过的值原样返回。
/// 包含 `broken` 的值返回解析错误。
#[derive(Default)]
pub struct StubResolver {
    values: RefCell<Vec<String>>,
}

impl StubResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> Vec<String> {
        self.values.borrow().clone()
    }
}

impl Resolver for StubResolver {
    async fn resolve(
        &self,
        value: &str,
        _base_url: Option<&Url>,
        _options: &EmbedOptions,
    ) -> Result<ResolvedValue, EmbedError> {
        self.values.borrow_mut().push(value.to_string());

        if value.contains("broken") {
            return Err(EmbedError::Resolve(value.to_string()));
        }
        if value.starts_with("resolved(") {
            return Ok(ResolvedValue::new(value));
        }
        Ok(ResolvedValue::new(format!("resolved({})", value)))
    }
}

/// 接受一切数据的解码器，路径以 `rejected` 中的名称结尾时拒绝
#[derive(Default)]
pub struct StubDecoder {
    pub rejected: Vec<String>,
}

impl Decoder for StubDecoder {
    async fn decode(&self, resource: &FetchedResource) -> Result<(), EmbedError> {
        if self
            .rejected
            .iter()
            .any(|name| resource.final_url.path().ends_with(name.as_str()))
        {
            return Err(EmbedError::Decode(resource.final_url.to_string()));
        }
        Ok(())
    }
}

/// 使用桩协作者的嵌入器，返回共享的获取器以便检查请求
pub fn stub_embedder(
    fetcher: StubFetcher,
    options: EmbedOptions,
) -> (
    ImageEmbedder<StubFetcher, StubResolver, StubDecoder>,
    Rc<StubFetcher>,
) {
    let fetcher = Rc::new(fetcher);
    let embedder = ImageEmbedder::new(
        fetcher.clone(),
        StubResolver::new(),
        StubDecoder::default(),
        options,
    );
    (embedder, fetcher)
}

/// HTML 测试辅助
pub fn parse(html: &str) -> RcDom {
    html_to_dom(html.as_bytes(), "utf-8".to_string())
}

pub fn first(dom: &RcDom, name: &str) -> Handle {
    find_nodes(&dom.document, vec![name])
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no <{name}> in document"))
}

pub fn all(dom: &RcDom, name: &str) -> Vec<Handle> {
    find_nodes(&dom.document, vec![name])
}

/// 按 id 查找元素
pub fn by_id(dom: &RcDom, id: &str) -> Handle {
    fn visit(node: &Handle, id: &str) -> Option<Handle> {
        if get_node_attr(node, "id").as_deref() == Some(id) {
            return Some(node.clone());
        }
        node.children
            .borrow()
            .iter()
            .find_map(|child| visit(child, id))
    }

    visit(&dom.document, id).unwrap_or_else(|| panic!("no element with id {id}"))
}

pub fn attr(node: &Handle, name: &str) -> Option<String> {
    get_node_attr(node, name)
}

pub fn style_value(node: &Handle, property: &str) -> Option<String> {
    InlineStyle::from_node(node)
        .and_then(|style| style.get_property_value(property).map(str::to_string))
}

/// 整棵树所有元素属性的快照，用来比较两次遍历之间是否有改动
pub fn attribute_snapshot(dom: &RcDom) -> Vec<Vec<(String, String)>> {
    fn visit(node: &Handle, out: &mut Vec<Vec<(String, String)>>) {
        if let NodeData::Element { attrs, .. } = &node.data {
            out.push(
                attrs
                    .borrow()
                    .iter()
                    .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                    .collect(),
            );
        }
        for child in node.children.borrow().iter() {
            visit(child, out);
        }
    }

    let mut out = Vec::new();
    visit(&dom.document, &mut out);
    out
}
