//! 资源元素处理器模块
//!
//! 描述哪些元素携带可嵌入的图片引用、引用存放在哪个属性里，以及嵌入成功后
//! 如何改写元素。目前支持 HTML `<img>` 与 SVG `<image>` 两种元素。
//!
//! # 架构设计
//!
//! - `ResourceElement` trait 定义了元素种类的统一接口
//! - 各种具体处理器实现该 trait，处理特定元素类型
//! - `ResourceElementRegistry` 管理所有处理器，按注册顺序查找
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use monolith_embed::parsers::html::element_handlers::ResourceElementRegistry;
//!
//! let registry = ResourceElementRegistry::new();
//! if let Some(element) = registry.find(&node) {
//!     let source = element.source(&node);
//! }
//! ```

use markup5ever_rcdom::Handle;

use crate::utils::url::ResourceHandle;

use super::dom::{get_node_attr, is_html_element, is_svg_element, set_node_attr};

/// 携带图片引用的元素种类
pub trait ResourceElement {
    /// 处理器名称，用于日志
    fn name(&self) -> &'static str;

    /// 节点是否属于该种类
    fn matches(&self, node: &Handle) -> bool;

    /// 当前的资源引用
    fn source(&self, node: &Handle) -> Option<String>;

    /// 用本地句柄替换资源引用
    ///
    /// 调用时资源已经获取并解码成功，所有属性改写都在这一步同步完成。
    fn assign(&self, node: &Handle, handle: &ResourceHandle);
}

/// 把延迟加载改为立即加载
///
/// 必须在设置新的资源地址之前执行，否则某些渲染器仍会推迟加载。
fn mark_eager(node: &Handle) {
    if get_node_attr(node, "loading").is_some_and(|value| value.trim().eq_ignore_ascii_case("lazy"))
    {
        set_node_attr(node, "loading", Some("eager".to_string()));
    }
}

/// HTML `<img>` 元素
///
/// 引用在 `src` 中；嵌入后删除 `srcset`，防止渲染器改用其中的外部候选地址。
pub struct ImageElementHandler;

impl ResourceElement for ImageElementHandler {
    fn name(&self) -> &'static str {
        "img"
    }

    fn matches(&self, node: &Handle) -> bool {
        is_html_element(node, "img")
    }

    fn source(&self, node: &Handle) -> Option<String> {
        get_node_attr(node, "src")
    }

    fn assign(&self, node: &Handle, handle: &ResourceHandle) {
        mark_eager(node);
        set_node_attr(node, "srcset", None);
        set_node_attr(node, "src", Some(handle.to_string()));
    }
}

/// SVG `<image>` 元素
///
/// 引用在 `href` 或旧式的 `xlink:href` 中，两者本地名称相同，会被一起改写。
pub struct SvgImageElementHandler;

impl ResourceElement for SvgImageElementHandler {
    fn name(&self) -> &'static str {
        "svg:image"
    }

    fn matches(&self, node: &Handle) -> bool {
        is_svg_element(node, "image")
    }

    fn source(&self, node: &Handle) -> Option<String> {
        get_node_attr(node, "href")
    }

    fn assign(&self, node: &Handle, handle: &ResourceHandle) {
        mark_eager(node);
        set_node_attr(node, "href", Some(handle.to_string()));
    }
}

/// 资源元素处理器注册表
pub struct ResourceElementRegistry {
    handlers: Vec<Box<dyn ResourceElement>>,
}

impl ResourceElementRegistry {
    /// 创建注册了全部内置处理器的注册表
    pub fn new() -> Self {
        let mut registry = ResourceElementRegistry {
            handlers: Vec::new(),
        };

        registry.register(Box::new(ImageElementHandler));
        registry.register(Box::new(SvgImageElementHandler));

        registry
    }

    /// 注册新的处理器，先注册的优先
    pub fn register(&mut self, handler: Box<dyn ResourceElement>) {
        self.handlers.push(handler);
    }

    /// 查找能处理该节点的处理器
    pub fn find(&self, node: &Handle) -> Option<&dyn ResourceElement> {
        self.handlers
            .iter()
            .find(|handler| handler.matches(node))
            .map(|handler| handler.as_ref())
    }
}

impl Default for ResourceElementRegistry {
    fn default() -> Self {
        Self::new()
    }
}
