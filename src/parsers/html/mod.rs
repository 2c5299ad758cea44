//! HTML 节点处理模块
//!
//! - `dom`: 基础DOM操作
//! - `style`: 内联样式模型与样式资源嵌入
//! - `element_handlers`: 携带图片引用的元素种类
//! - `assets`: 元素资源嵌入
//! - `dom_walker`: 递归遍历与嵌入协调
//! - `walker`: 使用默认协作者的入口函数

pub mod assets;
pub mod dom;
pub mod dom_walker;
pub mod element_handlers;
pub mod style;
pub mod walker;

pub use assets::embed_image_node;
pub use dom::{
    collect_children, find_nodes, get_node_attr, get_node_name, html_to_dom, is_element,
    set_node_attr,
};
pub use dom_walker::ImageEmbedder;
pub use element_handlers::{
    ImageElementHandler, ResourceElement, ResourceElementRegistry, SvgImageElementHandler,
};
pub use style::{
    embed_style_property, embed_style_resources, InlineStyle, StyleDeclaration,
    StyleResourceKind, STYLE_RESOURCE_PROPERTIES,
};
pub use walker::embed_images;
