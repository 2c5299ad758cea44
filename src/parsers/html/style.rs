//! 内联样式处理
//!
//! `InlineStyle` 是元素 `style` 属性的有序声明列表，负责读取和回写单个属性；
//! 样式资源嵌入器在它之上把背景、遮罩等属性里引用的图片交给解析器内联。
//!
//! 声明的切分使用 cssparser 完成，所以引号或 `url()` 内部的分号
//! （例如 `url(data:image/png;base64,...)`）不会把一条声明截断。

use std::fmt;

use cssparser::{Delimiter, ParseError, Parser, ParserInput};
use markup5ever_rcdom::Handle;

use crate::core::{EmbedError, EmbedOptions, EmbedOutcome};
use crate::parsers::css::Resolver;

use super::dom::{get_node_attr, set_node_attr};

/// 单条样式声明
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleDeclaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// 元素的内联样式
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<StyleDeclaration>,
}

impl InlineStyle {
    /// 解析 `style` 属性文本
    ///
    /// 同名属性按层叠规则合并：`!important` 优先，同等优先级时后出现的生效。
    pub fn parse(css: &str) -> Self {
        let mut style = InlineStyle::default();
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);

        while !parser.is_exhausted() {
            let start = parser.position();
            let _ = parser.parse_until_before(Delimiter::Semicolon, |parser| {
                while parser.next_including_whitespace_and_comments().is_ok() {}
                Ok::<_, ParseError<'_, ()>>(())
            });
            let text = parser.slice_from(start);
            // 消耗分号
            let _ = parser.next();

            if let Some(declaration) = parse_declaration(text) {
                style.cascade(declaration);
            }
        }

        style
    }

    /// 读取节点的 `style` 属性，没有该属性时返回 `None`
    pub fn from_node(node: &Handle) -> Option<Self> {
        get_node_attr(node, "style").map(|css| InlineStyle::parse(&css))
    }

    pub fn declarations(&self) -> &[StyleDeclaration] {
        &self.declarations
    }

    /// 属性值，未声明时返回 `None`
    pub fn get_property_value(&self, name: &str) -> Option<&str> {
        let name = normalize_name(name);
        self.declarations
            .iter()
            .find(|declaration| declaration.name == name)
            .map(|declaration| declaration.value.as_str())
    }

    /// 属性是否带有 `!important`
    pub fn get_property_priority(&self, name: &str) -> bool {
        let name = normalize_name(name);
        self.declarations
            .iter()
            .any(|declaration| declaration.name == name && declaration.important)
    }

    /// 设置属性值，已存在时原位替换
    pub fn set_property(&mut self, name: &str, value: &str, important: bool) {
        let name = normalize_name(name);

        match self
            .declarations
            .iter_mut()
            .find(|declaration| declaration.name == name)
        {
            Some(declaration) => {
                declaration.value = value.to_string();
                declaration.important = important;
            }
            None => self.declarations.push(StyleDeclaration {
                name,
                value: value.to_string(),
                important,
            }),
        }
    }

    /// 写回节点的 `style` 属性
    pub fn write_to(&self, node: &Handle) {
        set_node_attr(node, "style", Some(self.to_string()));
    }

    fn cascade(&mut self, declaration: StyleDeclaration) {
        if let Some(index) = self
            .declarations
            .iter()
            .position(|existing| existing.name == declaration.name)
        {
            if self.declarations[index].important && !declaration.important {
                return;
            }
            self.declarations.remove(index);
        }
        self.declarations.push(declaration);
    }
}

impl fmt::Display for InlineStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, declaration) in self.declarations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", declaration.name, declaration.value)?;
            if declaration.important {
                f.write_str(" !important")?;
            }
        }
        Ok(())
    }
}

// 自定义属性（--foo）区分大小写
fn normalize_name(name: &str) -> String {
    let name = name.trim();
    if name.starts_with("--") {
        name.to_string()
    } else {
        name.to_ascii_lowercase()
    }
}

fn parse_declaration(text: &str) -> Option<StyleDeclaration> {
    let (name, value) = text.split_once(':')?;
    let name = normalize_name(name);
    if name.is_empty() {
        return None;
    }

    let mut value = value.trim();
    let mut important = false;

    if value.len() >= "important".len() {
        let split = value.len() - "important".len();
        if value.is_char_boundary(split) && value[split..].eq_ignore_ascii_case("important") {
            let rest = value[..split].trim_end();
            if let Some(rest) = rest.strip_suffix('!') {
                value = rest.trim_end();
                important = true;
            }
        }
    }

    Some(StyleDeclaration {
        name,
        value: value.to_string(),
        important,
    })
}

/// 可能引用图片的样式资源类别
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleResourceKind {
    Background,
    Mask,
}

/// 每个类别按顺序探测的属性：先简写属性，再对应的长属性
pub const STYLE_RESOURCE_PROPERTIES: &[(StyleResourceKind, &[&str])] = &[
    (
        StyleResourceKind::Background,
        &["background", "background-image"],
    ),
    (StyleResourceKind::Mask, &["mask", "mask-image"]),
];

/// 嵌入单个样式属性中的资源
///
/// 属性缺失或为空时返回 `Ok(None)`，表示未处理，调用方应继续探测下一个属性。
/// 解析器返回的值与原值相同则不回写。只要有引用未能嵌入，结果就是
/// `Failed`，即使占位图已经写回。
pub async fn embed_style_property<R: Resolver>(
    node: &Handle,
    property: &str,
    resolver: &R,
    options: &EmbedOptions,
) -> Result<Option<EmbedOutcome>, EmbedError> {
    let value = match InlineStyle::from_node(node)
        .as_ref()
        .and_then(|style| style.get_property_value(property))
    {
        Some(value) if !value.trim().is_empty() => value.to_string(),
        _ => return Ok(None),
    };

    let resolved = resolver
        .resolve(&value, options.base_url.as_ref(), options)
        .await?;

    if resolved.value != value {
        // 解析期间可能有其他声明被改写，重新读取后再写回
        let mut style = InlineStyle::from_node(node).unwrap_or_default();
        let important = style.get_property_priority(property);
        style.set_property(property, &resolved.value, important);
        style.write_to(node);
    }

    if resolved.has_failures() {
        return Ok(Some(EmbedOutcome::Failed(format!(
            "{}: {}",
            property,
            resolved.failures.join("; ")
        ))));
    }

    if resolved.value == value {
        tracing::debug!("样式属性 {} 无需改写", property);
        return Ok(Some(EmbedOutcome::Skipped));
    }

    tracing::debug!("样式属性 {} 已内联", property);
    Ok(Some(EmbedOutcome::Embedded))
}

/// 按资源类别嵌入节点内联样式中的全部图片
///
/// 各类别相互独立；同一类别内第一个被处理的属性之后不再探测其余属性。
pub async fn embed_style_resources<R: Resolver>(
    node: &Handle,
    resolver: &R,
    options: &EmbedOptions,
) -> Result<Vec<EmbedOutcome>, EmbedError> {
    let mut outcomes = Vec::new();

    if get_node_attr(node, "style").is_none() {
        return Ok(outcomes);
    }

    for (kind, properties) in STYLE_RESOURCE_PROPERTIES {
        for property in properties.iter() {
            if let Some(outcome) = embed_style_property(node, property, resolver, options).await? {
                tracing::trace!("{:?} 由 {} 处理", kind, property);
                outcomes.push(outcome);
                break;
            }
        }
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_declarations_with_priority() {
        let style = InlineStyle::parse("color: red; Background: url(a.png) !important;;margin:0");
        assert_eq!(style.declarations().len(), 3);
        assert_eq!(style.get_property_value("background"), Some("url(a.png)"));
        assert!(style.get_property_priority("background"));
        assert!(!style.get_property_priority("color"));
        assert_eq!(style.get_property_value("margin"), Some("0"));
    }

    #[test]
    fn semicolons_inside_urls_do_not_split() {
        let style =
            InlineStyle::parse("background-image: url(data:image/png;base64,AAAA); color: blue");
        assert_eq!(
            style.get_property_value("background-image"),
            Some("url(data:image/png;base64,AAAA)")
        );
        assert_eq!(style.get_property_value("color"), Some("blue"));
    }

    #[test]
    fn later_declarations_win_unless_important() {
        let style = InlineStyle::parse("color: red; color: blue");
        assert_eq!(style.get_property_value("color"), Some("blue"));

        let style = InlineStyle::parse("color: red !important; color: blue");
        assert_eq!(style.get_property_value("color"), Some("red"));
    }

    #[test]
    fn set_property_replaces_in_place() {
        let mut style = InlineStyle::parse("background: url(a.png); color: red");
        style.set_property("background", "url(\"data:image/png;base64,AAAA\")", true);
        style.set_property("mask", "none", false);

        assert_eq!(
            style.to_string(),
            "background: url(\"data:image/png;base64,AAAA\") !important; color: red; mask: none"
        );
    }

    #[test]
    fn ignores_malformed_declarations() {
        let style = InlineStyle::parse("garbage; : nothing; color: red");
        assert_eq!(style.declarations().len(), 1);
        assert_eq!(style.get_property_value("color"), Some("red"));
    }

    #[test]
    fn custom_properties_keep_case() {
        let style = InlineStyle::parse("--Accent: url(a.png)");
        assert_eq!(style.get_property_value("--Accent"), Some("url(a.png)"));
        assert_eq!(style.get_property_value("--accent"), None);
    }

    #[test]
    fn shorthand_is_tried_before_longhand() {
        for (_, properties) in STYLE_RESOURCE_PROPERTIES {
            assert_eq!(properties.len(), 2);
            assert!(properties[1].starts_with(properties[0]));
        }
    }
}
