//! CSS 解析器模块
//!
//! 此模块负责把样式值中引用的外部资源（`url(...)`）替换为内联的 data URL。
//! 使用 cssparser 进行词法分析，因此引号、转义和嵌套函数
//! （如 `image-set()`、渐变）中的引用都能被正确识别。
//!
//! # 处理流程
//!
//! 1. **收集**: 扫描样式值，记录每个 `url()` 在原文中的位置
//! 2. **获取**: 并发获取所有不同的外部地址
//! 3. **替换**: 按位置把获取成功的引用替换为 data URL，其余文本保持原样
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use monolith_embed::parsers::css::{CssResolver, Resolver};
//!
//! let resolver = CssResolver::new(Rc::new(session));
//! let resolved = resolver
//!     .resolve("url('bg.jpg') no-repeat", Some(&base_url), &options)
//!     .await?;
//! // resolved.value: "url(\"data:image/jpeg;base64,...\") no-repeat"
//! // resolved.failures: 未能嵌入的引用
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use cssparser::{serialize_string, ParseError, Parser, ParserInput, Token};
use futures::future::join_all;
use url::Url;

use crate::core::{run_guarded, EmbedError, EmbedOptions};
use crate::network::session::Fetcher;
use crate::utils::url::{is_data_url, resolve_url, with_cache_bust, ResourceHandle};

/// 解析后的样式值
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    /// 未能嵌入的引用，每项为 `地址: 原因`
    pub failures: Vec<String>,
}

impl ResolvedValue {
    /// 没有任何引用失败的结果
    pub fn new(value: impl Into<String>) -> Self {
        ResolvedValue {
            value: value.into(),
            failures: Vec::new(),
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// 样式值解析器
///
/// 给定一个可能包含外部资源引用的样式值，返回每个引用都被内联后的等价值。
/// 没有可嵌入内容时必须原样返回。单个资源获取失败不是错误，而是记录在
/// [`ResolvedValue::failures`] 中；只有无法恢复的情况（例如取消）才返回错误。
#[allow(async_fn_in_trait)]
pub trait Resolver {
    async fn resolve(
        &self,
        value: &str,
        base_url: Option<&Url>,
        options: &EmbedOptions,
    ) -> Result<ResolvedValue, EmbedError>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    async fn resolve(
        &self,
        value: &str,
        base_url: Option<&Url>,
        options: &EmbedOptions,
    ) -> Result<ResolvedValue, EmbedError> {
        (**self).resolve(value, base_url, options).await
    }
}

/// 默认解析器，与遍历共享同一个获取器
pub struct CssResolver<F> {
    fetcher: Rc<F>,
}

impl<F: Fetcher> CssResolver<F> {
    pub fn new(fetcher: Rc<F>) -> Self {
        CssResolver { fetcher }
    }
}

impl<F: Fetcher> Resolver for CssResolver<F> {
    async fn resolve(
        &self,
        value: &str,
        base_url: Option<&Url>,
        options: &EmbedOptions,
    ) -> Result<ResolvedValue, EmbedError> {
        embed_css_value(self.fetcher.as_ref(), value, base_url, options).await
    }
}

/// 样式值中一个 `url()` 出现的位置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlReference {
    /// `url(` 起始处的字节偏移
    pub start: usize,
    /// 右括号之后的字节偏移
    pub end: usize,
    pub url: String,
}

/// 格式化带引号的CSS字符串
pub fn format_quoted_string(string: &str) -> String {
    let mut res: String = "".to_string();
    let _ = serialize_string(string, &mut res);
    res
}

/// 判断引用是否需要嵌入：空值、片段引用和 data URL 都不需要
pub fn should_embed(url: &str) -> bool {
    let url = url.trim();
    !url.is_empty() && !url.starts_with('#') && !is_data_url(url)
}

/// 收集样式值中所有需要嵌入的 `url()` 引用
pub fn collect_url_references(value: &str) -> Vec<UrlReference> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let mut references = Vec::new();

    scan_tokens(&mut parser, &mut references);

    references.retain(|reference| should_embed(&reference.url));
    references
}

fn scan_tokens(parser: &mut Parser, references: &mut Vec<UrlReference>) {
    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        match token {
            // url(bg.png)
            Token::UnquotedUrl(url) => references.push(UrlReference {
                start,
                end: parser.position().byte_index(),
                url: url.to_string(),
            }),
            // url("bg.png")
            Token::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                let url = parser
                    .parse_nested_block(|parser| {
                        let url = match parser.next() {
                            Ok(Token::QuotedString(url)) => Some(url.to_string()),
                            _ => None,
                        };
                        Ok::<_, ParseError<'_, ()>>(url)
                    })
                    .ok()
                    .flatten();

                if let Some(url) = url {
                    references.push(UrlReference {
                        start,
                        end: parser.position().byte_index(),
                        url,
                    });
                }
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                let _ = parser.parse_nested_block(|parser| {
                    scan_tokens(parser, references);
                    Ok::<_, ParseError<'_, ()>>(())
                });
            }
            _ => {}
        }
    }
}

/// 按位置替换引用，未出现在 `replacements` 中的引用保持原样
pub fn rewrite_url_references(
    value: &str,
    references: &[UrlReference],
    replacements: &HashMap<String, String>,
) -> String {
    let mut result = String::with_capacity(value.len());
    let mut cursor = 0;

    for reference in references {
        if let Some(replacement) = replacements.get(&reference.url) {
            result.push_str(&value[cursor..reference.start]);
            result.push_str("url(");
            result.push_str(&format_quoted_string(replacement));
            result.push(')');
            cursor = reference.end;
        }
    }
    result.push_str(&value[cursor..]);

    result
}

/// 把样式值中的外部资源嵌入为 data URL
///
/// 同一地址只获取一次，不同地址并发获取。获取失败时使用
/// `options.image_placeholder`，未配置则保留原始引用；两种情况都会记入
/// 返回值的 `failures`。
pub async fn embed_css_value<F: Fetcher>(
    fetcher: &F,
    value: &str,
    base_url: Option<&Url>,
    options: &EmbedOptions,
) -> Result<ResolvedValue, EmbedError> {
    let references = collect_url_references(value);
    if references.is_empty() {
        return Ok(ResolvedValue::new(value));
    }

    let mut distinct: Vec<&str> = Vec::new();
    for reference in &references {
        if !distinct.contains(&reference.url.as_str()) {
            distinct.push(&reference.url);
        }
    }

    let results = join_all(
        distinct
            .iter()
            .map(|url| embed_reference(fetcher, url, base_url, options)),
    )
    .await;

    let mut replacements: HashMap<String, String> = HashMap::new();
    let mut failures = Vec::new();
    for (url, result) in distinct.iter().zip(results) {
        match result {
            Ok(handle) => {
                replacements.insert(url.to_string(), handle.into_string());
            }
            Err(EmbedError::Cancelled) => return Err(EmbedError::Cancelled),
            Err(error) => {
                tracing::warn!("样式资源 {} 嵌入失败: {}", url, error);
                if let Some(placeholder) = &options.image_placeholder {
                    replacements.insert(url.to_string(), placeholder.clone());
                }
                failures.push(format!("{}: {}", url, error));
            }
        }
    }

    Ok(ResolvedValue {
        value: rewrite_url_references(value, &references, &replacements),
        failures,
    })
}

async fn embed_reference<F: Fetcher>(
    fetcher: &F,
    reference: &str,
    base_url: Option<&Url>,
    options: &EmbedOptions,
) -> Result<ResourceHandle, EmbedError> {
    let resolved_url = resolve_url(base_url, reference)?;
    let request_url = if options.cache_bust {
        with_cache_bust(&resolved_url)
    } else {
        resolved_url.clone()
    };

    let resource = run_guarded(options, resolved_url.as_str(), fetcher.fetch(&request_url)).await?;

    Ok(ResourceHandle::from_resource(&resource).with_fragment(resolved_url.fragment()))
}
