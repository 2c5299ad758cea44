use std::fmt;

use base64::{prelude::BASE64_STANDARD, Engine};
use chrono::Utc;
use percent_encoding::percent_decode_str;
pub use url::Url;

use crate::core::{detect_media_type, parse_content_type, EmbedError};
use crate::network::session::FetchedResource;

pub const EMPTY_IMAGE_DATA_URL: &str = "data:image/png;base64,\
iVBORw0KGgoAAAANSUhEUgAAAA0AAAANCAQAAADY4iz3AAAAEUlEQVR42mNkwAkYR6UolgIACvgADsuK6xYAAAAASUVORK5CYII=";

/// 判断一个地址是否已经是内联的 data URL
pub fn is_data_url(value: &str) -> bool {
    value
        .trim_start()
        .get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// 将资源数据编码为 data URL 字符串
///
/// 媒体类型为空时根据内容签名推断；US-ASCII 字符集不写入。
pub fn create_data_url(media_type: &str, charset: &str, data: &[u8], final_asset_url: &Url) -> String {
    let media_type: String = if media_type.is_empty() {
        detect_media_type(data, final_asset_url)
    } else {
        media_type.to_string()
    };

    let charset = charset.trim();
    let c: String = if !charset.is_empty() && !charset.eq_ignore_ascii_case("US-ASCII") {
        format!(";charset={}", charset)
    } else {
        String::new()
    };

    format!("data:{}{};base64,{}", media_type, c, BASE64_STANDARD.encode(data))
}

/// 解析 data URL，返回 (媒体类型, 字符集, 数据)
pub fn parse_data_url(url: &Url) -> (String, String, Vec<u8>) {
    let path: &str = url.path();
    let comma_loc: usize = path.find(',').unwrap_or(path.len());
    let meta_data: &str = &path[..comma_loc];
    let raw_data: &str = path.get(comma_loc + 1..).unwrap_or("");

    let (mut media_type, mut charset, is_base64) = parse_content_type(meta_data);

    // Parse media type
    if media_type.is_empty() {
        media_type = "text/plain".to_string();
        if charset.is_empty() {
            charset = "US-ASCII".to_string();
        }
    }

    let bytes: Vec<u8> = percent_decode_str(raw_data).collect();
    let blob: Vec<u8> = if is_base64 {
        let text: String = bytes
            .iter()
            .filter(|b| !b.is_ascii_whitespace())
            .map(|b| *b as char)
            .collect();
        BASE64_STANDARD.decode(text).unwrap_or_default()
    } else {
        bytes
    };

    (media_type, charset, blob)
}

/// 将资源引用解析为绝对地址
///
/// 引用本身是绝对地址时直接使用，否则基于 `base_url` 拼接；
/// 相对引用且没有基准地址时返回错误。
pub fn resolve_url(base_url: Option<&Url>, reference: &str) -> Result<Url, EmbedError> {
    let reference = reference.trim();

    match Url::parse(reference) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => match base_url {
            Some(base_url) => Ok(base_url.join(reference)?),
            None => Err(EmbedError::InvalidUrl(format!(
                "相对地址缺少基准地址: {}",
                reference
            ))),
        },
        Err(error) => Err(error.into()),
    }
}

/// 去掉凭据和片段，生成可以作为 Referer 发送的地址
pub fn get_referer_url(url: &Url) -> Url {
    let mut url = url.clone();
    // https://httpwg.org/specs/rfc9110.html#field.referer
    // If the reference URI contains credentials or a fragment, they must not be sent
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_fragment(None);
    url
}

/// 追加时间戳查询参数以绕过中间缓存
pub fn with_cache_bust(url: &Url) -> Url {
    let mut url = url.clone();
    let stamp = Utc::now().timestamp_millis().to_string();

    let query = match url.query() {
        Some(query) if !query.is_empty() => format!("{}&{}", query, stamp),
        _ => stamp,
    };
    url.set_query(Some(&query));

    url
}

/// 指向已获取资源字节的本地句柄
///
/// 句柄是一个自包含的 data URL，不依赖任何进程内状态，因此不需要释放。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    pub fn from_resource(resource: &FetchedResource) -> Self {
        ResourceHandle(create_data_url(
            &resource.media_type,
            &resource.charset,
            &resource.data,
            &resource.final_url,
        ))
    }

    /// 保留原始引用中的片段标识符（例如 SVG sprite 的 `#icon`）
    pub fn with_fragment(mut self, fragment: Option<&str>) -> Self {
        if let Some(fragment) = fragment {
            self.0.push('#');
            self.0.push_str(fragment);
        }
        self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
