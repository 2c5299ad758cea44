use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::env::{EnvConfig, EnvResult};

/// 资源嵌入过程中可能出现的错误
///
/// 只有 `Cancelled` 会一路传播到调用方；元素级别的获取、解码、超时错误
/// 会在元素嵌入器内部被记录并吞掉。
#[derive(Error, Debug)]
pub enum EmbedError {
    /// 网络错误
    #[error("网络错误: {0}")]
    Network(#[from] reqwest::Error),

    /// 非 2xx 响应
    #[error("HTTP 状态错误: {url} 返回 {status}")]
    HttpStatus { url: String, status: u16 },

    /// 无法解析或不支持的 URL
    #[error("无效的 URL: {0}")]
    InvalidUrl(String),

    /// 图片解码失败
    #[error("图片解码失败: {0}")]
    Decode(String),

    /// 单个资源超时
    #[error("资源获取超时: {0}")]
    Timeout(String),

    /// 样式值解析失败
    #[error("样式资源解析失败: {0}")]
    Resolve(String),

    /// 本地文件读取错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 遍历被取消
    #[error("嵌入操作已取消")]
    Cancelled,
}

impl EmbedError {
    /// 是否为取消错误（取消错误永远不会被吞掉）
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EmbedError::Cancelled)
    }
}

impl From<url::ParseError> for EmbedError {
    fn from(error: url::ParseError) -> Self {
        EmbedError::InvalidUrl(error.to_string())
    }
}

/// 子节点汇合策略
///
/// 决定一组兄弟节点中某个子树返回错误时父节点如何处理。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FanIn {
    /// 记录失败的子树并继续（默认）
    #[default]
    BestEffort,
    /// 第一个失败的子树中止整组兄弟节点并向上传播
    AllOrNothing,
}

/// 资源嵌入配置
///
/// 在整个递归遍历中以引用方式传递，遍历期间不可变。
#[derive(Default, Clone, Debug)]
pub struct EmbedOptions {
    /// 用于解析相对地址，同时作为 Referer 发送
    pub base_url: Option<Url>,
    /// 为样式中的资源地址追加时间戳参数
    pub cache_bust: bool,
    /// 样式资源获取失败时的替代地址
    pub image_placeholder: Option<String>,
    pub insecure: bool,
    /// 单个资源（获取 + 解码）的超时秒数，0 表示不限制
    pub timeout: u64,
    pub user_agent: Option<String>,
    pub fan_in: FanIn,
    pub cancel: CancellationToken,
}

impl EmbedOptions {
    /// 从 `MONOLITH_EMBED_*` 环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(EnvConfig::from_env()?.into_options())
    }

    /// 单个资源的超时时间
    pub fn resource_timeout(&self) -> Option<Duration> {
        if self.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout))
        }
    }
}

/// 单个资源位置（样式属性或资源元素）的处理结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbedOutcome {
    /// 资源已被替换为本地句柄
    Embedded,
    /// 没有需要嵌入的内容
    Skipped,
    /// 嵌入失败，节点保持原状
    Failed(String),
}

/// 一次遍历的统计结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EmbedReport {
    pub nodes_visited: usize,
    pub embedded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// 在汇合时被吸收的子树错误数
    pub failed_subtrees: usize,
}

impl EmbedReport {
    pub fn record(&mut self, outcome: &EmbedOutcome) {
        match outcome {
            EmbedOutcome::Embedded => self.embedded += 1,
            EmbedOutcome::Skipped => self.skipped += 1,
            EmbedOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// 在超时和取消信号的约束下运行一次资源操作
///
/// 三者以先完成者为准：取消优先，其次是超时，最后才是操作本身的结果。
pub(crate) async fn run_guarded<T, Fut>(
    options: &EmbedOptions,
    label: &str,
    work: Fut,
) -> Result<T, EmbedError>
where
    Fut: Future<Output = Result<T, EmbedError>>,
{
    let bounded = async {
        match options.resource_timeout() {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(EmbedError::Timeout(label.to_string())),
            },
            None => work.await,
        }
    };

    tokio::select! {
        biased;
        _ = options.cancel.cancelled() => Err(EmbedError::Cancelled),
        result = bounded => result,
    }
}

const FILE_SIGNATURES: [[&[u8]; 2]; 9] = [
    [b"GIF87a", b"image/gif"],
    [b"GIF89a", b"image/gif"],
    [b"\xFF\xD8\xFF", b"image/jpeg"],
    [b"\x89PNG\x0D\x0A\x1A\x0A", b"image/png"],
    [b"<svg ", b"image/svg+xml"],
    [b"<?xml ", b"image/svg+xml"],
    [b"RIFF....WEBPVP8", b"image/webp"],
    [b"BM", b"image/bmp"],
    [b"\x00\x00\x01\x00", b"image/x-icon"],
];

/// 根据内容签名判断数据的媒体类型，失败时退回到文件扩展名
pub fn detect_media_type(data: &[u8], url: &Url) -> String {
    for signature in &FILE_SIGNATURES {
        let sig_bytes = signature[0];
        if data.len() >= sig_bytes.len()
            && sig_bytes
                .iter()
                .zip(data.iter())
                .all(|(expected, actual)| *expected == b'.' || expected == actual)
        {
            return String::from_utf8_lossy(signature[1]).to_string();
        }
    }

    detect_media_type_by_file_name(url.path())
}

/// 根据文件扩展名判断媒体类型
pub fn detect_media_type_by_file_name(filename: &str) -> String {
    let filename_lowercased = filename.to_lowercase();

    if filename_lowercased.ends_with(".svg") {
        "image/svg+xml".to_string()
    } else if filename_lowercased.ends_with(".png") {
        "image/png".to_string()
    } else if filename_lowercased.ends_with(".jpg") || filename_lowercased.ends_with(".jpeg") {
        "image/jpeg".to_string()
    } else if filename_lowercased.ends_with(".gif") {
        "image/gif".to_string()
    } else if filename_lowercased.ends_with(".webp") {
        "image/webp".to_string()
    } else if filename_lowercased.ends_with(".bmp") {
        "image/bmp".to_string()
    } else if filename_lowercased.ends_with(".ico") {
        "image/x-icon".to_string()
    } else {
        "application/octet-stream".to_string()
    }
}

/// 解析 Content-Type 头（或 data URL 的元数据部分）
pub fn parse_content_type(content_type: &str) -> (String, String, bool) {
    let mut media_type = String::new();
    let mut charset = String::new();
    let mut is_base64 = false;

    let parts: Vec<&str> = content_type.split(';').collect();

    if !parts.is_empty() {
        media_type = parts[0].trim().to_lowercase();
    }

    for part in parts.iter().skip(1) {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("charset=") {
            charset = value.trim_matches('"').to_string();
        } else if part == "base64" {
            is_base64 = true;
        }
    }

    (media_type, charset, is_base64)
}
