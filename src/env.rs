//! 统一的环境变量管理系统
//!
//! 为资源嵌入提供类型安全、可验证的环境变量配置

use std::env;
use std::fmt;

use url::Url;

use crate::core::{EmbedOptions, FanIn};
use crate::utils::url::EMPTY_IMAGE_DATA_URL;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "MONOLITH_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 资源嵌入相关环境变量
pub mod embed {
    use super::*;

    /// 单个资源超时
    pub struct Timeout;
    impl EnvVar<u64> for Timeout {
        const NAME: &'static str = "MONOLITH_EMBED_TIMEOUT";
        const DEFAULT: Option<u64> = Some(60);
        const DESCRIPTION: &'static str =
            "Per-resource fetch and decode timeout in seconds (0 disables)";

        fn parse(value: &str) -> EnvResult<u64> {
            let seconds: u64 = value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid number of seconds".to_string(),
            })?;

            if seconds > 3600 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Timeout too long (max 3600 seconds)".to_string(),
                });
            }

            Ok(seconds)
        }
    }

    /// 请求使用的 User-Agent
    pub struct UserAgent;
    impl EnvVar<Option<String>> for UserAgent {
        const NAME: &'static str = "MONOLITH_EMBED_USER_AGENT";
        const DEFAULT: Option<Option<String>> = Some(None);
        const DESCRIPTION: &'static str = "User-Agent header sent with resource requests";

        fn parse(value: &str) -> EnvResult<Option<String>> {
            let value = value.trim();
            if value.is_empty() {
                Ok(None)
            } else {
                Ok(Some(value.to_string()))
            }
        }
    }

    /// 忽略 TLS 证书错误
    pub struct Insecure;
    impl EnvVar<bool> for Insecure {
        const NAME: &'static str = "MONOLITH_EMBED_INSECURE";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Accept invalid TLS certificates";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 缓存击穿参数
    pub struct CacheBust;
    impl EnvVar<bool> for CacheBust {
        const NAME: &'static str = "MONOLITH_EMBED_CACHE_BUST";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str =
            "Append a timestamp query parameter to style resource requests";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 样式资源获取失败时的占位图
    pub struct ImagePlaceholder;
    impl EnvVar<Option<String>> for ImagePlaceholder {
        const NAME: &'static str = "MONOLITH_EMBED_IMAGE_PLACEHOLDER";
        const DEFAULT: Option<Option<String>> = Some(None);
        const DESCRIPTION: &'static str =
            "URL substituted for style resources that fail to load (\"empty\" for a blank PNG)";

        fn parse(value: &str) -> EnvResult<Option<String>> {
            let value = value.trim();
            if value.is_empty() {
                Ok(None)
            } else if value.eq_ignore_ascii_case("empty") {
                Ok(Some(EMPTY_IMAGE_DATA_URL.to_string()))
            } else {
                Ok(Some(value.to_string()))
            }
        }
    }

    /// 基准地址
    pub struct BaseUrl;
    impl EnvVar<Option<Url>> for BaseUrl {
        const NAME: &'static str = "MONOLITH_EMBED_BASE_URL";
        const DEFAULT: Option<Option<Url>> = Some(None);
        const DESCRIPTION: &'static str = "Base URL used to resolve relative resource references";

        fn parse(value: &str) -> EnvResult<Option<Url>> {
            if value.trim().is_empty() {
                return Ok(None);
            }
            Url::parse(value.trim()).map(Some).map_err(|e| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid URL '{}': {}", value, e),
            })
        }
    }

    /// 子节点汇合策略
    pub struct FanInPolicy;
    impl EnvVar<FanIn> for FanInPolicy {
        const NAME: &'static str = "MONOLITH_EMBED_FAN_IN";
        const DEFAULT: Option<FanIn> = Some(FanIn::BestEffort);
        const DESCRIPTION: &'static str =
            "Sibling fan-in policy: best-effort, all-or-nothing";

        fn parse(value: &str) -> EnvResult<FanIn> {
            match value.to_lowercase().replace('_', "-").as_str() {
                "best-effort" | "besteffort" => Ok(FanIn::BestEffort),
                "all-or-nothing" | "allornothing" | "strict" => Ok(FanIn::AllOrNothing),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid fan-in policy '{}'. Use: best-effort, all-or-nothing",
                        value
                    ),
                }),
            }
        }
    }
}

/// 辅助函数
fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!(
                "Invalid boolean value '{}'. Use: true/false, 1/0, yes/no, on/off, enabled/disabled",
                value
            ),
        }),
    }
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_level: String,
    pub base_url: Option<Url>,
    pub timeout: u64,
    pub user_agent: Option<String>,
    pub insecure: bool,
    pub cache_bust: bool,
    pub image_placeholder: Option<String>,
    pub fan_in: FanIn,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_level: core::LogLevel::get()?,
            base_url: embed::BaseUrl::get()?,
            timeout: embed::Timeout::get()?,
            user_agent: embed::UserAgent::get()?,
            insecure: embed::Insecure::get()?,
            cache_bust: embed::CacheBust::get()?,
            image_placeholder: embed::ImagePlaceholder::get()?,
            fan_in: embed::FanInPolicy::get()?,
        })
    }

    /// 转换为嵌入配置（取消令牌为新建的）
    pub fn into_options(self) -> EmbedOptions {
        EmbedOptions {
            base_url: self.base_url,
            cache_bust: self.cache_bust,
            image_placeholder: self.image_placeholder,
            insecure: self.insecure,
            timeout: self.timeout,
            user_agent: self.user_agent,
            fan_in: self.fan_in,
            ..Default::default()
        }
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        core::LogLevel::NAME,
        core::LogLevel::DESCRIPTION,
        "info"
    ));

    docs.push_str("\n## Embedding Configuration\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        embed::BaseUrl::NAME,
        embed::BaseUrl::DESCRIPTION,
        embed::BaseUrl::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        embed::Timeout::NAME,
        embed::Timeout::DESCRIPTION,
        embed::Timeout::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        embed::UserAgent::NAME,
        embed::UserAgent::DESCRIPTION,
        embed::UserAgent::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        embed::Insecure::NAME,
        embed::Insecure::DESCRIPTION,
        embed::Insecure::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        embed::CacheBust::NAME,
        embed::CacheBust::DESCRIPTION,
        embed::CacheBust::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        embed::ImagePlaceholder::NAME,
        embed::ImagePlaceholder::DESCRIPTION,
        embed::ImagePlaceholder::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {} (default: {:?})\n",
        embed::FanInPolicy::NAME,
        embed::FanInPolicy::DESCRIPTION,
        embed::FanInPolicy::DEFAULT
    ));

    docs
}
