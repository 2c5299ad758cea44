//! 资源获取
//!
//! `Fetcher` 是遍历与网络之间唯一的边界。每次获取彼此独立，不共享状态；
//! 连接池等细节由具体实现自行处理。

use std::rc::Rc;

use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::Client;
use url::Url;

use crate::core::{detect_media_type, parse_content_type, EmbedError, EmbedOptions};
use crate::utils::url::{get_referer_url, parse_data_url};

/// 一次成功获取的资源
#[derive(Clone, Debug)]
pub struct FetchedResource {
    pub data: Vec<u8>,
    /// 重定向之后的最终地址
    pub final_url: Url,
    pub media_type: String,
    pub charset: String,
}

/// 资源获取器
///
/// 非 2xx 响应必须以错误返回。
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, EmbedError>;
}

impl<F: Fetcher + ?Sized> Fetcher for Rc<F> {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, EmbedError> {
        (**self).fetch(url).await
    }
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, EmbedError> {
        (**self).fetch(url).await
    }
}

/// 基于 reqwest 的默认获取器
///
/// 支持 `http`/`https`、`file` 和 `data` 三类地址。`file` 地址只允许在
/// 没有基础地址或基础地址本身也是 `file` 时读取，远程页面不能引用本地文件。
pub struct Session {
    client: Client,
    pub options: EmbedOptions,
}

impl Session {
    pub fn new(options: EmbedOptions) -> Result<Session, EmbedError> {
        let mut builder = Client::builder().danger_accept_invalid_certs(options.insecure);

        if let Some(timeout) = options.resource_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &options.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        Ok(Session {
            client: builder.build()?,
            options,
        })
    }

    async fn fetch_remote(&self, url: &Url) -> Result<FetchedResource, EmbedError> {
        let mut request = self.client.get(url.clone());

        if let Some(base_url) = &self.options.base_url {
            if base_url.scheme() == "http" || base_url.scheme() == "https" {
                request = request.header(REFERER, get_referer_url(base_url).as_str());
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let data = response.bytes().await?.to_vec();

        let (mut media_type, charset, _) = parse_content_type(&content_type);
        if media_type.is_empty() || media_type == "application/octet-stream" {
            media_type = detect_media_type(&data, &final_url);
        }

        tracing::debug!("已获取 {} ({}, {} 字节)", final_url, media_type, data.len());

        Ok(FetchedResource {
            data,
            final_url,
            media_type,
            charset,
        })
    }

    /// 当前文档是否允许引用本地文件
    fn allows_local_files(&self) -> bool {
        match &self.options.base_url {
            Some(base_url) => base_url.scheme() == "file",
            None => true,
        }
    }

    async fn fetch_local(&self, url: &Url) -> Result<FetchedResource, EmbedError> {
        if !self.allows_local_files() {
            tracing::warn!("拒绝在非本地文档中读取本地文件 {}", url);
            return Err(EmbedError::InvalidUrl(format!("远程文档不能引用本地文件: {}", url)));
        }

        let path = url
            .to_file_path()
            .map_err(|_| EmbedError::InvalidUrl(url.to_string()))?;
        let data = tokio::fs::read(&path).await?;
        let media_type = detect_media_type(&data, url);

        Ok(FetchedResource {
            data,
            final_url: url.clone(),
            media_type,
            charset: String::new(),
        })
    }
}

impl Fetcher for Session {
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, EmbedError> {
        match url.scheme() {
            "http" | "https" => self.fetch_remote(url).await,
            "file" => self.fetch_local(url).await,
            "data" => {
                let (media_type, charset, data) = parse_data_url(url);
                Ok(FetchedResource {
                    data,
                    final_url: url.clone(),
                    media_type,
                    charset,
                })
            }
            scheme => Err(EmbedError::InvalidUrl(format!(
                "不支持的协议 {}: {}",
                scheme, url
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_data_urls_without_network() {
        let session = Session::new(EmbedOptions::default()).unwrap();
        let url = Url::parse("data:image/gif;base64,R0lGODlh").unwrap();

        let resource = session.fetch(&url).await.unwrap();
        assert_eq!(resource.media_type, "image/gif");
        assert_eq!(resource.data, b"GIF89a");
    }

    #[tokio::test]
    async fn rejects_unsupported_schemes() {
        let session = Session::new(EmbedOptions::default()).unwrap();
        let url = Url::parse("ftp://example.com/a.png").unwrap();

        assert!(matches!(
            session.fetch(&url).await,
            Err(EmbedError::InvalidUrl(_))
        ));
    }
}
