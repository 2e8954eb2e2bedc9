// src/services/http_extractor.rs

//! Lightweight extractor: one HTTP GET, static markup.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::error::Result;
use crate::models::{ExtractionMethod, ScraperConfig};
use crate::services::content::extract_article;
use crate::services::extractor::{ContentExtractor, ExtractionResult};
use crate::services::media::{MediaKind, reference_block};
use crate::utils::http::{create_async_client, decode_body};

/// Fetches pages over plain HTTP and extracts the article region.
pub struct HttpExtractor {
    client: Client,
}

impl HttpExtractor {
    /// Create an extractor with a client built from the scraper settings.
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
        })
    }

    async fn fetch(&self, url: &str) -> Result<(Option<String>, Vec<u8>)> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        Ok((content_type, bytes.to_vec()))
    }
}

#[async_trait]
impl ContentExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> ExtractionResult {
        if let Some(kind) = MediaKind::from_url(url) {
            log::debug!("{} by extension, skipping fetch: {}", kind.label(), url);
            return ExtractionResult::success(
                reference_block(kind, url),
                ExtractionMethod::Lightweight,
            );
        }

        let (content_type, bytes) = match self.fetch(url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                log::debug!("Fetch failed for {}: {}", url, e);
                return ExtractionResult::failure(format!("Failed to fetch page: {e}"));
            }
        };

        if let Some(kind) = content_type.as_deref().and_then(MediaKind::from_content_type) {
            log::debug!("{} by content type, skipping parse: {}", kind.label(), url);
            return ExtractionResult::success(
                reference_block(kind, url),
                ExtractionMethod::Lightweight,
            );
        }

        let html = decode_body(content_type.as_deref(), &bytes);
        match extract_article(&html) {
            Ok(article) => ExtractionResult::success(article.html, ExtractionMethod::Lightweight),
            Err(reason) => ExtractionResult::failure(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    const ARTICLE_ZH: &str = "这是一篇用来测试编码转换的中文文章，内容需要足够长才能通过检查。\
        第二句话继续描述文章的主体内容，确保段落长度超过最低要求。\
        第三句话说明服务器返回的是国标编码而不是统一码格式的网页。\
        最后一句话结束这篇文章，并且同样保持足够的长度以便保留下来。";

    /// Serve one canned HTTP/1.1 response on a local port.
    async fn serve(status: &str, content_type: &str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{addr}/page")
    }

    fn local_extractor() -> HttpExtractor {
        let client = Client::builder()
            .no_proxy()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap();
        HttpExtractor { client }
    }

    #[tokio::test]
    async fn test_media_content_type_becomes_reference() {
        let url = serve("200 OK", "image/png", vec![0x89, b'P', b'N', b'G']).await;
        let result = local_extractor().extract(&url).await;

        match result {
            ExtractionResult::Success { text, method } => {
                assert_eq!(method, ExtractionMethod::Lightweight);
                assert!(text.contains("Image file: page"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let url = serve("404 Not Found", "text/html", b"<p>gone</p>".to_vec()).await;
        let result = local_extractor().extract(&url).await;

        match result {
            ExtractionResult::Failure { reason } => assert!(reason.contains("Failed to fetch page")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_gbk_page_is_decoded() {
        let html = format!(
            "<html><head><title>测试</title></head><body><article><p>{ARTICLE_ZH}</p></article></body></html>"
        );
        let (bytes, _, _) = encoding_rs::GBK.encode(&html);
        let url = serve("200 OK", "text/html; charset=gbk", bytes.into_owned()).await;

        let result = local_extractor().extract(&url).await;

        match result {
            ExtractionResult::Success { text, method } => {
                assert_eq!(method, ExtractionMethod::Lightweight);
                assert!(text.contains("国标编码"));
                assert!(text.contains("最后一句话"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_media_urls_skip_the_network() {
        let extractor = HttpExtractor::new(&ScraperConfig::default()).unwrap();
        // Unroutable host: a fetch attempt would fail
        let result = extractor.extract("http://invalid.invalid/cat.png").await;

        match result {
            ExtractionResult::Success { text, method } => {
                assert_eq!(method, ExtractionMethod::Lightweight);
                assert!(text.contains("Image file: cat.png"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_error_is_failure() {
        let mut config = ScraperConfig::default();
        config.timeout_secs = 2;
        let extractor = HttpExtractor::new(&config).unwrap();

        let result = extractor.extract("http://invalid.invalid/article").await;
        assert!(!result.is_success());
    }
}
