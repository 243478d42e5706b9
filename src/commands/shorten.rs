//! `/shorten`: shorten a URL through a shortening service.

use async_trait::async_trait;
use regex::RegexBuilder;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handler::{CommandError, CommandHandler, ServiceError};
use crate::message::{Message, Payload};

pub const TOKEN: &str = "/shorten";
pub const DESCRIPTION: &str = "Shorten the URL provided using a URL shortening service.";

pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/urlshortener/v1/url";

const INVALID_URL_ALERT: &str = "Well, that seems to be an invalid URL format. Can you fix that ?";

/// Scheme, optional `www.`, dotted host with a 2-5 letter TLD, optional
/// port and path.
const URL_PATTERN: &str = r"^(http://www\.|https://www\.|http://|https://)[a-z0-9]+([\-.][a-z0-9]+)*\.[a-z]{2,5}(:[0-9]{1,5})?(/.*)?$";

/// Strict URL shape check. Surrounding whitespace is ignored.
pub fn is_valid_url(text: &str) -> bool {
    RegexBuilder::new(URL_PATTERN)
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(text.trim()))
        .unwrap_or(false)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShortenRequest<'a> {
    long_url: &'a str,
}

/// Shortening service response.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShortLink {
    /// The short URL.
    pub id: String,
    #[serde(default)]
    pub long_url: Option<String>,
}

/// Back-end turning long URLs into short ones.
#[async_trait]
pub trait UrlShortener: Send + Sync {
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ServiceError>;
}

/// Shortener reached over HTTP: `POST {endpoint}[?key=...]` with
/// `{"longUrl": ...}`.
pub struct HttpUrlShortener {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpUrlShortener {
    pub fn with_endpoint(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl UrlShortener for HttpUrlShortener {
    async fn shorten(&self, long_url: &str) -> Result<ShortLink, ServiceError> {
        let mut request = self.client.post(&self.endpoint);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.json(&ShortenRequest { long_url }).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }

        response
            .json::<ShortLink>()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }
}

pub struct ShortenHandler {
    shortener: Arc<dyn UrlShortener>,
}

impl ShortenHandler {
    pub fn new(shortener: Arc<dyn UrlShortener>) -> Self {
        Self { shortener }
    }
}

#[async_trait]
impl CommandHandler for ShortenHandler {
    async fn execute(&self, args: &str) -> Result<Message, CommandError> {
        if !is_valid_url(args) {
            return Err(CommandError::usage(INVALID_URL_ALERT));
        }
        let url = args.trim();

        let link = self.shortener.shorten(url).await.map_err(|e| {
            let alert = format!("Oops, seems there was some error shortening the url: {}", e);
            CommandError::service(alert, e)
        })?;

        tracing::debug!("Shortened {} to {}", url, link.id);
        Ok(Message::command_result(
            TOKEN,
            format!("I have shortened your URL ({})", url),
            Payload::ShortUrl {
                id: link.id,
                long_url: url.to_string(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_url_shapes() {
        assert!(is_valid_url("https://example.com/page"));
        assert!(is_valid_url("http://www.example.co.uk"));
        assert!(is_valid_url("HTTPS://Example.COM:8080/a?b=c"));
        assert!(is_valid_url("  https://sub-domain.example.org/x  "));

        assert!(!is_valid_url("not-a-url"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("https://localhost"));
        assert!(!is_valid_url("example.com"));
        assert!(!is_valid_url("https://exa mple.com"));
    }

    #[tokio::test]
    async fn test_http_shortener_posts_long_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("key", "secret"))
            .and(body_json(serde_json::json!({ "longUrl": "https://example.com/page" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "kind": "urlshortener#url",
                "id": "https://goo.gl/abc",
                "longUrl": "https://example.com/page"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let shortener = HttpUrlShortener::with_endpoint(server.uri(), Some("secret".to_string()));
        let handler = ShortenHandler::new(Arc::new(shortener));
        let message = handler.execute(" https://example.com/page").await.unwrap();

        assert_eq!(message.command(), Some(TOKEN));
        assert_eq!(message.body, "I have shortened your URL (https://example.com/page)");
        assert_eq!(
            message.payload(),
            Some(&Payload::ShortUrl {
                id: "https://goo.gl/abc".to_string(),
                long_url: "https://example.com/page".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_service_error_names_the_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let handler = ShortenHandler::new(Arc::new(HttpUrlShortener::with_endpoint(server.uri(), None)));
        let err = handler.execute("https://example.com").await.unwrap_err();

        assert!(matches!(err, CommandError::Service { source: ServiceError::Status(403), .. }));
        assert!(err.alert().contains("403"));
    }

    #[tokio::test]
    async fn test_invalid_url_never_calls_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let handler = ShortenHandler::new(Arc::new(HttpUrlShortener::with_endpoint(server.uri(), None)));
        let err = handler.execute("not-a-url").await.unwrap_err();
        assert_eq!(err.alert(), INVALID_URL_ALERT);
    }
}
