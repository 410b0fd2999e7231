use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_HEADERS_LATENCY, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, IMAGE_REQUESTS,
};
use crate::types::{ChatCompletion, ChatRequest, ImageRequest, ImageResponse};

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";

/// A response body delivered incrementally.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Anything that can answer a chat completion request.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send `request` and return the response body once a success status has
    /// been received.
    ///
    /// # Errors
    ///
    /// Transport failures and non-2xx statuses fail here, before any of the
    /// body is handed out.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// Send a request and read the whole body as text.
    async fn complete_raw(&self, request: &ChatRequest) -> Result<String> {
        read_body(self.open(request).await?).await
    }

    /// Send a non-streaming request and decode the completion.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let body = self.complete_raw(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}

/// Read a whole response body as UTF-8 text.
pub async fn read_body(body: ByteStream) -> Result<String> {
    let chunks: Vec<Bytes> = body.try_collect().await?;
    let text = String::from_utf8(chunks.concat()).map_err(|e| e.utf8_error())?;
    Ok(text)
}

/// Client for the OpenAI API.
#[derive(Debug, Clone)]
pub struct OpenAi {
    api_key: String,
    client: ReqwestClient,
    base_url: Url,
    timeout: Option<Duration>,
}

impl OpenAi {
    /// Create a new client for the public endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// Without a timeout a hung connection blocks until the server gives up.
    pub fn with_options(
        api_key: impl Into<String>,
        base_url: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::authentication(
                "no API token configured; run `cligpt token` first",
            ));
        }

        let base_url = base_url.unwrap_or(DEFAULT_API_URL);
        // Url::join drops the last path segment unless it ends with a slash.
        let base_url = if base_url.ends_with('/') {
            Url::parse(base_url)?
        } else {
            Url::parse(&format!("{base_url}/"))?
        };

        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {}", e),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
        })
    }

    /// The base URL endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            Error::configuration(
                "API token contains characters not allowed in a header",
                Some("token".to_string()),
            )
        })?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Turn a non-success response into an error carrying the server's body.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        // Pretty-print JSON bodies; anything else is passed through as is
        let message = serde_json::from_str::<serde_json::Value>(&error_body)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .unwrap_or(error_body);

        match status_code {
            401 => Error::authentication(message),
            _ => Error::api(status_code, message),
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        accept: &'static str,
    ) -> Result<Response> {
        let url = self.base_url.join(path)?;
        let mut headers = self.default_headers()?;
        headers.insert(header::ACCEPT, HeaderValue::from_static(accept));

        CLIENT_REQUESTS.click();
        let start = Instant::now();
        tracing::debug!(%url, "sending request");
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_connect() || e.is_timeout() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;
        CLIENT_HEADERS_LATENCY.add(start.elapsed().as_secs_f64());

        let status = response.status();
        tracing::debug!(status = status.as_u16(), "response headers received");
        if !status.is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(status = status.as_u16(), "request rejected");
            return Err(err);
        }
        Ok(response)
    }

    /// Generate images from a text prompt.
    pub async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse> {
        request.validate()?;
        IMAGE_REQUESTS.click();
        let response = self
            .post("images/generations", request, "application/json")
            .await?;
        response.json::<ImageResponse>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAi {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream> {
        let accept = if request.stream {
            "text/event-stream"
        } else {
            "application/json"
        };
        let response = self.post("chat/completions", request, accept).await?;
        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                Error::connection(
                    format!("Failed to read response body: {}", e),
                    Some(Box::new(e)),
                )
            })
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KnownModel, Message};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one request with a canned response; the handle yields
    /// the raw request text.
    async fn serve_once(status: &str, content_type: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v1/", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let lower = line.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (base, handle)
    }

    fn request(stream: bool) -> ChatRequest {
        ChatRequest::new(
            KnownModel::Gpt35Turbo.into(),
            vec![Message::user("Hello")],
            stream,
        )
    }

    #[test]
    fn test_client_creation() {
        let client = OpenAi::new("sk-test").unwrap();
        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url.as_str(), DEFAULT_API_URL);
        assert_eq!(client.timeout, None);

        let client = OpenAi::with_options(
            "sk-test",
            Some("https://proxy.example.com/openai/v1"),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.base_url.as_str(), "https://proxy.example.com/openai/v1/");
        assert_eq!(
            client.base_url.join("chat/completions").unwrap().as_str(),
            "https://proxy.example.com/openai/v1/chat/completions"
        );
        assert_eq!(client.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn empty_token_is_rejected() {
        let err = OpenAi::new("").unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn complete_sends_bearer_and_parses_reply() {
        let (base, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hello!"},"finish_reason":"stop"}]}"#,
        )
        .await;
        let client = OpenAi::with_options("sk-test", Some(&base), None).unwrap();
        let completion = client.complete(&request(false)).await.unwrap();
        assert_eq!(completion.into_content().unwrap(), "Hello!");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions "), "{raw}");
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(raw.contains(r#""stream":false"#));
        assert!(!raw.contains("temperature"));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication() {
        let (base, _server) = serve_once(
            "401 Unauthorized",
            "application/json",
            r#"{"error":{"message":"Incorrect API key provided"}}"#,
        )
        .await;
        let client = OpenAi::with_options("sk-bad", Some(&base), None).unwrap();
        let err = match client.open(&request(true)).await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(err.is_configuration());
        assert_eq!(err.status_code(), Some(401));
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn server_error_carries_body() {
        let (base, _server) = serve_once("503 Service Unavailable", "text/plain", "overloaded").await;
        let client = OpenAi::with_options("sk-test", Some(&base), None).unwrap();
        let err = client.complete_raw(&request(false)).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.status_code(), Some(503));
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn open_streams_body() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"},\"finish_reason\":\"stop\"}]}\n\n";
        let (base, _server) = serve_once("200 OK", "text/event-stream", body).await;
        let client = OpenAi::with_options("sk-test", Some(&base), None).unwrap();
        let stream = client.open(&request(true)).await.unwrap();
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), body.as_bytes());
    }

    #[tokio::test]
    async fn generate_image_posts_to_images_endpoint() {
        let (base, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"created":1,"data":[{"url":"https://images.example.com/1.png"}]}"#,
        )
        .await;
        let client = OpenAi::with_options("sk-test", Some(&base), None).unwrap();
        let response = client
            .generate_image(&ImageRequest::new("a red fox"))
            .await
            .unwrap();
        assert_eq!(
            response.urls().collect::<Vec<_>>(),
            vec!["https://images.example.com/1.png"]
        );
        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1/images/generations "), "{raw}");
        assert!(raw.contains(r#""size":"1024x1024""#));
    }

    #[tokio::test]
    async fn invalid_image_request_is_not_sent() {
        let client = OpenAi::with_options("sk-test", Some("http://127.0.0.1:9/"), None).unwrap();
        let err = client
            .generate_image(&ImageRequest::new("fox").with_count(0))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
