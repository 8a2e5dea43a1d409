//! Cover thumbnail generation is someone else's job; the library only tells
//! them a new document has arrived.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub type CoverHandle = Arc<dyn CoverNotifier + Send + Sync>;

/// Downstream hook fired after a document has been stored and recorded.
#[async_trait]
pub trait CoverNotifier: Send + Sync {
    /// Announce the document `id` whose payload lives at storage key `path`.
    async fn notify(&self, id: &str, path: &str) -> Result<()>;
}

/// Notifier for deployments without a cover service.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl CoverNotifier for NoopNotifier {
    async fn notify(&self, _id: &str, _path: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct ThumbnailRequest<'a> {
    id: &'a str,
    path: &'a str,
}

/// POSTs `{"id", "path"}` to `<endpoint>/thumbnail/` and expects `201 Created`.
#[derive(Debug, Clone)]
pub struct HttpCoverNotifier {
    client: Client,
    url: String,
}

impl HttpCoverNotifier {
    /// An endpoint given without a scheme is assumed to be HTTPS.
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .or_raise(|| ErrorKind::Notification("could not build HTTP client".to_string()))?;
        Ok(Self { client, url: thumbnail_url(endpoint) })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn thumbnail_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    let base = match endpoint.contains("http") {
        true => endpoint.to_string(),
        false => format!("https://{endpoint}"),
    };
    format!("{}/thumbnail/", base.trim_end_matches('/'))
}

#[async_trait]
impl CoverNotifier for HttpCoverNotifier {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn notify(&self, id: &str, path: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&ThumbnailRequest { id, path })
            .send()
            .await
            .or_raise(|| ErrorKind::Notification(format!("POST {} failed", self.url)))?;
        match response.status() {
            StatusCode::CREATED => Ok(()),
            status => exn::bail!(ErrorKind::Notification(format!("POST {} returned {status}", self.url))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[rstest]
    #[case("covers.internal", "https://covers.internal/thumbnail/")]
    #[case("covers.internal/", "https://covers.internal/thumbnail/")]
    #[case("http://localhost:8080", "http://localhost:8080/thumbnail/")]
    #[case("https://covers.example.com/api/", "https://covers.example.com/api/thumbnail/")]
    fn builds_thumbnail_url(#[case] endpoint: &str, #[case] expected: &str) {
        assert_eq!(thumbnail_url(endpoint), expected);
    }

    /// Accept one connection, capture the request body and answer with
    /// `status_line`.
    async fn fake_server(status_line: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 1024];
            let body_start = loop {
                let read = socket.read(&mut buffer).await.unwrap();
                request.extend_from_slice(&buffer[..read]);
                if let Some(at) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break at + 4;
                }
            };
            let head = String::from_utf8_lossy(&request[..body_start]).to_ascii_lowercase();
            let length: usize = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|value| value.trim().parse().unwrap())
                .unwrap_or(0);
            while request.len() < body_start + length {
                let read = socket.read(&mut buffer).await.unwrap();
                request.extend_from_slice(&buffer[..read]);
            }
            let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request[body_start..]).into_owned());
        });
        (format!("http://{address}"), rx)
    }

    #[tokio::test]
    async fn posts_document_to_thumbnail_endpoint() {
        let (endpoint, body) = fake_server("201 Created").await;
        let notifier = HttpCoverNotifier::new(&endpoint).unwrap();
        notifier.notify("doc-1", "rust-book.pdf").await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&body.await.unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"id": "doc-1", "path": "rust-book.pdf"}));
    }

    #[tokio::test]
    async fn anything_but_created_is_an_error() {
        let (endpoint, _body) = fake_server("200 OK").await;
        let notifier = HttpCoverNotifier::new(&endpoint).unwrap();
        let err = notifier.notify("doc-1", "rust-book.pdf").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Notification(message) if message.contains("200")));
    }

    #[tokio::test]
    async fn noop_always_succeeds() {
        NoopNotifier.notify("doc-1", "rust-book.pdf").await.unwrap();
    }
}
