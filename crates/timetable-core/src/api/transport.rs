//! The single HTTP GET the relay client needs, behind a trait so tests can
//! script relay behaviour without a network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::FetchError;

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET bounded by `timeout`. A timeout must come back as
    /// `FetchError::Timeout`, any other transport failure as `Network`.
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError>;
}

/// Production transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("sicsr-timetable/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError> {
        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(HttpResponse { status, body })
        };

        match tokio::time::timeout(timeout, request).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(FetchError::Timeout(timeout.as_secs())),
            Ok(Err(e)) => Err(FetchError::from(e)),
            Err(_) => Err(FetchError::Timeout(timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_success() {
        let ok = HttpResponse { status: 200, body: String::new() };
        let moved = HttpResponse { status: 301, body: String::new() };
        let bad = HttpResponse { status: 503, body: String::new() };
        assert!(ok.is_success());
        assert!(!moved.is_success());
        assert!(!bad.is_success());
    }
}
