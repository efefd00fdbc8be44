use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use tracing::debug;

use crate::USER_AGENT;

/// Connection-level failures, distinguished so the log tells an unreachable
/// host apart from a slow one. Either way the cycle ends with no data.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection refused, reset, or a truncated response body.
    #[error("connection error for {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timeout.
    #[error("request timeout for {url}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

fn classify(url: &str, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            source,
        }
    } else {
        FetchError::Connection {
            url: url.to_string(),
            source,
        }
    }
}

/// Issues timed GETs with the session cookies installed by the provider.
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    /// Build a fetcher around the shared cookie jar.
    pub fn new(jar: Arc<Jar>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// GET the page and return its body.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(url, e))?;
        // Body reads hit the same timeout; a truncated response classifies
        // as a connection error.
        let body = response.text().await.map_err(|e| classify(url, e))?;
        debug!(url, len = body.len(), "fetched page");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(timeout_ms: u64) -> PageFetcher {
        PageFetcher::new(
            Arc::new(Jar::default()),
            Duration::from_millis(timeout_ms),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_the_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.phtml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>kads</html>"))
            .mount(&server)
            .await;

        let body = fetcher(1_000)
            .fetch(&format!("{}/index.phtml", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>kads</html>");
    }

    #[tokio::test]
    async fn slow_server_classifies_as_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = fetcher(50).fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn refused_connection_classifies_as_connection_error() {
        // Bind then drop a listener so the port is (very likely) unoccupied.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let err = fetcher(1_000)
            .fetch(&format!("http://{addr}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Connection { .. }), "got {err:?}");
    }
}
