use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use crate::domain::Prediction;
use crate::error::FetchError;

#[async_trait]
pub trait PredictionSource: Send + Sync {
    async fn fetch_latest(&self) -> std::result::Result<Prediction, FetchError>;
}

/// Polls `GET {base_url}/api/current_prediction`
#[derive(Clone)]
pub struct HttpPredictionSource {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpPredictionSource {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static("home-energy-controller/0.1"),
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            base_url,
            client,
            timeout,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/api/current_prediction",
            self.base_url.trim_end_matches('/')
        )
    }

    fn transport_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl PredictionSource for HttpPredictionSource {
    async fn fetch_latest(&self) -> std::result::Result<Prediction, FetchError> {
        let resp = self
            .client
            .get(self.url())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_strips_trailing_slash() {
        let source = HttpPredictionSource::new(
            "http://192.168.1.100:5000/".to_string(),
            Duration::from_secs(10),
        )
        .unwrap();
        assert_eq!(
            source.url(),
            "http://192.168.1.100:5000/api/current_prediction"
        );
    }
}
