use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use crate::domain::StatusReport;
use crate::error::StatusError;

/// Destination for the periodic status report
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn deliver(&self, report: &StatusReport) -> std::result::Result<(), StatusError>;
}

/// Posts reports as JSON to `POST {base_url}/api/update_status`
#[derive(Clone)]
pub struct HttpStatusSink {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpStatusSink {
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
        format!("{}/api/update_status", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl StatusSink for HttpStatusSink {
    async fn deliver(&self, report: &StatusReport) -> std::result::Result<(), StatusError> {
        let resp = self
            .client
            .post(self.url())
            .json(report)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StatusError::Timeout(self.timeout)
                } else {
                    StatusError::Transport(e.to_string())
                }
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(StatusError::Http {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Sink used when status reporting is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardStatusSink;

#[async_trait]
impl StatusSink for DiscardStatusSink {
    async fn deliver(&self, _report: &StatusReport) -> std::result::Result<(), StatusError> {
        Ok(())
    }
}
