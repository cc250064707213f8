use std::time::Duration;

use async_trait::async_trait;

use awc::error::SendRequestError;
use awc::http::StatusCode;

use tokio_util::sync::CancellationToken;

use crate::settings::AppSettings;

#[derive(Debug)]
pub enum ProbeOutcome {
    Healthy(StatusCode),
    Unhealthy(StatusCode),
    /// Refused connection, timeout or bad url.
    Failed(SendRequestError),
    Cancelled,
}

/// Checks whether a single proxy is currently reachable.
#[async_trait(?Send)]
pub trait Probe {
    async fn probe(&self, url: &str, token: &CancellationToken) -> ProbeOutcome;
}

pub struct AwcProbe {
    client: awc::Client,
}

impl AwcProbe {
    /// Must be called from within an actix runtime.
    pub fn new(timeout: Duration, concurrency: usize) -> Self {
        let client = awc::Client::builder()
            .timeout(timeout)
            .connector(awc::Connector::new().limit(concurrency))
            .finish();

        Self { client }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::new(
            settings.doujin.proxy_request_timeout(),
            settings.http.concurrency,
        )
    }
}

#[async_trait(?Send)]
impl Probe for AwcProbe {
    async fn probe(&self, url: &str, token: &CancellationToken) -> ProbeOutcome {
        let request = self.client.get(url).send();

        tokio::select! {
            biased;

            _ = token.cancelled() => ProbeOutcome::Cancelled,
            result = request => match result {
                Ok(response) if response.status().is_success() => {
                    ProbeOutcome::Healthy(response.status())
                }
                Ok(response) => ProbeOutcome::Unhealthy(response.status()),
                Err(e) => ProbeOutcome::Failed(e),
            },
        }
    }
}
