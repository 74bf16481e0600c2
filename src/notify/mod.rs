//! Outbound messaging gateway client
//!
//! Best-effort fan-out for broadcast notifications. One recipient's failure
//! never aborts the remaining sends; the caller gets final success/failure
//! counts. Delivery reliability is explicitly out of scope - a failed send
//! is counted and logged, nothing more.

use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::types::VemsError;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    text: &'a str,
}

/// Result of a broadcast fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BroadcastOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// HTTP client for the external messaging gateway
#[derive(Clone)]
pub struct MessageGateway {
    client: reqwest::Client,
    url: Option<String>,
}

impl MessageGateway {
    /// A gateway with no URL is "not configured": every send fails soft and
    /// is counted, so broadcasts still return instead of erroring.
    pub fn new(url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, url }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Deliver one message to one recipient
    pub async fn send(&self, recipient: &str, text: &str) -> Result<(), VemsError> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| VemsError::Config("messaging gateway not configured".into()))?;

        let response = self
            .client
            .post(url)
            .json(&OutboundMessage {
                to: recipient,
                text,
            })
            .send()
            .await
            .map_err(|e| VemsError::Http(format!("gateway send failed: {e}")))?;

        if !response.status().is_success() {
            return Err(VemsError::Http(format!(
                "gateway returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Fan a message out to every recipient, isolating failures.
    ///
    /// Never rolls anything back and never returns an error; the counts are
    /// the whole story.
    pub async fn broadcast(&self, recipients: &[String], text: &str) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome { sent: 0, failed: 0 };

        for recipient in recipients {
            match self.send(recipient, text).await {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    warn!("Broadcast to {} failed: {}", recipient, e);
                    outcome.failed += 1;
                }
            }
        }

        info!(
            "Broadcast complete: {} sent, {} failed of {} recipients",
            outcome.sent,
            outcome.failed,
            recipients.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_gateway_fails_soft() {
        let gateway = MessageGateway::new(None);
        assert!(!gateway.is_configured());
        assert!(gateway.send("0123456789", "hello").await.is_err());
    }

    #[tokio::test]
    async fn test_broadcast_counts_failures_without_aborting() {
        let gateway = MessageGateway::new(None);
        let recipients = vec![
            "0123456781".to_string(),
            "0123456782".to_string(),
            "0123456783".to_string(),
        ];

        let outcome = gateway.broadcast(&recipients, "flood warning").await;
        assert_eq!(outcome.sent, 0);
        assert_eq!(outcome.failed, 3);
    }

    #[tokio::test]
    async fn test_empty_recipient_list() {
        let gateway = MessageGateway::new(None);
        let outcome = gateway.broadcast(&[], "nobody home").await;
        assert_eq!(outcome, BroadcastOutcome { sent: 0, failed: 0 });
    }
}
