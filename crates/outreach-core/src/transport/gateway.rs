use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use super::{DeliveryStatus, MessageTransport};
use crate::error::TransportError;

/// Extra client-side slack on top of the server-side long-poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyResponse {
    text: String,
}

/// HTTP chat gateway.
///
/// ```text
/// POST {base}/messages                    {"to": ..., "text": ...}
/// GET  {base}/replies/{address}?timeout=N 200 {"text": ...} | 204 no reply
/// ```
pub struct GatewayTransport {
    client: Client,
    base_url: String,
    token: Option<String>,
    send_timeout: Duration,
}

impl GatewayTransport {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            send_timeout: Duration::from_secs(15),
        })
    }

    /// `{base}/replies/{address}` with the address as one escaped path segment.
    fn reply_url(&self, address: &str) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TransportError::Connection(format!("invalid gateway url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::Connection("gateway url cannot be a base".into()))?
            .pop_if_empty()
            .push("replies")
            .push(address);
        Ok(url)
    }

    fn authorize(
        &self,
        req: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }
}

fn rejected(resp: reqwest::blocking::Response) -> TransportError {
    let status = resp.status().as_u16();
    let body = resp.text().unwrap_or_default();
    TransportError::Rejected { status, body }
}

impl MessageTransport for GatewayTransport {
    fn send(&self, address: &str, text: &str) -> Result<DeliveryStatus, TransportError> {
        let url = format!("{}/messages", self.base_url);
        let resp = self
            .authorize(self.client.post(&url))
            .timeout(self.send_timeout)
            .json(&serde_json::json!({ "to": address, "text": text }))
            .send()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = resp.status();
        tracing::debug!(address, %status, "gateway send");
        match status {
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                Ok(DeliveryStatus::InvalidAddress)
            }
            s if s.is_success() => {
                let body: SendResponse = resp.json().unwrap_or(SendResponse { status: None });
                match body.status.as_deref() {
                    Some("invalid_address") => Ok(DeliveryStatus::InvalidAddress),
                    _ => Ok(DeliveryStatus::Sent),
                }
            }
            _ => Err(rejected(resp)),
        }
    }

    fn wait_for_reply(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        let url = self.reply_url(address)?;
        let result = self
            .authorize(self.client.get(url))
            .query(&[("timeout", timeout.as_secs().to_string())])
            .timeout(timeout + POLL_GRACE)
            .send();

        let resp = match result {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Ok(None),
            Err(e) => return Err(TransportError::Connection(e.to_string())),
        };

        match resp.status() {
            StatusCode::NO_CONTENT | StatusCode::REQUEST_TIMEOUT => Ok(None),
            s if s.is_success() => {
                let reply: ReplyResponse = resp
                    .json()
                    .map_err(|e| TransportError::Connection(e.to_string()))?;
                Ok(Some(reply.text))
            }
            _ => Err(rejected(resp)),
        }
    }
}
