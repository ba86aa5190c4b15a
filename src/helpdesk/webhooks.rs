//! Outgoing ticket webhooks.
//!
//! Deliveries are fire-and-forget: each subscribed endpoint gets one signed
//! POST on a spawned task, failures are logged and never retried.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use super::types::Webhook;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Intraserver-Signature";
pub const EVENT_HEADER: &str = "X-Intraserver-Event";
const SIGNATURE_VERSION: &str = "sha256";
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEvent {
    #[serde(rename = "ticket.created")]
    TicketCreated,
    #[serde(rename = "ticket.updated")]
    TicketUpdated,
    #[serde(rename = "ticket.commented")]
    TicketCommented,
    #[serde(rename = "ticket.escalated")]
    TicketEscalated,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 4] = [
        Self::TicketCreated,
        Self::TicketUpdated,
        Self::TicketCommented,
        Self::TicketEscalated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TicketCreated => "ticket.created",
            Self::TicketUpdated => "ticket.updated",
            Self::TicketCommented => "ticket.commented",
            Self::TicketEscalated => "ticket.escalated",
        }
    }
}

impl fmt::Display for WebhookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unknown webhook event '{s}'"))
    }
}

pub fn validate_events(events: &[String]) -> Result<(), String> {
    if events.is_empty() {
        return Err("at least one event is required".to_string());
    }
    for event in events {
        event.parse::<WebhookEvent>()?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub event: WebhookEvent,
    pub tenant_id: Uuid,
    pub helpdesk_id: Uuid,
    pub ticket_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid signing key")]
    InvalidKey,
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("delivery failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("endpoint answered {0}")]
    Status(u16),
}

/// `sha256=<hex hmac>` over the raw request body.
pub fn sign_payload(body: &[u8], secret: &str) -> Result<String, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidKey)?;
    mac.update(body);
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{SIGNATURE_VERSION}={signature}"))
}

/// Enabled hooks subscribed to `event`, either tenant-wide or bound to `helpdesk_id`.
pub fn subscribed<'a>(
    hooks: &'a [Webhook],
    event: WebhookEvent,
    helpdesk_id: Uuid,
) -> impl Iterator<Item = &'a Webhook> {
    hooks.iter().filter(move |h| {
        h.enabled
            && h.helpdesk_id.map_or(true, |id| id == helpdesk_id)
            && h.events.iter().any(|e| e == event.as_str())
    })
}

#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookDispatcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub async fn deliver(&self, hook: &Webhook, payload: &WebhookPayload) -> Result<u16, WebhookError> {
        let body = serde_json::to_vec(payload)?;
        let signature = sign_payload(&body, &hook.secret)?;

        let response = self
            .client
            .post(&hook.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, payload.event.as_str())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(WebhookError::Status(status.as_u16()))
        }
    }

    /// Spawns one delivery per subscribed hook and returns immediately.
    pub fn dispatch(&self, hooks: &[Webhook], payload: WebhookPayload) -> usize {
        let targets: Vec<Webhook> = subscribed(hooks, payload.event, payload.helpdesk_id)
            .cloned()
            .collect();
        let count = targets.len();
        for hook in targets {
            let dispatcher = self.clone();
            let payload = payload.clone();
            tokio::spawn(async move {
                match dispatcher.deliver(&hook, &payload).await {
                    Ok(status) => debug!(
                        "webhook {} delivered {} ({status})",
                        hook.id, payload.event
                    ),
                    Err(e) => warn!("webhook {} failed for {}: {e}", hook.id, payload.event),
                }
            });
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(url: String, events: &[&str], helpdesk_id: Option<Uuid>) -> Webhook {
        Webhook {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            helpdesk_id,
            url,
            secret: "s3cret".to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    fn payload(event: WebhookEvent, helpdesk_id: Uuid) -> WebhookPayload {
        WebhookPayload {
            event,
            tenant_id: Uuid::nil(),
            helpdesk_id,
            ticket_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            data: serde_json::json!({ "ticketNumber": "TKT-000001" }),
        }
    }

    #[test]
    fn test_signature_is_stable_hex() {
        let a = sign_payload(b"{\"a\":1}", "key").unwrap();
        let b = sign_payload(b"{\"a\":1}", "key").unwrap();
        let c = sign_payload(b"{\"a\":1}", "other").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("sha256="));
        assert_eq!(a.len(), "sha256=".len() + 64);
    }

    #[test]
    fn test_event_names() {
        assert_eq!("ticket.escalated".parse::<WebhookEvent>(), Ok(WebhookEvent::TicketEscalated));
        assert!(validate_events(&["ticket.created".to_string()]).is_ok());
        assert!(validate_events(&["ticket.deleted".to_string()]).is_err());
        assert!(validate_events(&[]).is_err());
        let json = serde_json::to_string(&WebhookEvent::TicketCommented).unwrap();
        assert_eq!(json, "\"ticket.commented\"");
    }

    #[test]
    fn test_subscription_filter() {
        let desk = Uuid::new_v4();
        let mut disabled = hook("http://a".into(), &["ticket.created"], None);
        disabled.enabled = false;
        let hooks = vec![
            hook("http://tenant-wide".into(), &["ticket.created"], None),
            hook("http://this-desk".into(), &["ticket.created", "ticket.updated"], Some(desk)),
            hook("http://other-desk".into(), &["ticket.created"], Some(Uuid::new_v4())),
            hook("http://wrong-event".into(), &["ticket.updated"], None),
            disabled,
        ];
        let urls: Vec<&str> = subscribed(&hooks, WebhookEvent::TicketCreated, desk)
            .map(|h| h.url.as_str())
            .collect();
        assert_eq!(urls, vec!["http://tenant-wide", "http://this-desk"]);
    }

    #[tokio::test]
    async fn test_delivery_carries_signature() {
        let mut server = mockito::Server::new_async().await;
        let desk = Uuid::new_v4();
        let hook = hook(format!("{}/hooks/tickets", server.url()), &["ticket.created"], None);
        let payload = payload(WebhookEvent::TicketCreated, desk);
        let body = serde_json::to_vec(&payload).unwrap();
        let expected = sign_payload(&body, "s3cret").unwrap();

        let mock = server
            .mock("POST", "/hooks/tickets")
            .match_header("x-intraserver-signature", expected.as_str())
            .match_header("x-intraserver-event", "ticket.created")
            .with_status(204)
            .create_async()
            .await;

        let status = WebhookDispatcher::new().deliver(&hook, &payload).await.unwrap();
        assert_eq!(status, 204);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let hook = hook(format!("{}/down", server.url()), &["ticket.updated"], None);
        let _mock = server
            .mock("POST", "/down")
            .with_status(500)
            .create_async()
            .await;

        let result = WebhookDispatcher::new()
            .deliver(&hook, &payload(WebhookEvent::TicketUpdated, Uuid::new_v4()))
            .await;
        assert!(matches!(result, Err(WebhookError::Status(500))));
    }
}
