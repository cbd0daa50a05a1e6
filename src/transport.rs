//! Outbound side of the messaging network.
//!
//! Every message is fanned out on a broadcast channel; a user is reachable
//! while at least one [`Feed`] for them is attached (the websocket route holds
//! one per open socket). When a webhook is configured each message is also
//! POSTed there, and the webhook accepting it counts as delivered.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::{RecvError, TryRecvError}};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    db::{ChatId, Payload, PayloadKind},
    error::{RelayError, RelayResult},
};

/// A labelled response button; `data` is the opaque payload echoed back on press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affordance {
    pub label: String,
    pub data: String,
}

impl Affordance {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Affordance {
        Affordance { label: label.into(), data: data.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutboundBody {
    Text { text: String },
    Photo { file_id: String, caption: String },
    Video { file_id: String, caption: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub id: Uuid,
    pub to: ChatId,
    pub body: OutboundBody,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affordances: Vec<Affordance>,
}

impl Outbound {
    pub fn text(to: ChatId, text: impl Into<String>) -> Outbound {
        Outbound {
            id: Uuid::now_v7(),
            to,
            body: OutboundBody::Text { text: text.into() },
            affordances: Vec::new(),
        }
    }

    /// Relays `payload` to `to`, prefixing text with `label` and captioning media with it.
    pub fn payload(to: ChatId, payload: &Payload, label: &str) -> Outbound {
        let body = match payload.kind {
            PayloadKind::Text => OutboundBody::Text { text: format!("{label}: {}", payload.content) },
            PayloadKind::Photo => OutboundBody::Photo { file_id: payload.content.clone(), caption: label.to_owned() },
            PayloadKind::Video => OutboundBody::Video { file_id: payload.content.clone(), caption: label.to_owned() },
        };
        Outbound { id: Uuid::now_v7(), to, body, affordances: Vec::new() }
    }

    pub fn with_affordances(mut self, affordances: Vec<Affordance>) -> Outbound {
        self.affordances = affordances;
        self
    }

    /// The text of a text message, or the caption of a media message.
    pub fn text_content(&self) -> &str {
        match &self.body {
            OutboundBody::Text { text } => text,
            OutboundBody::Photo { caption, .. } | OutboundBody::Video { caption, .. } => caption,
        }
    }

    pub fn has_affordance(&self, data: &str) -> bool {
        self.affordances.iter().any(|a| a.data == data)
    }
}

#[derive(Clone)]
struct Webhook {
    client: reqwest::Client,
    url: String,
}

#[derive(Clone)]
pub struct Transport {
    tx: broadcast::Sender<Outbound>,
    online: Arc<DashMap<ChatId, usize>>,
    webhook: Option<Webhook>,
}

impl Transport {
    pub fn new(capacity: usize, webhook_url: Option<String>) -> Transport {
        Transport {
            tx: broadcast::channel(capacity.max(1)).0,
            online: Arc::new(DashMap::new()),
            webhook: webhook_url.map(|url| Webhook { client: reqwest::Client::new(), url }),
        }
    }

    /// Attaches a feed for `chat_id`; the user stays reachable until it is dropped.
    pub fn subscribe(&self, chat_id: ChatId) -> Feed {
        let rx = self.tx.subscribe();
        *self.online.entry(chat_id).or_insert(0) += 1;
        Feed { chat_id, rx, online: Arc::clone(&self.online) }
    }

    pub fn is_online(&self, chat_id: ChatId) -> bool {
        self.online.get(&chat_id).is_some_and(|feeds| *feeds > 0)
    }

    pub async fn send(&self, out: Outbound) -> RelayResult<()> {
        let to = out.to;
        let mut delivered = false;
        let mut reasons = Vec::new();

        if let Some(webhook) = &self.webhook {
            let response = webhook
                .client
                .post(&webhook.url)
                .json(&out)
                .send()
                .await
                .and_then(|response| response.error_for_status());
            match response {
                Ok(_) => delivered = true,
                Err(err) => reasons.push(format!("webhook: {err}")),
            }
        }

        if self.is_online(to) {
            match self.tx.send(out) {
                Ok(_) => delivered = true,
                Err(_) => reasons.push("feed closed".to_owned()),
            }
        } else {
            reasons.push("recipient offline".to_owned());
        }

        if delivered {
            debug!(to, "delivered");
            Ok(())
        } else {
            Err(RelayError::Delivery { to, reason: reasons.join(", ") })
        }
    }

    /// Best-effort send: failures are logged and swallowed.
    pub async fn notify(&self, out: Outbound) -> bool {
        match self.send(out).await {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "best-effort delivery failed");
                false
            }
        }
    }
}

/// One user's view of the outbound stream.
pub struct Feed {
    chat_id: ChatId,
    rx: broadcast::Receiver<Outbound>,
    online: Arc<DashMap<ChatId, usize>>,
}

impl Feed {
    pub async fn recv(&mut self) -> Option<Outbound> {
        loop {
            match self.rx.recv().await {
                Ok(out) if out.to == self.chat_id => return Some(out),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(chat_id = self.chat_id, skipped, "feed lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Outbound> {
        loop {
            match self.rx.try_recv() {
                Ok(out) if out.to == self.chat_id => return Some(out),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(chat_id = self.chat_id, skipped, "feed lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything currently queued for this user.
    pub fn drain(&mut self) -> Vec<Outbound> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        if let Some(mut feeds) = self.online.get_mut(&self.chat_id) {
            *feeds = feeds.saturating_sub(1);
        }
        self.online.remove_if(&self.chat_id, |_, feeds| *feeds == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn offline_recipient_fails_delivery() {
        let transport = Transport::new(8, None);
        let err = transport.send(Outbound::text(5, "hi")).await.unwrap_err();
        assert!(matches!(err, RelayError::Delivery { to: 5, .. }));
        assert!(!transport.notify(Outbound::text(5, "hi")).await);
    }

    #[tokio::test]
    async fn feed_sees_only_its_own_messages() {
        let transport = Transport::new(8, None);
        let mut alice = transport.subscribe(1);
        let _bob = transport.subscribe(2);

        transport.send(Outbound::text(2, "for bob")).await.unwrap();
        transport.send(Outbound::text(1, "for alice")).await.unwrap();

        let got = alice.drain();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].text_content(), "for alice");
    }

    #[tokio::test]
    async fn dropping_last_feed_goes_offline() {
        let transport = Transport::new(8, None);
        let first = transport.subscribe(1);
        let second = transport.subscribe(1);
        drop(first);
        assert!(transport.is_online(1));
        drop(second);
        assert!(!transport.is_online(1));
    }

    #[test]
    fn media_payloads_are_captioned() {
        let out = Outbound::payload(3, &Payload::video("vid-9"), "Sam");
        assert_eq!(
            out.body,
            OutboundBody::Video { file_id: "vid-9".into(), caption: "Sam".into() }
        );

        let out = Outbound::payload(3, &Payload::text("hey"), "Sam");
        assert_eq!(out.text_content(), "Sam: hey");
    }
}
