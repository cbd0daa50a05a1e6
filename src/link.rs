//! Capability links and the anonymous inbox.
//!
//! A link embeds its owner's chat id and never expires. Opening it grants the
//! visitor exactly one anonymous message (spent by [`crate::relay::relay`]);
//! the owner reads those from the unread inbox and may reply by reference.

use tracing::{info, warn};

use crate::{
    Broker,
    config::Settings,
    db::{ChatId, Payload},
    error::{RelayError, RelayResult},
    transport::{Affordance, Outbound},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadEntry {
    pub inbox_id: i64,
    pub payload: Payload,
    /// Who to answer with [`reply`]; never shown to the owner as an identity.
    pub reply_to: ChatId,
}

pub fn generate_link(settings: &Settings, user_id: ChatId) -> String {
    format!("{}{user_id}", settings.link_base)
}

pub fn parse_token(token: &str) -> RelayResult<ChatId> {
    token
        .trim()
        .parse::<ChatId>()
        .map_err(|_| RelayError::validation("That link is invalid."))
}

/// `start <token>`: puts `visitor_id` into compose mode towards `owner_id`.
pub async fn consume_link(broker: &Broker, visitor_id: ChatId, owner_id: ChatId) -> RelayResult<()> {
    if visitor_id == owner_id {
        return Err(RelayError::SelfTarget);
    }

    let owner = broker.profiles.get(owner_id).await?.ok_or(RelayError::NotFound("link owner"))?;
    if owner.chatting_with.is_some() {
        info!(visitor_id, owner_id, "link refused, owner is paired");
        return Err(RelayError::Busy);
    }

    let visitor = broker.profiles.ensure(visitor_id).await?;
    if visitor.chatting_with.is_some() || !broker.profiles.set_owner(visitor_id, owner_id).await? {
        return Err(RelayError::Paired);
    }
    // The next message is the anonymous one, not a registration answer.
    broker.sessions.set_registering(visitor_id, false);
    info!(visitor_id, owner_id, "link opened");

    broker
        .transport
        .notify(Outbound::text(
            visitor_id,
            format!("You're messaging {} anonymously.\nWrite your message:", owner.display_name()),
        ))
        .await;
    Ok(())
}

/// Delivers every unread anonymous message to `owner_id`, each with a reply
/// button, then flags the delivered ones read. A failure between delivery and
/// flagging means the same rows are delivered again next time.
pub async fn fetch_unread(broker: &Broker, owner_id: ChatId) -> RelayResult<Vec<UnreadEntry>> {
    let owner = broker.profiles.get(owner_id).await?.ok_or(RelayError::NotFound("profile"))?;
    if owner.owner_id.is_some() {
        return Err(RelayError::LinkMode);
    }

    let unread = broker.inbox.unread_anonymous(owner_id).await?;
    if unread.is_empty() {
        broker.transport.notify(Outbound::text(owner_id, "No new messages.")).await;
        return Ok(Vec::new());
    }

    let mut delivered = Vec::with_capacity(unread.len());
    for msg in unread {
        let payload = msg.payload();
        let out = Outbound::payload(owner_id, &payload, "Anonymous")
            .with_affordances(vec![Affordance::new("Reply", format!("reply_{}", msg.sender_id))]);

        match broker.transport.send(out).await {
            Ok(()) => delivered.push(UnreadEntry { inbox_id: msg.id, payload, reply_to: msg.sender_id }),
            Err(err) => warn!(owner_id, inbox_id = msg.id, %err, "unread message not delivered"),
        }
    }

    let ids: Vec<i64> = delivered.iter().map(|entry| entry.inbox_id).collect();
    broker.inbox.mark_read(&ids).await?;
    info!(owner_id, count = ids.len(), "delivered unread messages");
    Ok(delivered)
}

/// `reply_<id>`: the owner's next message goes back to that sender.
pub async fn begin_reply(broker: &Broker, owner_id: ChatId, sender_id: ChatId) -> RelayResult<()> {
    if broker.profiles.get(owner_id).await?.is_none() {
        return Err(RelayError::NotFound("profile"));
    }
    broker.sessions.set_reply_target(owner_id, sender_id);
    broker.transport.notify(Outbound::text(owner_id, "Write your reply:")).await;
    Ok(())
}

/// Sends `payload` straight to `sender_id`, labelled with the owner's name.
/// Nothing is stored and no pairing is created. A failed send is logged and
/// reported to the owner, never returned as an error.
pub async fn reply(broker: &Broker, owner_id: ChatId, sender_id: ChatId, payload: &Payload) -> RelayResult<()> {
    if broker.profiles.get(sender_id).await?.is_none() {
        return Err(RelayError::NotFound("recipient"));
    }
    let owner = broker.profiles.get(owner_id).await?.ok_or(RelayError::NotFound("profile"))?;

    let label = format!("Reply from {}", owner.display_name());
    let confirmation = match broker.transport.send(Outbound::payload(sender_id, payload, &label)).await {
        Ok(()) => {
            info!(owner_id, sender_id, kind = %payload.kind, "reply sent");
            "Your reply was sent."
        }
        Err(err) => {
            warn!(owner_id, sender_id, %err, "reply not delivered");
            "Your reply could not be delivered right now."
        }
    };

    broker.transport.notify(Outbound::text(owner_id, confirmation)).await;
    Ok(())
}
