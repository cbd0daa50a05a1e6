//! Routes a user's free-form message to wherever their current relationship
//! points: the paired partner, or the owner of the link they opened.

use tracing::{info, warn};

use crate::{
    Broker,
    db::{ANONYMOUS, ChatId, Payload},
    error::{RelayError, RelayResult},
    store::NewInboxMessage,
    transport::{Affordance, Outbound},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Sent to the paired partner; `delivered` is false when the live send failed
    /// (the inbox copy is stored either way).
    Live { to: ChatId, inbox_id: i64, delivered: bool },
    /// Stored in the link owner's inbox; the sender's one-shot credit is spent.
    Anonymous { owner: ChatId, inbox_id: i64 },
}

pub async fn relay(broker: &Broker, sender_id: ChatId, payload: &Payload) -> RelayResult<RelayOutcome> {
    let Some(sender) = broker.profiles.get(sender_id).await? else {
        return Err(RelayError::NotConnected);
    };

    if let Some(partner_id) = sender.chatting_with {
        let Some(_partner) = broker.profiles.get(partner_id).await? else {
            warn!(sender_id, partner_id, "paired partner has no profile");
            return Err(RelayError::NotFound("chat partner"));
        };

        let delivered = match broker
            .transport
            .send(Outbound::payload(partner_id, payload, sender.display_name()))
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(sender_id, partner_id, %err, "live relay failed");
                false
            }
        };

        let inbox_id = broker
            .inbox
            .append(NewInboxMessage {
                owner_id: partner_id,
                sender_id,
                sender_name: sender.display_name(),
                payload,
            })
            .await?;
        info!(sender_id, partner_id, kind = %payload.kind, delivered, "relayed message");
        return Ok(RelayOutcome::Live { to: partner_id, inbox_id, delivered });
    }

    if let Some(owner_id) = sender.owner_id {
        let Some(owner) = broker.profiles.get(owner_id).await? else {
            warn!(sender_id, owner_id, "link owner has no profile");
            return Err(RelayError::NotFound("link owner"));
        };

        let inbox_id = broker
            .inbox
            .append(NewInboxMessage { owner_id, sender_id, sender_name: ANONYMOUS, payload })
            .await?;
        info!(sender_id, owner_id, kind = %payload.kind, "stored anonymous message");

        broker
            .transport
            .notify(
                Outbound::text(owner_id, "You have a new anonymous message!")
                    .with_affordances(vec![Affordance::new("New messages", "cmd_list_unread")]),
            )
            .await;

        // Only spend the credit once the message is stored.
        broker.profiles.clear_owner(sender_id).await?;
        broker
            .transport
            .notify(Outbound::text(sender_id, format!("Your message was sent to {}.", owner.display_name())))
            .await;
        return Ok(RelayOutcome::Anonymous { owner: owner_id, inbox_id });
    }

    Err(RelayError::NotConnected)
}
