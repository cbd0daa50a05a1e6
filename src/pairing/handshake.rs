use tracing::{info, warn};

use crate::{
    Broker,
    db::ChatId,
    error::{RelayError, RelayResult},
    transport::{Affordance, Outbound},
};

use super::{end_chat_affordance, menu, require_ready};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Accept,
    Reject,
}

/// Invites `candidate_id` to chat. An unknown candidate is acknowledged and
/// ignored (`Ok(false)`); nothing is written to either profile.
pub async fn propose(broker: &Broker, sender_id: ChatId, candidate_id: ChatId) -> RelayResult<bool> {
    let sender = broker.profiles.get(sender_id).await?;
    let sender = require_ready(sender.as_ref())?;
    if candidate_id == sender_id {
        return Err(RelayError::SelfTarget);
    }

    if broker.profiles.get(candidate_id).await?.is_none() {
        warn!(sender_id, candidate_id, "invitation to unknown user ignored");
        return Ok(false);
    }

    broker.invitations.record(sender_id, candidate_id);
    info!(sender_id, candidate_id, "chat requested");

    let request = Outbound::text(
        candidate_id,
        format!("{} wants to chat with you. Accept?", sender.display_name()),
    )
    .with_affordances(vec![
        Affordance::new("Accept", format!("accept_{sender_id}")),
        Affordance::new("Reject", format!("reject_{sender_id}")),
    ]);
    broker.transport.notify(request).await;
    broker
        .transport
        .notify(Outbound::text(sender_id, "Your request was sent, wait for an answer."))
        .await;
    Ok(true)
}

/// The invited party (`receiver_id`) answers the request `sender_id` made.
pub async fn respond(broker: &Broker, response: Response, sender_id: ChatId, receiver_id: ChatId) -> RelayResult<()> {
    let sender = broker.profiles.get(sender_id).await?.ok_or(RelayError::NotFound("user"))?;
    let receiver = broker.profiles.get(receiver_id).await?;
    let receiver = receiver.ok_or(RelayError::NotFound("user"))?;

    if !broker.invitations.is_pending(sender_id, receiver_id) {
        return Err(RelayError::NotFound("chat request"));
    }

    match response {
        Response::Accept => {
            require_ready(Some(&receiver))?;
            broker.invitations.take(sender_id, receiver_id);

            if !broker.profiles.pair(sender_id, receiver_id).await? {
                return Err(RelayError::Busy);
            }
            broker.invitations.forget(sender_id);
            broker.invitations.forget(receiver_id);
            info!(sender_id, receiver_id, "chat started");

            for (to, partner) in [(sender_id, &receiver), (receiver_id, &sender)] {
                broker
                    .transport
                    .notify(
                        Outbound::text(to, format!("You're now chatting with {}.", partner.display_name()))
                            .with_affordances(vec![end_chat_affordance()]),
                    )
                    .await;
            }
        }
        Response::Reject => {
            broker.invitations.take(sender_id, receiver_id);
            info!(sender_id, receiver_id, "chat request rejected");

            broker
                .transport
                .notify(Outbound::text(
                    sender_id,
                    format!("{} declined your chat request.", receiver.display_name()),
                ))
                .await;
        }
    }
    Ok(())
}

/// Ends the caller's chat on both sides. Returns the former partner.
pub async fn end_chat(broker: &Broker, chat_id: ChatId) -> RelayResult<ChatId> {
    let Some(partner) = broker.profiles.unpair(chat_id).await? else {
        return Err(RelayError::NotConnected);
    };
    info!(chat_id, partner, "chat ended");

    for user in [chat_id, partner] {
        let affordances = match broker.profiles.get(user).await? {
            Some(profile) => menu(&profile),
            None => Vec::new(),
        };
        broker
            .transport
            .notify(Outbound::text(user, "The chat has ended.").with_affordances(affordances))
            .await;
    }
    Ok(partner)
}
