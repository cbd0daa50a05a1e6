//! Inbound event classification and routing.
//!
//! Every event is handled to completion on its own; a failure is rendered to
//! the acting user and never escapes [`handle`] as anything but a return value.

mod callback;
mod command;

pub use callback::Callback;
pub use command::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::{
    Broker, admin,
    db::{ChatId, Payload, PayloadKind, ProfileField},
    error::{RelayError, RelayResult},
    link,
    matching::{self, GenderFilter},
    pairing::{self, Response},
    relay,
    transport::{Affordance, Outbound},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub from: ChatId,
    #[serde(flatten)]
    pub body: EventBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventBody {
    Command {
        name: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Message {
        payload: Payload,
    },
    Button {
        data: String,
    },
}

/// Where a free-form message goes, checked in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Reply(ChatId),
    EditField(ProfileField),
    Register,
    Relay,
}

pub async fn handle(broker: &Broker, event: InboundEvent) -> RelayResult<()> {
    let from = event.from;
    let result = match event.body {
        EventBody::Command { name, args } => on_command(broker, from, &name, args).await,
        EventBody::Message { payload } => on_message(broker, from, payload).await,
        EventBody::Button { data } => on_button(broker, from, &data).await,
    };

    if let Err(err) = &result {
        report(broker, from, err).await;
    }
    result
}

async fn report(broker: &Broker, from: ChatId, err: &RelayError) {
    match err {
        RelayError::Store(_) => error!(chat_id = from, %err, "event failed"),
        RelayError::Delivery { .. } | RelayError::MalformedCallback(_) => warn!(chat_id = from, %err, "event failed"),
        _ => debug!(chat_id = from, %err, "event refused"),
    }

    broker.transport.notify(Outbound::text(from, err.user_notice())).await;

    if let RelayError::Incomplete(field) = err {
        // Resume registration where it stopped.
        if let Err(err) = broker.profiles.ensure(from).await {
            error!(chat_id = from, %err, "could not create profile");
            return;
        }
        broker.sessions.set_registering(from, true);
        broker.transport.notify(pairing::prompt_for(from, *field)).await;
    }
}

async fn on_command(broker: &Broker, from: ChatId, name: &str, args: Vec<String>) -> RelayResult<()> {
    let Some(command) = Command::parse(name, args) else {
        return Err(RelayError::validation("Unknown command."));
    };
    debug!(chat_id = from, ?command, "command");

    match command {
        Command::Start(None) => pairing::start(broker, from).await.map(drop),
        Command::Start(Some(token)) => {
            let owner_id = link::parse_token(&token)?;
            link::consume_link(broker, from, owner_id).await
        }
        Command::ShowProfile => pairing::show_profile(broker, from).await,
        Command::ListUnread => link::fetch_unread(broker, from).await.map(drop),
        Command::BeginMatching(None) => offer_filters(broker, from).await,
        Command::BeginMatching(Some(filter)) => {
            let filter = filter
                .parse::<GenderFilter>()
                .map_err(|_| RelayError::validation("Pick male, female or random."))?;
            matching::browse(broker, from, filter, 0).await.map(drop)
        }
        Command::EndChat => pairing::end_chat(broker, from).await.map(drop),
        Command::ListAllUsers => admin::list_all_users(broker, from).await.map(drop),
        Command::CreateTestUser(args) => admin::create_test_user(broker, from, &args).await.map(drop),
        Command::DumpProfile => admin::dump_profile(broker, from).await.map(drop),
    }
}

async fn offer_filters(broker: &Broker, from: ChatId) -> RelayResult<()> {
    let profile = broker.profiles.get(from).await?;
    pairing::require_ready(profile.as_ref())?;

    let choices = vec![
        Affordance::new("Male", "filter_male"),
        Affordance::new("Female", "filter_female"),
        Affordance::new("Random", "filter_random"),
    ];
    broker
        .transport
        .notify(Outbound::text(from, "Who would you like to chat with?").with_affordances(choices))
        .await;
    Ok(())
}

async fn on_button(broker: &Broker, from: ChatId, data: &str) -> RelayResult<()> {
    let callback = data.parse::<Callback>()?;
    debug!(chat_id = from, ?callback, "button");

    match callback {
        Callback::Accept(sender) => pairing::respond(broker, Response::Accept, sender, from).await,
        Callback::Reject(sender) => pairing::respond(broker, Response::Reject, sender, from).await,
        Callback::Prev(page) | Callback::Next(page) => {
            let filter = broker.sessions.get(from).browse_filter;
            matching::browse(broker, from, filter, page).await.map(drop)
        }
        Callback::Change(field) => pairing::begin_edit(broker, from, field).await,
        Callback::Reply(sender) => link::begin_reply(broker, from, sender).await,
        Callback::Candidate(candidate) => pairing::propose(broker, from, candidate).await.map(drop),
        Callback::Filter(filter) => matching::browse(broker, from, filter, 0).await.map(drop),
        Callback::Gender(gender) => {
            if broker.sessions.get(from).awaiting_field == Some(ProfileField::Gender) {
                return pairing::apply_edit(broker, from, ProfileField::Gender, gender.as_str()).await;
            }
            let profile = broker.profiles.get(from).await?;
            match profile.and_then(|p| p.first_missing()) {
                Some(ProfileField::Gender) => pairing::submit(broker, from, gender.as_str()).await.map(drop),
                _ => Err(RelayError::MalformedCallback(data.to_owned())),
            }
        }
        Callback::Command(name) => on_command(broker, from, &name, Vec::new()).await,
    }
}

async fn route_for(broker: &Broker, from: ChatId) -> RelayResult<Route> {
    let ctx = broker.sessions.get(from);
    if let Some(target) = ctx.reply_target {
        return Ok(Route::Reply(target));
    }
    if let Some(field) = ctx.awaiting_field {
        return Ok(Route::EditField(field));
    }

    // Only a registration begun by `start` claims free text; a blank row
    // left behind by a link visit falls through to the relay.
    if ctx.registering {
        let unfinished = broker
            .profiles
            .get(from)
            .await?
            .is_some_and(|p| p.chatting_with.is_none() && !p.is_complete());
        if unfinished {
            return Ok(Route::Register);
        }
        broker.sessions.set_registering(from, false);
    }
    Ok(Route::Relay)
}

async fn on_message(broker: &Broker, from: ChatId, payload: Payload) -> RelayResult<()> {
    let route = route_for(broker, from).await?;
    debug!(chat_id = from, ?route, kind = %payload.kind, "message");

    match route {
        Route::Reply(target) => {
            broker.sessions.take_reply_target(from);
            link::reply(broker, from, target, &payload).await
        }
        Route::EditField(field) => {
            let text = text_only(&payload)?;
            pairing::apply_edit(broker, from, field, text).await
        }
        Route::Register => {
            let text = text_only(&payload)?;
            pairing::submit(broker, from, text).await.map(drop)
        }
        Route::Relay => relay::relay(broker, from, &payload).await.map(drop),
    }
}

fn text_only(payload: &Payload) -> RelayResult<&str> {
    match payload.kind {
        PayloadKind::Text => Ok(payload.content.as_str()),
        _ => Err(RelayError::validation("Please answer with text.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_decode_from_json() {
        let event: InboundEvent =
            serde_json::from_str(r#"{"from": 5, "kind": "command", "name": "start", "args": ["9"]}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent { from: 5, body: EventBody::Command { name: "start".into(), args: vec!["9".into()] } }
        );

        let event: InboundEvent =
            serde_json::from_str(r#"{"from": 5, "kind": "message", "payload": {"kind": "photo", "content": "f1"}}"#)
                .unwrap();
        assert_eq!(event.body, EventBody::Message { payload: Payload::photo("f1") });

        let event: InboundEvent = serde_json::from_str(r#"{"from": 5, "kind": "button", "data": "next_1"}"#).unwrap();
        assert_eq!(event.body, EventBody::Button { data: "next_1".into() });

        let body: EventBody = serde_json::from_str(r#"{"kind": "command", "name": "end_chat"}"#).unwrap();
        assert_eq!(body, EventBody::Command { name: "end_chat".into(), args: vec![] });
    }
}
