use tracing::info;

use crate::{
    Broker,
    db::{ChatId, Gender, ProfileField},
    error::{RelayError, RelayResult},
    link,
    transport::{Affordance, Outbound},
};

use super::{PairingState, menu};

const MAX_NAME_CHARS: usize = 64;

/// `start` without a link token: first contact creates the profile, an
/// unfinished registration resumes at its first missing field.
pub async fn start(broker: &Broker, chat_id: ChatId) -> RelayResult<PairingState> {
    let Some(profile) = broker.profiles.get(chat_id).await? else {
        broker.profiles.ensure(chat_id).await?;
        broker.sessions.set_registering(chat_id, true);
        info!(chat_id, "registration started");
        broker.transport.notify(Outbound::text(chat_id, "Hi, welcome! What's your name?")).await;
        return Ok(PairingState::Registering(ProfileField::Name));
    };

    match profile.first_missing() {
        Some(field) => {
            broker.sessions.set_registering(chat_id, true);
            broker.transport.notify(Outbound::text(chat_id, "Please finish your registration.")).await;
            broker.transport.notify(prompt_for(chat_id, field)).await;
            Ok(PairingState::Registering(field))
        }
        None => {
            broker.sessions.set_registering(chat_id, false);
            let link = link::generate_link(&broker.settings, chat_id);
            broker
                .transport
                .notify(
                    Outbound::text(chat_id, format!("You're already registered.\nYour link to share:\n{link}"))
                        .with_affordances(menu(&profile)),
                )
                .await;
            Ok(PairingState::of(Some(&profile)))
        }
    }
}

pub fn prompt_for(to: ChatId, field: ProfileField) -> Outbound {
    match field {
        ProfileField::Name => Outbound::text(to, "What's your name?"),
        ProfileField::Age => Outbound::text(to, "How old are you? (numbers only)"),
        ProfileField::Gender => Outbound::text(to, "Pick your gender.").with_affordances(vec![
            Affordance::new("Male", "gender_male"),
            Affordance::new("Female", "gender_female"),
        ]),
    }
}

/// One registration step: validates `input` for the first missing field and
/// stores it. Invalid input re-prompts the same field and advances nothing.
/// The session stays in registration until the last field is stored.
pub async fn submit(broker: &Broker, chat_id: ChatId, input: &str) -> RelayResult<PairingState> {
    let profile = broker.profiles.get(chat_id).await?.ok_or(RelayError::NotFound("profile"))?;
    let Some(field) = profile.first_missing() else {
        broker.sessions.set_registering(chat_id, false);
        return Ok(PairingState::of(Some(&profile)));
    };

    if let Err(err) = write_field(broker, chat_id, field, input).await {
        broker.transport.notify(prompt_for(chat_id, field)).await;
        return Err(err);
    }
    info!(chat_id, %field, "registration step done");

    let profile = broker.profiles.get(chat_id).await?.ok_or(RelayError::NotFound("profile"))?;
    match profile.first_missing() {
        Some(next) => {
            broker.transport.notify(prompt_for(chat_id, next)).await;
            Ok(PairingState::Registering(next))
        }
        None => {
            broker.sessions.set_registering(chat_id, false);
            broker
                .transport
                .notify(
                    Outbound::text(chat_id, "You're registered! Tap \"Start chat\" to meet someone.")
                        .with_affordances(menu(&profile)),
                )
                .await;
            Ok(PairingState::Ready)
        }
    }
}

pub async fn show_profile(broker: &Broker, chat_id: ChatId) -> RelayResult<()> {
    let profile = broker.profiles.get(chat_id).await?.ok_or(RelayError::NotFound("profile"))?;
    let unread = broker.inbox.unread_count(chat_id).await?;
    let link = link::generate_link(&broker.settings, chat_id);

    let text = format!(
        "Your profile:\nName: {}\nAge: {}\nGender: {}\nUnread messages: {unread}\nYour link to share: {link}",
        profile.name.as_deref().unwrap_or("-"),
        profile.age.map(|age| age.to_string()).unwrap_or_else(|| "-".into()),
        profile.gender.map(|gender| gender.to_string()).unwrap_or_else(|| "-".into()),
    );
    let affordances = [ProfileField::Name, ProfileField::Age, ProfileField::Gender]
        .into_iter()
        .map(|field| Affordance::new(format!("Change {field}"), format!("change_{field}")))
        .collect();

    broker.transport.notify(Outbound::text(chat_id, text).with_affordances(affordances)).await;
    Ok(())
}

/// `change_<field>`: the next text the user sends replaces that field.
pub async fn begin_edit(broker: &Broker, chat_id: ChatId, field: ProfileField) -> RelayResult<()> {
    let profile = broker.profiles.get(chat_id).await?.ok_or(RelayError::NotFound("profile"))?;
    if profile.chatting_with.is_some() {
        return Err(RelayError::Paired);
    }

    broker.sessions.set_awaiting_field(chat_id, field);
    info!(chat_id, %field, "editing profile field");
    broker.transport.notify(prompt_for(chat_id, field)).await;
    Ok(())
}

pub async fn apply_edit(broker: &Broker, chat_id: ChatId, field: ProfileField, input: &str) -> RelayResult<()> {
    let profile = broker.profiles.get(chat_id).await?.ok_or(RelayError::NotFound("profile"))?;
    if profile.chatting_with.is_some() {
        broker.sessions.clear_awaiting_field(chat_id);
        return Err(RelayError::Paired);
    }

    // The field stays awaited until valid input arrives.
    if let Err(err) = write_field(broker, chat_id, field, input).await {
        broker.transport.notify(prompt_for(chat_id, field)).await;
        return Err(err);
    }
    broker.sessions.clear_awaiting_field(chat_id);

    let profile = broker.profiles.get(chat_id).await?.ok_or(RelayError::NotFound("profile"))?;
    broker
        .transport
        .notify(Outbound::text(chat_id, format!("Your {field} was updated.")).with_affordances(menu(&profile)))
        .await;
    Ok(())
}

async fn write_field(broker: &Broker, chat_id: ChatId, field: ProfileField, input: &str) -> RelayResult<()> {
    match field {
        ProfileField::Name => broker.profiles.set_name(chat_id, &parse_name(input)?).await?,
        ProfileField::Age => broker.profiles.set_age(chat_id, parse_age(input)?).await?,
        ProfileField::Gender => broker.profiles.set_gender(chat_id, parse_gender(input)?).await?,
    }
    Ok(())
}

fn parse_name(input: &str) -> RelayResult<String> {
    let name = input.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(RelayError::validation(format!("Please send a name of 1 to {MAX_NAME_CHARS} characters.")));
    }
    Ok(name.to_owned())
}

fn parse_age(input: &str) -> RelayResult<i64> {
    let digits = input.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RelayError::validation("Numbers only, please."));
    }
    digits
        .parse::<u32>()
        .map(i64::from)
        .map_err(|_| RelayError::validation("That age is out of range."))
}

fn parse_gender(input: &str) -> RelayResult<Gender> {
    input
        .parse::<Gender>()
        .map_err(|_| RelayError::validation("Please pick male or female."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_must_be_all_digits() {
        assert_eq!(parse_age(" 27 ").unwrap(), 27);
        assert_eq!(parse_age("0").unwrap(), 0);
        assert!(matches!(parse_age("-3"), Err(RelayError::Validation(_))));
        assert!(matches!(parse_age("twenty"), Err(RelayError::Validation(_))));
        assert!(matches!(parse_age(""), Err(RelayError::Validation(_))));
        assert!(matches!(parse_age("99999999999"), Err(RelayError::Validation(_))));
    }

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(parse_name("  Rumi ").unwrap(), "Rumi");
        assert!(parse_name("   ").is_err());
        assert!(parse_name(&"x".repeat(MAX_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn gender_prompt_offers_both_buttons() {
        let prompt = prompt_for(1, ProfileField::Gender);
        assert!(prompt.has_affordance("gender_male"));
        assert!(prompt.has_affordance("gender_female"));
    }
}
