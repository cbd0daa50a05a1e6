use tracing::info;

use crate::{
    Broker,
    db::{ChatId, Gender, Profile},
    error::{RelayError, RelayResult},
    transport::Outbound,
};

fn require_admin(broker: &Broker, chat_id: ChatId) -> RelayResult<()> {
    if broker.settings.is_admin(chat_id) {
        Ok(())
    } else {
        Err(RelayError::validation("You don't have access to this command."))
    }
}

fn describe(profile: &Profile) -> String {
    format!(
        "chat_id: {}, name: {}, age: {}, gender: {}, chatting_with: {}, owner_id: {}",
        profile.chat_id,
        profile.name.as_deref().unwrap_or("-"),
        profile.age.map(|age| age.to_string()).unwrap_or_else(|| "-".into()),
        profile.gender.map(|gender| gender.to_string()).unwrap_or_else(|| "-".into()),
        profile.chatting_with.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
        profile.owner_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
    )
}

pub async fn list_all_users(broker: &Broker, admin_id: ChatId) -> RelayResult<Vec<Profile>> {
    require_admin(broker, admin_id)?;
    let profiles = broker.profiles.all().await?;

    let text = if profiles.is_empty() {
        "No users registered.".to_owned()
    } else {
        let lines: Vec<String> = profiles.iter().map(describe).collect();
        format!("Users:\n{}", lines.join("\n"))
    };
    broker.transport.notify(Outbound::text(admin_id, text)).await;
    Ok(profiles)
}

/// Adds a named, gendered profile without an age.
pub async fn create_test_user(broker: &Broker, admin_id: ChatId, args: &[String]) -> RelayResult<Profile> {
    require_admin(broker, admin_id)?;

    let [chat_id, name, gender] = args else {
        return Err(RelayError::validation("Usage: create_test_user <chat_id> <name> <male|female>"));
    };
    let chat_id = chat_id
        .parse::<ChatId>()
        .map_err(|_| RelayError::validation("chat_id must be a number."))?;
    let gender = gender
        .parse::<Gender>()
        .map_err(|_| RelayError::validation("gender must be male or female."))?;

    let profile = Profile {
        name: Some(name.clone()),
        gender: Some(gender),
        ..Profile::blank(chat_id)
    };
    if !broker.profiles.create(&profile).await? {
        return Err(RelayError::validation("A user with this chat_id already exists."));
    }
    info!(admin_id, chat_id, "test user created");

    broker
        .transport
        .notify(Outbound::text(admin_id, format!("Test user {name} added with chat_id {chat_id}.")))
        .await;
    Ok(profile)
}

pub async fn dump_profile(broker: &Broker, chat_id: ChatId) -> RelayResult<Profile> {
    let profile = broker.profiles.get(chat_id).await?.ok_or(RelayError::NotFound("profile"))?;
    let state = crate::pairing::state(broker, chat_id).await?;
    broker
        .transport
        .notify(Outbound::text(chat_id, format!("{}\nstate: {state:?}", describe(&profile))))
        .await;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Settings, db, transport::Transport};

    async fn broker(admin_id: Option<ChatId>) -> Broker {
        let settings = Settings { admin_id, ..Settings::default() };
        Broker::new(db::connect_in_memory().await.unwrap(), Transport::new(16, None), settings)
    }

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn only_admin_may_list() {
        let broker = broker(Some(1)).await;
        assert!(matches!(list_all_users(&broker, 2).await, Err(RelayError::Validation(_))));
        assert!(list_all_users(&broker, 1).await.unwrap().is_empty());

        let nobody = self::broker(None).await;
        assert!(list_all_users(&nobody, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_user_is_created_once() {
        let broker = broker(Some(1)).await;
        let profile = create_test_user(&broker, 1, &args(&["500", "Ali", "male"])).await.unwrap();
        assert_eq!(profile.gender, Some(Gender::Male));
        assert_eq!(profile.age, None);

        let again = create_test_user(&broker, 1, &args(&["500", "Ali", "male"])).await;
        assert!(matches!(again, Err(RelayError::Validation(_))));

        let bad_gender = create_test_user(&broker, 1, &args(&["501", "Bo", "robot"])).await;
        assert!(matches!(bad_gender, Err(RelayError::Validation(_))));

        let listed = list_all_users(&broker, 1).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn dump_requires_a_profile() {
        let broker = broker(None).await;
        assert!(matches!(dump_profile(&broker, 9).await, Err(RelayError::NotFound(_))));
        broker.profiles.ensure(9).await.unwrap();
        assert_eq!(dump_profile(&broker, 9).await.unwrap(), Profile::blank(9));
    }
}
