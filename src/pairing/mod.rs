//! Relationship lifecycle of a user:
//! `New -> Registering(name|age|gender) -> Ready -> PendingRequest -> Paired`.
//!
//! Registration progress and pairing live on the profile row. A pending request
//! is only an entry in [`crate::session::Invitations`], so a user can be asked
//! by several senders at once.

mod handshake;
mod registration;

pub use handshake::{Response, end_chat, propose, respond};
pub use registration::{apply_edit, begin_edit, prompt_for, show_profile, start, submit};

use crate::{
    Broker,
    db::{ChatId, Profile, ProfileField},
    error::{RelayError, RelayResult},
    transport::Affordance,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    New,
    Registering(ProfileField),
    Ready,
    /// Ready, with at least one outgoing invitation unanswered.
    PendingRequest,
    Paired(ChatId),
}

impl PairingState {
    pub fn of(profile: Option<&Profile>) -> PairingState {
        let Some(profile) = profile else {
            return PairingState::New;
        };

        if let Some(partner) = profile.chatting_with {
            PairingState::Paired(partner)
        } else if let Some(field) = profile.first_missing() {
            PairingState::Registering(field)
        } else {
            PairingState::Ready
        }
    }
}

pub async fn state(broker: &Broker, chat_id: ChatId) -> RelayResult<PairingState> {
    let profile = broker.profiles.get(chat_id).await?;
    Ok(match PairingState::of(profile.as_ref()) {
        PairingState::Ready if broker.invitations.has_outgoing(chat_id) => PairingState::PendingRequest,
        state => state,
    })
}

/// Entry guard for selection and invitation: the profile must be complete and unpaired.
pub fn require_ready(profile: Option<&Profile>) -> RelayResult<&Profile> {
    let Some(profile) = profile else {
        return Err(RelayError::Incomplete(ProfileField::Name));
    };
    if let Some(field) = profile.first_missing() {
        return Err(RelayError::Incomplete(field));
    }
    if profile.chatting_with.is_some() {
        return Err(RelayError::Paired);
    }
    Ok(profile)
}

/// The main menu, shaped by what the user can currently do.
pub fn menu(profile: &Profile) -> Vec<Affordance> {
    let mut menu = vec![
        Affordance::new("Start chat", "cmd_begin_matching"),
        Affordance::new("Your profile", "cmd_show_profile"),
    ];
    if profile.owner_id.is_none() {
        menu.push(Affordance::new("New messages", "cmd_list_unread"));
    }
    if profile.chatting_with.is_some() {
        menu.push(end_chat_affordance());
    }
    menu
}

pub fn end_chat_affordance() -> Affordance {
    Affordance::new("End chat", "cmd_end_chat")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Gender;

    fn complete(chat_id: ChatId) -> Profile {
        Profile {
            chat_id,
            name: Some("Kim".into()),
            age: Some(22),
            gender: Some(Gender::Female),
            chatting_with: None,
            owner_id: None,
        }
    }

    #[test]
    fn state_follows_the_profile_row() {
        assert_eq!(PairingState::of(None), PairingState::New);
        assert_eq!(
            PairingState::of(Some(&Profile::blank(1))),
            PairingState::Registering(ProfileField::Name)
        );
        assert_eq!(PairingState::of(Some(&complete(1))), PairingState::Ready);

        let mut paired = complete(1);
        paired.chatting_with = Some(2);
        assert_eq!(PairingState::of(Some(&paired)), PairingState::Paired(2));
    }

    #[test]
    fn ready_guard_reports_first_missing_field() {
        let mut profile = Profile::blank(1);
        profile.name = Some("Kim".into());
        assert!(matches!(require_ready(Some(&profile)), Err(RelayError::Incomplete(ProfileField::Age))));
        assert!(matches!(require_ready(None), Err(RelayError::Incomplete(ProfileField::Name))));

        let mut paired = complete(1);
        paired.chatting_with = Some(2);
        assert!(matches!(require_ready(Some(&paired)), Err(RelayError::Paired)));
        assert!(require_ready(Some(&complete(1))).is_ok());
    }

    #[test]
    fn menu_tracks_pairing_and_link_mode() {
        let mut profile = complete(1);
        assert!(menu(&profile).iter().any(|a| a.data == "cmd_list_unread"));
        assert!(!menu(&profile).iter().any(|a| a.data == "cmd_end_chat"));

        profile.chatting_with = Some(2);
        assert!(menu(&profile).iter().any(|a| a.data == "cmd_end_chat"));

        profile.chatting_with = None;
        profile.owner_id = Some(3);
        assert!(!menu(&profile).iter().any(|a| a.data == "cmd_list_unread"));
    }
}
