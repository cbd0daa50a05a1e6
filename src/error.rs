use crate::db::{ChatId, ProfileField};

pub type RelayResult<T> = Result<T, RelayError>;

/// Everything an event handler can fail with. None of these are fatal;
/// the dispatcher turns each into a notice for the acting user.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("no candidates available")]
    NoCandidates,

    #[error("action not allowed while paired")]
    Paired,

    #[error("counterpart is already in a chat")]
    Busy,

    #[error("profile incomplete, {0} missing")]
    Incomplete(ProfileField),

    #[error("action not allowed while composing through a link")]
    LinkMode,

    #[error("cannot target yourself")]
    SelfTarget,

    #[error("not connected to anyone")]
    NotConnected,

    #[error("delivery to {to} failed: {reason}")]
    Delivery { to: ChatId, reason: String },

    #[error("malformed button payload {0:?}")]
    MalformedCallback(String),

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl RelayError {
    pub fn validation(reason: impl Into<String>) -> RelayError {
        RelayError::Validation(reason.into())
    }

    /// Text shown to the user whose action failed.
    pub fn user_notice(&self) -> String {
        use RelayError::*;
        match self {
            Validation(reason) => reason.clone(),
            NotFound(what) => format!("{what} not found."),
            NoCandidates => "No users are available right now, try again in a few minutes.".to_owned(),
            Paired => "Exit the current chat first.".to_owned(),
            Busy => "That user is in a chat right now.".to_owned(),
            Incomplete(field) => format!("Please complete your registration first, starting with your {field}."),
            LinkMode => "You don't have access to that right now.".to_owned(),
            SelfTarget => "You can't do that with yourself.".to_owned(),
            NotConnected => "You're not connected to anyone. Use begin_matching to start a chat.".to_owned(),
            Delivery { .. } => "The message could not be delivered.".to_owned(),
            MalformedCallback(_) => "Invalid data.".to_owned(),
            Store(_) => "Something went wrong, please try again.".to_owned(),
        }
    }
}
