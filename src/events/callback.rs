use std::str::FromStr;

use crate::{
    db::{ChatId, Gender, ProfileField},
    error::RelayError,
    matching::GenderFilter,
};

/// A decoded button payload. The wire form is `<action>_<argument>`, or a bare
/// chat id for a candidate pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Accept(ChatId),
    Reject(ChatId),
    Prev(usize),
    Next(usize),
    Change(ProfileField),
    Reply(ChatId),
    Candidate(ChatId),
    Gender(Gender),
    Filter(GenderFilter),
    /// Menu button standing in for an argument-less command.
    Command(String),
}

impl FromStr for Callback {
    type Err = RelayError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let malformed = || RelayError::MalformedCallback(data.to_owned());

        if !data.is_empty() && data.bytes().all(|b| b.is_ascii_digit()) {
            return data.parse().map(Callback::Candidate).map_err(|_| malformed());
        }

        let (action, arg) = data.split_once('_').ok_or_else(malformed)?;
        if arg.is_empty() {
            return Err(malformed());
        }

        let callback = match action {
            "accept" => Callback::Accept(arg.parse().map_err(|_| malformed())?),
            "reject" => Callback::Reject(arg.parse().map_err(|_| malformed())?),
            "prev" => Callback::Prev(arg.parse().map_err(|_| malformed())?),
            "next" => Callback::Next(arg.parse().map_err(|_| malformed())?),
            "change" => Callback::Change(arg.parse().map_err(|_| malformed())?),
            "reply" => Callback::Reply(arg.parse().map_err(|_| malformed())?),
            "gender" => Callback::Gender(arg.parse().map_err(|_| malformed())?),
            "filter" => Callback::Filter(arg.parse().map_err(|_| malformed())?),
            "cmd" => Callback::Command(arg.to_owned()),
            _ => return Err(malformed()),
        };
        Ok(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_action() {
        assert_eq!("accept_12".parse::<Callback>().unwrap(), Callback::Accept(12));
        assert_eq!("reject_12".parse::<Callback>().unwrap(), Callback::Reject(12));
        assert_eq!("prev_0".parse::<Callback>().unwrap(), Callback::Prev(0));
        assert_eq!("next_3".parse::<Callback>().unwrap(), Callback::Next(3));
        assert_eq!("change_age".parse::<Callback>().unwrap(), Callback::Change(ProfileField::Age));
        assert_eq!("reply_77".parse::<Callback>().unwrap(), Callback::Reply(77));
        assert_eq!("1877238598".parse::<Callback>().unwrap(), Callback::Candidate(1877238598));
        assert_eq!("gender_female".parse::<Callback>().unwrap(), Callback::Gender(Gender::Female));
        assert_eq!("filter_random".parse::<Callback>().unwrap(), Callback::Filter(GenderFilter::Random));
        assert_eq!(
            "cmd_begin_matching".parse::<Callback>().unwrap(),
            Callback::Command("begin_matching".into())
        );
    }

    #[test]
    fn rejects_garbage() {
        for data in ["", "accept", "accept_", "accept_x", "prev_-1", "change_height", "dance_1", "12a", "_5"] {
            assert!(
                matches!(data.parse::<Callback>(), Err(RelayError::MalformedCallback(_))),
                "{data:?} should be malformed"
            );
        }
    }
}
