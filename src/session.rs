//! Ephemeral per-user context. Nothing here is persisted: it only steers how
//! the next free-form message or page request from a user is interpreted.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use crate::{
    db::{ChatId, ProfileField},
    matching::GenderFilter,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Set by a `reply_<id>` press; the next message goes to this sender.
    pub reply_target: Option<ChatId>,
    /// Set by a `change_<field>` press; the next text edits this field.
    pub awaiting_field: Option<ProfileField>,
    /// Filter of the current candidate browse, reused by `prev_`/`next_`.
    pub browse_filter: GenderFilter,
    /// Set by `start` until name, age and gender are all stored.
    pub registering: bool,
}

#[derive(Clone, Default)]
pub struct Sessions {
    contexts: Arc<DashMap<ChatId, SessionContext>>,
}

impl Sessions {
    pub fn get(&self, chat_id: ChatId) -> SessionContext {
        self.contexts.get(&chat_id).map(|ctx| *ctx).unwrap_or_default()
    }

    pub fn set_reply_target(&self, chat_id: ChatId, target: ChatId) {
        let mut ctx = self.contexts.entry(chat_id).or_default();
        ctx.reply_target = Some(target);
        ctx.awaiting_field = None;
    }

    pub fn take_reply_target(&self, chat_id: ChatId) -> Option<ChatId> {
        self.contexts.get_mut(&chat_id)?.reply_target.take()
    }

    pub fn set_awaiting_field(&self, chat_id: ChatId, field: ProfileField) {
        let mut ctx = self.contexts.entry(chat_id).or_default();
        ctx.awaiting_field = Some(field);
        ctx.reply_target = None;
    }

    pub fn clear_awaiting_field(&self, chat_id: ChatId) {
        if let Some(mut ctx) = self.contexts.get_mut(&chat_id) {
            ctx.awaiting_field = None;
        }
    }

    pub fn set_registering(&self, chat_id: ChatId, registering: bool) {
        if registering {
            self.contexts.entry(chat_id).or_default().registering = true;
        } else if let Some(mut ctx) = self.contexts.get_mut(&chat_id) {
            ctx.registering = false;
        }
    }

    pub fn set_browse_filter(&self, chat_id: ChatId, filter: GenderFilter) {
        self.contexts.entry(chat_id).or_default().browse_filter = filter;
    }
}

/// Outstanding `(sender, candidate)` invitations. A candidate may hold several
/// at once, one per sender; each is consumed by the candidate's answer.
#[derive(Clone, Default)]
pub struct Invitations {
    pending: Arc<DashSet<(ChatId, ChatId)>>,
}

impl Invitations {
    pub fn record(&self, sender: ChatId, candidate: ChatId) {
        self.pending.insert((sender, candidate));
    }

    pub fn take(&self, sender: ChatId, candidate: ChatId) -> bool {
        self.pending.remove(&(sender, candidate)).is_some()
    }

    pub fn is_pending(&self, sender: ChatId, candidate: ChatId) -> bool {
        self.pending.contains(&(sender, candidate))
    }

    pub fn has_outgoing(&self, sender: ChatId) -> bool {
        self.pending.iter().any(|entry| entry.0 == sender)
    }

    /// Drops every invitation `chat_id` sent or received.
    pub fn forget(&self, chat_id: ChatId) {
        self.pending.retain(|(sender, candidate)| *sender != chat_id && *candidate != chat_id);
    }
}
