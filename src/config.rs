use anyhow::Context;

use crate::db::ChatId;

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    /// Prefix of every capability link; the owner's chat id is appended.
    pub link_base: String,
    pub admin_id: Option<ChatId>,
    pub outbound_webhook: Option<String>,
    pub feed_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "sqlite:pairrelay.db?mode=rwc".to_owned(),
            bind_addr: "0.0.0.0:8080".to_owned(),
            link_base: "https://t.me/pairrelay_bot?start=".to_owned(),
            admin_id: None,
            outbound_webhook: None,
            feed_capacity: 256,
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Settings> {
        let defaults = Settings::default();

        let admin_id = match dotenv::var("ADMIN_ID").ok() {
            Some(raw) => Some(
                raw.trim()
                    .parse::<ChatId>()
                    .with_context(|| format!("ADMIN_ID must be a chat id, got {raw:?}"))?,
            ),
            None => None,
        };

        let feed_capacity = match dotenv::var("FEED_CAPACITY").ok() {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("FEED_CAPACITY must be a positive integer, got {raw:?}"))?,
            None => defaults.feed_capacity,
        };

        Ok(Settings {
            database_url: dotenv::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: dotenv::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            link_base: dotenv::var("LINK_BASE").unwrap_or(defaults.link_base),
            admin_id,
            outbound_webhook: dotenv::var("OUTBOUND_WEBHOOK").ok().filter(|url| !url.is_empty()),
            feed_capacity: feed_capacity.max(1),
        })
    }

    pub fn is_admin(&self, chat_id: ChatId) -> bool {
        self.admin_id == Some(chat_id)
    }
}
