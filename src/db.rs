use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::debug;

/// Opaque, stable user identifier handed to us by the transport.
pub type ChatId = i64;

/// Display name stored on inbox rows that arrived through a link.
/// The unread inbox only ever lists rows carrying this marker.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(()),
        }
    }
}

/// The editable profile fields, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Age,
    Gender,
}

impl ProfileField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::Name => "name",
            ProfileField::Age => "age",
            ProfileField::Gender => "gender",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(ProfileField::Name),
            "age" => Ok(ProfileField::Age),
            "gender" => Ok(ProfileField::Gender),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Profile {
    pub chat_id: ChatId,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub chatting_with: Option<ChatId>,
    pub owner_id: Option<ChatId>,
}

impl Profile {
    pub fn blank(chat_id: ChatId) -> Profile {
        Profile {
            chat_id,
            name: None,
            age: None,
            gender: None,
            chatting_with: None,
            owner_id: None,
        }
    }

    /// First unset registration field, in the fixed order name, age, gender.
    pub fn first_missing(&self) -> Option<ProfileField> {
        if self.name.is_none() {
            Some(ProfileField::Name)
        } else if self.age.is_none() {
            Some(ProfileField::Age)
        } else if self.gender.is_none() {
            Some(ProfileField::Gender)
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.first_missing().is_none()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("someone")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PayloadKind {
    Text,
    Photo,
    Video,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            PayloadKind::Text => "text",
            PayloadKind::Photo => "photo",
            PayloadKind::Video => "video",
        })
    }
}

/// A relayable unit: text, or a transport-side reference to a photo or video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub kind: PayloadKind,
    pub content: String,
}

impl Payload {
    pub fn text(content: impl Into<String>) -> Payload {
        Payload { kind: PayloadKind::Text, content: content.into() }
    }

    pub fn photo(file_id: impl Into<String>) -> Payload {
        Payload { kind: PayloadKind::Photo, content: file_id.into() }
    }

    pub fn video(file_id: impl Into<String>) -> Payload {
        Payload { kind: PayloadKind::Video, content: file_id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct InboxMessage {
    pub id: i64,
    pub owner_id: ChatId,
    pub sender_id: ChatId,
    pub sender_name: String,
    pub kind: PayloadKind,
    pub content: String,
    pub is_read: bool,
}

impl InboxMessage {
    pub fn payload(&self) -> Payload {
        Payload { kind: self.kind, content: self.content.clone() }
    }
}

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect_with(options)
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

/// Single-connection pool over a private in-memory database.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&db_pool).await?;
    Ok(db_pool)
}

pub async fn migrate(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS profiles (
            chat_id INTEGER PRIMARY KEY,
            name TEXT,
            age INTEGER,
            gender TEXT,
            chatting_with INTEGER,
            owner_id INTEGER
        )",
    )
    .execute(db_pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS inbox (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            sender_id INTEGER NOT NULL,
            sender_name TEXT NOT NULL,
            kind TEXT NOT NULL,
            content TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(db_pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS inbox_unread ON inbox (owner_id, is_read)")
        .execute(db_pool)
        .await?;

    debug!("schema ready");
    Ok(())
}
