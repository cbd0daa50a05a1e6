use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::db::{ANONYMOUS, ChatId, InboxMessage, Payload};

const INBOX_COLUMNS: &str = "id,owner_id,sender_id,sender_name,kind,content,is_read";

pub struct NewInboxMessage<'a> {
    pub owner_id: ChatId,
    pub sender_id: ChatId,
    pub sender_name: &'a str,
    pub payload: &'a Payload,
}

/// Append-only message log. Rows never change after insert except for `is_read`.
#[derive(Clone)]
pub struct InboxStore {
    db_pool: SqlitePool,
}

impl InboxStore {
    pub fn new(db_pool: SqlitePool) -> InboxStore {
        InboxStore { db_pool }
    }

    pub async fn append(&self, msg: NewInboxMessage<'_>) -> Result<i64, sqlx::Error> {
        let id = sqlx::query("INSERT INTO inbox (owner_id,sender_id,sender_name,kind,content) VALUES (?,?,?,?,?)")
            .bind(msg.owner_id)
            .bind(msg.sender_id)
            .bind(msg.sender_name)
            .bind(msg.payload.kind)
            .bind(&msg.payload.content)
            .execute(&self.db_pool)
            .await?
            .last_insert_rowid();
        debug!(id, owner = msg.owner_id, sender = msg.sender_id, kind = %msg.payload.kind, "stored inbox message");
        Ok(id)
    }

    /// Unread rows for `owner_id` that arrived through a link, oldest first.
    pub async fn unread_anonymous(&self, owner_id: ChatId) -> Result<Vec<InboxMessage>, sqlx::Error> {
        sqlx::query_as::<_, InboxMessage>(&format!(
            "SELECT {INBOX_COLUMNS} FROM inbox WHERE owner_id=? AND is_read=0 AND sender_name=? ORDER BY id"
        ))
        .bind(owner_id)
        .bind(ANONYMOUS)
        .fetch_all(&self.db_pool)
        .await
    }

    pub async fn unread_count(&self, owner_id: ChatId) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM inbox WHERE owner_id=? AND is_read=0 AND sender_name=?")
                .bind(owner_id)
                .bind(ANONYMOUS)
                .fetch_one(&self.db_pool)
                .await?;
        Ok(count)
    }

    /// Flags exactly `ids` as read in one statement.
    pub async fn mark_read(&self, ids: &[i64]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE inbox SET is_read=1 WHERE id IN (");
        let mut separated = query.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let updated = query.build().execute(&self.db_pool).await?.rows_affected();
        debug!(updated, "marked inbox messages read");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn unread_lists_only_anonymous_rows() {
        let inbox = InboxStore::new(db::connect_in_memory().await.unwrap());
        let hello = Payload::text("hello");
        let photo = Payload::photo("file-1");

        inbox
            .append(NewInboxMessage { owner_id: 1, sender_id: 2, sender_name: ANONYMOUS, payload: &hello })
            .await
            .unwrap();
        inbox
            .append(NewInboxMessage { owner_id: 1, sender_id: 3, sender_name: "Partner", payload: &hello })
            .await
            .unwrap();
        inbox
            .append(NewInboxMessage { owner_id: 1, sender_id: 4, sender_name: ANONYMOUS, payload: &photo })
            .await
            .unwrap();

        let unread = inbox.unread_anonymous(1).await.unwrap();
        assert_eq!(unread.iter().map(|m| m.sender_id).collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(unread[1].payload(), photo);
        assert_eq!(inbox.unread_count(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn mark_read_touches_only_given_ids() {
        let inbox = InboxStore::new(db::connect_in_memory().await.unwrap());
        let body = Payload::text("hi");
        let first = inbox
            .append(NewInboxMessage { owner_id: 1, sender_id: 2, sender_name: ANONYMOUS, payload: &body })
            .await
            .unwrap();
        inbox
            .append(NewInboxMessage { owner_id: 1, sender_id: 3, sender_name: ANONYMOUS, payload: &body })
            .await
            .unwrap();

        assert_eq!(inbox.mark_read(&[first]).await.unwrap(), 1);
        assert_eq!(inbox.mark_read(&[]).await.unwrap(), 0);

        let unread = inbox.unread_anonymous(1).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].sender_id, 3);
    }
}
