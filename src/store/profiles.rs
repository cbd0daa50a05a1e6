use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::db::{ChatId, Gender, Profile};

const PROFILE_COLUMNS: &str = "chat_id,name,age,gender,chatting_with,owner_id";

#[derive(Clone)]
pub struct ProfileStore {
    db_pool: SqlitePool,
}

impl ProfileStore {
    pub fn new(db_pool: SqlitePool) -> ProfileStore {
        ProfileStore { db_pool }
    }

    pub async fn get(&self, chat_id: ChatId) -> Result<Option<Profile>, sqlx::Error> {
        let profile = sqlx::query_as::<_, Profile>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE chat_id=?"))
            .bind(chat_id)
            .fetch_optional(&self.db_pool)
            .await?;
        debug!(chat_id, ?profile, "loaded profile");
        Ok(profile)
    }

    /// Returns the existing profile, creating a blank one on first contact.
    pub async fn ensure(&self, chat_id: ChatId) -> Result<Profile, sqlx::Error> {
        let inserted = sqlx::query("INSERT OR IGNORE INTO profiles (chat_id) VALUES (?)")
            .bind(chat_id)
            .execute(&self.db_pool)
            .await?
            .rows_affected();
        if inserted > 0 {
            debug!(chat_id, "created blank profile");
        }

        Ok(self.get(chat_id).await?.unwrap_or_else(|| Profile::blank(chat_id)))
    }

    /// Inserts a full row. Returns `false` without touching anything if the id is taken.
    pub async fn create(&self, profile: &Profile) -> Result<bool, sqlx::Error> {
        let inserted = sqlx::query("INSERT OR IGNORE INTO profiles (chat_id,name,age,gender) VALUES (?,?,?,?)")
            .bind(profile.chat_id)
            .bind(&profile.name)
            .bind(profile.age)
            .bind(profile.gender)
            .execute(&self.db_pool)
            .await?
            .rows_affected();
        Ok(inserted > 0)
    }

    pub async fn set_name(&self, chat_id: ChatId, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET name=? WHERE chat_id=?")
            .bind(name)
            .bind(chat_id)
            .execute(&self.db_pool)
            .await?;
        debug!(chat_id, name, "updated name");
        Ok(())
    }

    pub async fn set_age(&self, chat_id: ChatId, age: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET age=? WHERE chat_id=?")
            .bind(age)
            .bind(chat_id)
            .execute(&self.db_pool)
            .await?;
        debug!(chat_id, age, "updated age");
        Ok(())
    }

    pub async fn set_gender(&self, chat_id: ChatId, gender: Gender) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET gender=? WHERE chat_id=?")
            .bind(gender)
            .bind(chat_id)
            .execute(&self.db_pool)
            .await?;
        debug!(chat_id, %gender, "updated gender");
        Ok(())
    }

    /// Points `chat_id` at a link owner. Refused (returns `false`) while `chat_id`
    /// is paired, so a row never carries both relations.
    pub async fn set_owner(&self, chat_id: ChatId, owner_id: ChatId) -> Result<bool, sqlx::Error> {
        let updated = sqlx::query("UPDATE profiles SET owner_id=? WHERE chat_id=? AND chatting_with IS NULL")
            .bind(owner_id)
            .bind(chat_id)
            .execute(&self.db_pool)
            .await?
            .rows_affected();
        debug!(chat_id, owner_id, updated, "set link owner");
        Ok(updated > 0)
    }

    pub async fn clear_owner(&self, chat_id: ChatId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET owner_id=NULL WHERE chat_id=?")
            .bind(chat_id)
            .execute(&self.db_pool)
            .await?;
        debug!(chat_id, "cleared link owner");
        Ok(())
    }

    /// Pairs `a` and `b` in one transaction. Each side is only written while it is
    /// unpaired; if either write misses, nothing is committed and `false` is returned.
    pub async fn pair(&self, a: ChatId, b: ChatId) -> Result<bool, sqlx::Error> {
        if a == b {
            return Ok(false);
        }

        let mut tx = self.db_pool.begin().await?;
        for (me, partner) in [(a, b), (b, a)] {
            let updated = sqlx::query(
                "UPDATE profiles SET chatting_with=?, owner_id=NULL WHERE chat_id=? AND chatting_with IS NULL",
            )
            .bind(partner)
            .bind(me)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated != 1 {
                warn!(chat_id = me, partner, "pairing write missed, rolling back");
                tx.rollback().await?;
                return Ok(false);
            }
        }
        tx.commit().await?;

        debug!(a, b, "paired");
        Ok(true)
    }

    /// Clears the pairing of `chat_id` on both sides. Returns the former partner,
    /// or `None` if `chat_id` was not paired.
    pub async fn unpair(&self, chat_id: ChatId) -> Result<Option<ChatId>, sqlx::Error> {
        let mut tx = self.db_pool.begin().await?;

        let partner: Option<(Option<ChatId>,)> = sqlx::query_as("SELECT chatting_with FROM profiles WHERE chat_id=?")
            .bind(chat_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(partner) = partner.and_then(|(partner,)| partner) else {
            tx.rollback().await?;
            return Ok(None);
        };

        for (me, other) in [(chat_id, partner), (partner, chat_id)] {
            sqlx::query("UPDATE profiles SET chatting_with=NULL WHERE chat_id=? AND chatting_with=?")
                .bind(me)
                .bind(other)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(chat_id, partner, "unpaired");
        Ok(Some(partner))
    }

    /// Unpaired, named profiles other than `exclude`, optionally of one gender,
    /// in id order. Blank rows left by link visitors never show up.
    pub async fn available(
        &self,
        exclude: ChatId,
        gender: Option<Gender>,
    ) -> Result<Vec<(ChatId, Option<String>)>, sqlx::Error> {
        let users = match gender {
            Some(gender) => {
                sqlx::query_as(
                    "SELECT chat_id,name FROM profiles WHERE gender=? AND name IS NOT NULL AND chatting_with IS NULL AND chat_id!=? ORDER BY chat_id",
                )
                .bind(gender)
                .bind(exclude)
                .fetch_all(&self.db_pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT chat_id,name FROM profiles WHERE name IS NOT NULL AND chatting_with IS NULL AND chat_id!=? ORDER BY chat_id")
                    .bind(exclude)
                    .fetch_all(&self.db_pool)
                    .await?
            }
        };
        debug!(exclude, ?gender, found = users.len(), "scanned available profiles");
        Ok(users)
    }

    pub async fn all(&self) -> Result<Vec<Profile>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY chat_id"))
            .fetch_all(&self.db_pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn store() -> ProfileStore {
        ProfileStore::new(db::connect_in_memory().await.unwrap())
    }

    async fn complete(store: &ProfileStore, chat_id: ChatId, name: &str, gender: Gender) {
        store.ensure(chat_id).await.unwrap();
        store.set_name(chat_id, name).await.unwrap();
        store.set_age(chat_id, 25).await.unwrap();
        store.set_gender(chat_id, gender).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_creates_once() {
        let store = store().await;
        assert_eq!(store.ensure(7).await.unwrap(), Profile::blank(7));

        store.set_name(7, "Nia").await.unwrap();
        let profile = store.ensure(7).await.unwrap();
        assert_eq!(profile.name.as_deref(), Some("Nia"));
    }

    #[tokio::test]
    async fn pair_is_symmetric_and_exclusive() {
        let store = store().await;
        complete(&store, 1, "A", Gender::Male).await;
        complete(&store, 2, "B", Gender::Female).await;
        complete(&store, 3, "C", Gender::Female).await;

        assert!(store.pair(1, 2).await.unwrap());
        assert_eq!(store.get(1).await.unwrap().unwrap().chatting_with, Some(2));
        assert_eq!(store.get(2).await.unwrap().unwrap().chatting_with, Some(1));

        // 3 is free but 2 is not: the first write must be rolled back.
        assert!(!store.pair(3, 2).await.unwrap());
        assert_eq!(store.get(3).await.unwrap().unwrap().chatting_with, None);
        assert_eq!(store.get(2).await.unwrap().unwrap().chatting_with, Some(1));
    }

    #[tokio::test]
    async fn pair_with_missing_profile_writes_nothing() {
        let store = store().await;
        complete(&store, 1, "A", Gender::Male).await;

        assert!(!store.pair(1, 99).await.unwrap());
        assert_eq!(store.get(1).await.unwrap().unwrap().chatting_with, None);
    }

    #[tokio::test]
    async fn unpair_clears_both_sides() {
        let store = store().await;
        complete(&store, 1, "A", Gender::Male).await;
        complete(&store, 2, "B", Gender::Female).await;
        store.pair(1, 2).await.unwrap();

        assert_eq!(store.unpair(2).await.unwrap(), Some(1));
        assert_eq!(store.get(1).await.unwrap().unwrap().chatting_with, None);
        assert_eq!(store.get(2).await.unwrap().unwrap().chatting_with, None);
        assert_eq!(store.unpair(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn owner_and_pairing_are_exclusive() {
        let store = store().await;
        complete(&store, 1, "A", Gender::Male).await;
        complete(&store, 2, "B", Gender::Female).await;
        complete(&store, 3, "C", Gender::Female).await;

        assert!(store.set_owner(1, 3).await.unwrap());
        store.pair(1, 2).await.unwrap();
        assert_eq!(store.get(1).await.unwrap().unwrap().owner_id, None);

        assert!(!store.set_owner(1, 3).await.unwrap());
    }

    #[tokio::test]
    async fn available_filters_by_gender_and_pairing() {
        let store = store().await;
        complete(&store, 1, "A", Gender::Male).await;
        complete(&store, 2, "B", Gender::Female).await;
        complete(&store, 3, "C", Gender::Female).await;
        complete(&store, 4, "D", Gender::Male).await;
        store.pair(3, 4).await.unwrap();

        let females = store.available(1, Some(Gender::Female)).await.unwrap();
        assert_eq!(females, vec![(2, Some("B".to_owned()))]);

        let anyone: Vec<ChatId> = store.available(1, None).await.unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(anyone, vec![2]);
    }

    #[tokio::test]
    async fn available_skips_nameless_rows() {
        let store = store().await;
        complete(&store, 1, "A", Gender::Male).await;
        complete(&store, 2, "B", Gender::Female).await;
        store.ensure(3).await.unwrap();

        let anyone: Vec<ChatId> = store.available(1, None).await.unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(anyone, vec![2]);
    }
}
