//! Postgres and MySQL through one `sqlx` Any pool. The dialect only matters
//! for placeholder syntax; the schema is portable.

use async_trait::async_trait;
use log::info;
use sqlx::any::{install_default_drivers, AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};

use super::{ChatStore, StoreError};
use crate::models::{Message, UserRecord};
use crate::room::{ActiveCall, Privacy, Room, RoomType};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id VARCHAR(64) PRIMARY KEY,
        name VARCHAR(255) NOT NULL UNIQUE,
        password_hash VARCHAR(255) NOT NULL,
        profile_picture TEXT
    )",
    "CREATE TABLE IF NOT EXISTS rooms (
        id VARCHAR(64) PRIMARY KEY,
        name VARCHAR(255) NOT NULL,
        room_type VARCHAR(16) NOT NULL,
        privacy VARCHAR(16) NOT NULL,
        created_by VARCHAR(64) NOT NULL,
        created_at BIGINT NOT NULL,
        join_key VARCHAR(128),
        active_call TEXT
    )",
    "CREATE TABLE IF NOT EXISTS room_members (
        room_id VARCHAR(64) NOT NULL,
        user_id VARCHAR(64) NOT NULL,
        joined_at BIGINT NOT NULL,
        PRIMARY KEY (room_id, user_id)
    )",
];

/// `seq` keeps insertion order for messages stamped in the same millisecond.
const POSTGRES_MESSAGES: &str = "CREATE TABLE IF NOT EXISTS messages (
    seq BIGSERIAL PRIMARY KEY,
    id VARCHAR(64) NOT NULL UNIQUE,
    room_id VARCHAR(64) NOT NULL,
    created_at BIGINT NOT NULL,
    body TEXT NOT NULL
)";

const MYSQL_MESSAGES: &str = "CREATE TABLE IF NOT EXISTS messages (
    seq BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    id VARCHAR(64) NOT NULL UNIQUE,
    room_id VARCHAR(64) NOT NULL,
    created_at BIGINT NOT NULL,
    body TEXT NOT NULL
)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Some(Dialect::Postgres)
        } else if url.starts_with("mysql://") || url.starts_with("mariadb://") {
            Some(Dialect::MySql)
        } else {
            None
        }
    }

    pub fn schema(self) -> impl Iterator<Item = &'static str> {
        let messages = match self {
            Dialect::Postgres => POSTGRES_MESSAGES,
            Dialect::MySql => MYSQL_MESSAGES,
        };
        SCHEMA.iter().copied().chain(std::iter::once(messages))
    }

    /// Queries are written with `?`; Postgres wants `$1, $2, ...`.
    pub fn rewrite(self, query: &str) -> String {
        match self {
            Dialect::MySql => query.to_string(),
            Dialect::Postgres => {
                let mut out = String::with_capacity(query.len() + 8);
                let mut n = 0;
                for c in query.chars() {
                    if c == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(c);
                    }
                }
                out
            }
        }
    }
}

pub struct SqlStore {
    pool: AnyPool,
    dialect: Dialect,
}

impl SqlStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let dialect =
            Dialect::from_url(url).ok_or_else(|| StoreError::UnsupportedUrl(url.to_string()))?;
        install_default_drivers();
        let pool = AnyPoolOptions::new().max_connections(10).connect(url).await?;

        for statement in dialect.schema() {
            sqlx::query(statement).execute(&pool).await?;
        }
        info!("Connected to {dialect:?} store");

        Ok(SqlStore { pool, dialect })
    }

    fn sql(&self, query: &str) -> String {
        self.dialect.rewrite(query)
    }

    async fn members(&self, room_id: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(&self.sql(
            "SELECT user_id FROM room_members WHERE room_id = ? ORDER BY joined_at, user_id",
        ))
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("user_id").map_err(StoreError::from))
            .collect()
    }

    async fn hydrate(&self, row: &AnyRow) -> Result<Room, StoreError> {
        let id: String = row.try_get("id")?;
        let kind: String = row.try_get("room_type")?;
        let privacy: String = row.try_get("privacy")?;
        let active_call: Option<String> = row.try_get("active_call")?;
        let users = self.members(&id).await?;

        Ok(Room {
            name: row.try_get("name")?,
            kind: RoomType::parse(&kind)
                .ok_or_else(|| StoreError::Corrupt(format!("room type {kind}")))?,
            privacy: Privacy::parse(&privacy)
                .ok_or_else(|| StoreError::Corrupt(format!("privacy {privacy}")))?,
            active_call: active_call
                .map(|raw| serde_json::from_str::<ActiveCall>(&raw))
                .transpose()?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            join_key: row.try_get("join_key")?,
            messages: Vec::new(),
            users,
            id,
        })
    }

    fn user_from_row(row: &AnyRow) -> Result<UserRecord, StoreError> {
        Ok(UserRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            profile_picture: row.try_get("profile_picture")?,
        })
    }

    fn message_from_row(row: &AnyRow) -> Result<Message, StoreError> {
        let body: String = row.try_get("body")?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ChatStore for SqlStore {
    async fn create_user(&self, user: UserRecord) -> Result<(), StoreError> {
        let result = sqlx::query(&self.sql(
            "INSERT INTO users (id, name, password_hash, profile_picture) VALUES (?, ?, ?, ?)",
        ))
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&user.profile_picture)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::DuplicateName)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(&self.sql("SELECT * FROM users WHERE name = ?"))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(&self.sql("SELECT * FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::user_from_row).collect()
    }

    async fn create_room(&self, room: &Room) -> Result<(), StoreError> {
        let call = room.active_call.as_ref().map(serde_json::to_string).transpose()?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(&self.sql(
            "INSERT INTO rooms (id, name, room_type, privacy, created_by, created_at, join_key, active_call)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        ))
        .bind(&room.id)
        .bind(&room.name)
        .bind(room.kind.as_str())
        .bind(room.privacy.as_str())
        .bind(&room.created_by)
        .bind(room.created_at)
        .bind(&room.join_key)
        .bind(call)
        .execute(&mut *tx)
        .await?;

        for (offset, user) in (0_i64..).zip(&room.users) {
            sqlx::query(&self.sql(
                "INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)",
            ))
            .bind(&room.id)
            .bind(user)
            .bind(room.created_at + offset)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_room(&self, id: &str) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query(&self.sql("SELECT * FROM rooms WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn list_rooms_for_user(&self, user_id: &str) -> Result<Vec<Room>, StoreError> {
        let rows = sqlx::query(&self.sql(
            "SELECT * FROM rooms
             WHERE privacy = 'public'
                OR id IN (SELECT room_id FROM room_members WHERE user_id = ?)
             ORDER BY created_at",
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rooms = Vec::with_capacity(rows.len());
        for row in &rows {
            rooms.push(self.hydrate(row).await?);
        }
        Ok(rooms)
    }

    async fn delete_room(&self, id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&self.sql("DELETE FROM messages WHERE room_id = ?"))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&self.sql("DELETE FROM room_members WHERE room_id = ?"))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query(&self.sql("DELETE FROM rooms WHERE id = ?"))
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let room = self.get_room(room_id).await?.ok_or(StoreError::Missing)?;
        if room.is_member(user_id) {
            return Ok(false);
        }
        sqlx::query(&self.sql(
            "INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)",
        ))
        .bind(room_id)
        .bind(user_id)
        .bind(crate::models::now_millis())
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    async fn remove_member(&self, room_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let removed = sqlx::query(&self.sql(
            "DELETE FROM room_members WHERE room_id = ? AND user_id = ?",
        ))
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(removed > 0)
    }

    async fn set_active_call(&self, room_id: &str, call: Option<&ActiveCall>) -> Result<(), StoreError> {
        let call = call.map(serde_json::to_string).transpose()?;
        let updated = sqlx::query(&self.sql("UPDATE rooms SET active_call = ? WHERE id = ?"))
            .bind(call)
            .bind(room_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> Result<(), StoreError> {
        let body = serde_json::to_string(message)?;
        sqlx::query(&self.sql(
            "INSERT INTO messages (id, room_id, created_at, body) VALUES (?, ?, ?, ?)",
        ))
        .bind(&message.id)
        .bind(&message.room_id)
        .bind(message.timestamp)
        .bind(body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_message(&self, room_id: &str, id: &str) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query(&self.sql("SELECT body FROM messages WHERE room_id = ? AND id = ?"))
            .bind(room_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::message_from_row).transpose()
    }

    async fn update_message(&self, message: &Message) -> Result<(), StoreError> {
        let body = serde_json::to_string(message)?;
        let updated = sqlx::query(&self.sql(
            "UPDATE messages SET body = ? WHERE room_id = ? AND id = ?",
        ))
        .bind(body)
        .bind(&message.room_id)
        .bind(&message.id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    async fn list_messages(&self, room_id: &str, limit: Option<usize>) -> Result<Vec<Message>, StoreError> {
        let rows = match limit {
            Some(limit) => {
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                let mut rows = sqlx::query(&self.sql(
                    "SELECT body FROM messages WHERE room_id = ?
                     ORDER BY seq DESC LIMIT ?",
                ))
                .bind(room_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
                rows.reverse();
                rows
            }
            None => {
                sqlx::query(&self.sql(
                    "SELECT body FROM messages WHERE room_id = ? ORDER BY seq",
                ))
                .bind(room_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(Self::message_from_row).collect()
    }
}
