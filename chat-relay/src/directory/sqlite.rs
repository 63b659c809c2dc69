//! SQLite backend for the user and room directories.

use super::{
    hash_password_blocking, verify_password_blocking, Room, RoomDirectory, User, UserDirectory,
};
use crate::error::StorageError;
use async_trait::async_trait;
use chat_types::RoomId;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// SQLite-based user and room directory.
///
/// Uses WAL mode for concurrent reads/writes.
#[derive(Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDirectory")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl SqliteDirectory {
    /// Open (or create) a directory database at `path`.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let directory = Self { pool };
        directory.run_migrations().await?;
        Ok(directory)
    }

    /// Create an in-memory directory (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // One connection: every :memory: connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let directory = Self { pool };
        directory.run_migrations().await?;
        Ok(directory)
    }

    /// Close every pooled connection; later queries fail.
    #[cfg(test)]
    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rooms_owner ON rooms(owner_id)")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rooms_name ON rooms(name)")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteDirectory {
    async fn create_user(&self, email: &str, password: &str) -> Result<User, StorageError> {
        let password_hash = hash_password_blocking(password).await?;

        let result = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES (?1, ?2)
            RETURNING id, email, password_hash
            "#,
        )
        .bind(email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::EmailTaken {
                    email: email.to_string(),
                })
            }
            Err(e) => Err(StorageError::Database(e)),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(row.map(User::from))
    }

    async fn check_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, StorageError> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };

        if verify_password_blocking(password, &user.password_hash).await? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl RoomDirectory for SqliteDirectory {
    async fn create_room(&self, name: &str, owner_id: i64) -> Result<Room, StorageError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            INSERT INTO rooms (name, owner_id)
            VALUES (?1, ?2)
            RETURNING id, name, owner_id
            "#,
        )
        .bind(name)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(row.into())
    }

    async fn room_exists(&self, room_id: RoomId) -> Result<bool, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE id = ?1")
            .bind(room_id.value())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(count > 0)
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>, StorageError> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, owner_id FROM rooms WHERE id = ?1",
        )
        .bind(room_id.value())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(row.map(Room::from))
    }

    async fn rooms_owned_by(&self, owner_id: i64) -> Result<Vec<Room>, StorageError> {
        let rows = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, owner_id FROM rooms WHERE owner_id = ?1 ORDER BY id ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(rows.into_iter().map(Room::from).collect())
    }

    async fn search_rooms(&self, query: &str) -> Result<Vec<Room>, StorageError> {
        // instr() keeps '%' and '_' in the query literal.
        let rows = sqlx::query_as::<_, RoomRow>(
            "SELECT id, name, owner_id FROM rooms WHERE instr(name, ?1) > 0 ORDER BY id ASC",
        )
        .bind(query)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(rows.into_iter().map(Room::from).collect())
    }

    async fn delete_room(&self, room_id: RoomId, owner_id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = ?1 AND owner_id = ?2")
            .bind(room_id.value())
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;
        Ok(())
    }
}

/// Internal row type for user queries.
#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
        }
    }
}

/// Internal row type for room queries.
#[derive(sqlx::FromRow)]
struct RoomRow {
    id: i64,
    name: String,
    owner_id: i64,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            id: RoomId::new(row.id),
            name: row.name,
            owner_id: row.owner_id,
        }
    }
}
