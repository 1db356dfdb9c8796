//! Account facade: the only seam through which the server touches
//! credentials.
//!
//! The core consumes the [`AccountStore`] trait and nothing else. Two
//! implementations exist: [`SqlAccountStore`] persists accounts in
//! SQLite with Sha-256 password digests, and [`LocalAccountStore`] runs
//! with no database at all — every call succeeds with a synthesised
//! identity, which is what development and tests want.
//!
//! Plaintext passwords never leave this module: hashing happens inside
//! the store, and errors surface as coarse [`AccountError`] variants
//! whose details go to the log, not the client.

use sha2::{Digest, Sha256};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::AccountError;

/// A successfully authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginIdentity {
    pub id: String,
    pub nickname: String,
}

/// Validates and stores player credentials.
///
/// # Why a trait?
///
/// A trait is like an interface in other languages — it defines WHAT
/// something can do without specifying HOW. This lets the server:
/// - Use the SQLite store in production
/// - Use the accept-everyone local store in development
/// - Swap in a mock in tests
///
/// all without changing any handler code.
///
/// # Trait bounds explained
///
/// - `Send + Sync` → the store can be shared across async tasks (tokio
///   may call it from different threads simultaneously).
/// - `'static` → it doesn't borrow temporary data; it owns everything
///   it needs. Required because the store lives as long as the server.
pub trait AccountStore: Send + Sync + 'static {
    /// Registers a new account.
    fn create_account(
        &self,
        id: &str,
        nickname: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<(), AccountError>> + Send;

    /// Checks credentials and returns the stored identity.
    fn login(
        &self,
        id: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<LoginIdentity, AccountError>> + Send;
}

// ---------------------------------------------------------------------------
// Local mode
// ---------------------------------------------------------------------------

/// Account store for local mode (`use_database = false`).
///
/// Accepts everything and stores nothing. The nickname is synthesised
/// from the login id so repeated logins stay stable within a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAccountStore;

impl AccountStore for LocalAccountStore {
    async fn create_account(
        &self,
        id: &str,
        _nickname: &str,
        _password: &str,
    ) -> Result<(), AccountError> {
        tracing::debug!(id, "local mode: create_account accepted without storage");
        Ok(())
    }

    async fn login(
        &self,
        id: &str,
        _password: &str,
    ) -> Result<LoginIdentity, AccountError> {
        let nickname: String = id.chars().take(10).collect();
        Ok(LoginIdentity {
            id: id.to_owned(),
            nickname,
        })
    }
}

// ---------------------------------------------------------------------------
// SQLite-backed store
// ---------------------------------------------------------------------------

/// Account store backed by SQLite through sqlx.
pub struct SqlAccountStore {
    pool: SqlitePool,
}

impl SqlAccountStore {
    /// Opens the pool and ensures the users table exists.
    pub async fn connect(database_url: &str) -> Result<Self, AccountError> {
        // A single connection also keeps `sqlite::memory:` databases
        // coherent (every pooled connection would otherwise get its own
        // empty database).
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .map_err(unavailable)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                nickname TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(unavailable)?;

        tracing::info!(database_url, "account store connected");
        Ok(Self { pool })
    }
}

impl AccountStore for SqlAccountStore {
    async fn create_account(
        &self,
        id: &str,
        nickname: &str,
        password: &str,
    ) -> Result<(), AccountError> {
        let existing = sqlx::query("SELECT id FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        if existing.is_some() {
            return Err(AccountError::AlreadyExists);
        }

        sqlx::query(
            "INSERT INTO users (id, password_hash, nickname) VALUES (?, ?, ?)",
        )
        .bind(id)
        .bind(hash_password(password))
        .bind(nickname)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        tracing::info!(id, "account created");
        Ok(())
    }

    async fn login(
        &self,
        id: &str,
        password: &str,
    ) -> Result<LoginIdentity, AccountError> {
        let row = sqlx::query(
            "SELECT password_hash, nickname FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?
        .ok_or(AccountError::NotFound)?;

        let stored: String = row.get("password_hash");
        if stored != hash_password(password) {
            return Err(AccountError::BadCredentials);
        }

        Ok(LoginIdentity {
            id: id.to_owned(),
            nickname: row.get("nickname"),
        })
    }
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password);
    format!("{:x}", hasher.finalize())
}

fn unavailable(err: sqlx::Error) -> AccountError {
    AccountError::Unavailable(err.to_string())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_store_accepts_everything() {
        let store = LocalAccountStore;
        store.create_account("haye", "Haye", "pw").await.unwrap();
        let identity = store.login("haye", "whatever").await.unwrap();
        assert_eq!(identity.id, "haye");
        assert_eq!(identity.nickname, "haye");
    }

    #[tokio::test]
    async fn test_sql_store_round_trip() {
        let store = SqlAccountStore::connect("sqlite::memory:").await.unwrap();

        store.create_account("haye", "Haye", "secret").await.unwrap();
        let identity = store.login("haye", "secret").await.unwrap();
        assert_eq!(
            identity,
            LoginIdentity {
                id: "haye".into(),
                nickname: "Haye".into()
            }
        );
    }

    #[tokio::test]
    async fn test_sql_store_rejects_duplicate_id() {
        let store = SqlAccountStore::connect("sqlite::memory:").await.unwrap();
        store.create_account("haye", "Haye", "pw").await.unwrap();
        let err = store
            .create_account("haye", "Other", "pw2")
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::AlreadyExists));
    }

    #[tokio::test]
    async fn test_sql_store_rejects_bad_credentials() {
        let store = SqlAccountStore::connect("sqlite::memory:").await.unwrap();
        store.create_account("haye", "Haye", "right").await.unwrap();

        let err = store.login("haye", "wrong").await.unwrap_err();
        assert!(matches!(err, AccountError::BadCredentials));

        let err = store.login("nobody", "right").await.unwrap_err();
        assert!(matches!(err, AccountError::NotFound));
    }

    #[test]
    fn test_password_digest_is_stable_hex() {
        let a = hash_password("secret");
        let b = hash_password("secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_password("Secret"));
    }
}
