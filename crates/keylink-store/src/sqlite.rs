//! SQLite implementation of the LinkStore trait.
//!
//! This is the persistent storage backend for the link registry. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.
//! Every mutation runs inside one IMMEDIATE transaction while holding the
//! connection mutex, which serializes writers both in-process and across
//! processes sharing the database file.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use keylink_core::{AccountId, SchnorrPubkey};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CommitResult, ConflictPolicy, LinkStore, RemoveResult};

/// How long a writer waits on a database locked by another process.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file (and missing parent directories) and runs
    /// migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn decode_account(bytes: Vec<u8>) -> Result<AccountId> {
    AccountId::try_from(bytes.as_slice())
        .map_err(|_| StoreError::InvalidData(format!("account blob of {} bytes", bytes.len())))
}

fn decode_key(bytes: Vec<u8>) -> Result<SchnorrPubkey> {
    SchnorrPubkey::try_from(bytes.as_slice())
        .map_err(|_| StoreError::InvalidData(format!("schnorr key blob of {} bytes", bytes.len())))
}

fn select_key(conn: &Connection, account: &AccountId) -> Result<Option<SchnorrPubkey>> {
    conn.query_row(
        "SELECT schnorr_key FROM forward_links WHERE account = ?1",
        params![account.as_bytes().as_slice()],
        |row| row.get::<_, Vec<u8>>(0),
    )
    .optional()?
    .map(decode_key)
    .transpose()
}

fn select_account(conn: &Connection, key: &SchnorrPubkey) -> Result<Option<AccountId>> {
    conn.query_row(
        "SELECT account FROM reverse_links WHERE schnorr_key = ?1",
        params![key.as_bytes().as_slice()],
        |row| row.get::<_, Vec<u8>>(0),
    )
    .optional()?
    .map(decode_account)
    .transpose()
}

#[async_trait]
impl LinkStore for SqliteStore {
    async fn commit_link(
        &self,
        account: &AccountId,
        key: &SchnorrPubkey,
        policy: ConflictPolicy,
    ) -> Result<CommitResult> {
        let account = *account;
        let key = *key;

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let displaced_key = select_key(&tx, &account)?;
            if displaced_key == Some(key) {
                return Ok(CommitResult::Unchanged);
            }

            let displaced_account = select_account(&tx, &key)?;
            if let (Some(holder), ConflictPolicy::Reject) = (displaced_account, policy) {
                return Ok(CommitResult::Conflict { holder });
            }

            if let Some(old_key) = displaced_key {
                tx.execute(
                    "DELETE FROM reverse_links WHERE schnorr_key = ?1",
                    params![old_key.as_bytes().as_slice()],
                )?;
                tx.execute(
                    "DELETE FROM forward_links WHERE account = ?1",
                    params![account.as_bytes().as_slice()],
                )?;
            }

            if let Some(old_account) = displaced_account {
                tx.execute(
                    "DELETE FROM forward_links WHERE account = ?1",
                    params![old_account.as_bytes().as_slice()],
                )?;
                tx.execute(
                    "DELETE FROM reverse_links WHERE schnorr_key = ?1",
                    params![key.as_bytes().as_slice()],
                )?;
            }

            tx.execute(
                "INSERT INTO forward_links (account, schnorr_key) VALUES (?1, ?2)",
                params![account.as_bytes().as_slice(), key.as_bytes().as_slice()],
            )?;
            tx.execute(
                "INSERT INTO reverse_links (schnorr_key, account) VALUES (?1, ?2)",
                params![key.as_bytes().as_slice(), account.as_bytes().as_slice()],
            )?;

            tx.commit()?;

            debug!(
                account = %account,
                key = %key,
                ?displaced_key,
                ?displaced_account,
                "committed link"
            );

            Ok(CommitResult::Linked {
                displaced_key,
                displaced_account,
            })
        })
        .await
    }

    async fn remove_link(
        &self,
        account: &AccountId,
        expected: Option<&SchnorrPubkey>,
    ) -> Result<RemoveResult> {
        let account = *account;
        let expected = expected.copied();

        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current = match select_key(&tx, &account)? {
                Some(key) => key,
                None => return Ok(RemoveResult::NotLinked),
            };

            if let Some(expected) = expected {
                if expected != current {
                    return Ok(RemoveResult::KeyMismatch { current });
                }
            }

            tx.execute(
                "DELETE FROM forward_links WHERE account = ?1",
                params![account.as_bytes().as_slice()],
            )?;
            tx.execute(
                "DELETE FROM reverse_links WHERE schnorr_key = ?1",
                params![current.as_bytes().as_slice()],
            )?;

            tx.commit()?;

            debug!(account = %account, key = %current, "removed link");
            Ok(RemoveResult::Removed { key: current })
        })
        .await
    }

    async fn key_for_account(&self, account: &AccountId) -> Result<Option<SchnorrPubkey>> {
        let account = *account;
        self.run(move |conn| select_key(conn, &account)).await
    }

    async fn account_for_key(&self, key: &SchnorrPubkey) -> Result<Option<AccountId>> {
        let key = *key;
        self.run(move |conn| select_account(conn, &key)).await
    }

    async fn forward_entries(&self) -> Result<Vec<(AccountId, SchnorrPubkey)>> {
        self.run(|conn| {
            let mut stmt =
                conn.prepare("SELECT account, schnorr_key FROM forward_links ORDER BY account")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(a, k)| Ok((decode_account(a)?, decode_key(k)?)))
                .collect()
        })
        .await
    }

    async fn reverse_entries(&self) -> Result<Vec<(SchnorrPubkey, AccountId)>> {
        self.run(|conn| {
            let mut stmt =
                conn.prepare("SELECT schnorr_key, account FROM reverse_links ORDER BY schnorr_key")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(k, a)| Ok((decode_key(k)?, decode_account(a)?)))
                .collect()
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.run(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM forward_links", [], |row| row.get(0))?;
            Ok(n as usize)
        })
        .await
    }
}
