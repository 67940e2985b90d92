use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode, TransactionBehavior, params};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Resource locked")]
    Locked,

    #[error("lock backend: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Proof of holding `key`. Only the holder's token can release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockLease {
    pub key: String,
    pub token: String,
}

/// Cross-process mutual exclusion with bounded validity.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Fails with [`LockError::Locked`] when another holder's lease is still valid.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockLease, LockError>;

    async fn release(&self, lease: &LockLease) -> Result<(), LockError>;
}

/// Lock table in a SQLite file shared by every instance on the host.
#[derive(Debug, Clone)]
pub struct SqliteLock {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLock {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create lock dir {}", dir.display()))?;
        }

        let conn =
            Connection::open(&path).with_context(|| format!("open sqlite {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("set sqlite busy_timeout")?;
        conn.execute_batch(
            r#"
PRAGMA journal_mode = WAL;
CREATE TABLE IF NOT EXISTS locks (
  lock_key TEXT PRIMARY KEY,
  token TEXT NOT NULL,
  expires_at_ms INTEGER NOT NULL
);
"#,
        )
        .context("create lock table")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, LockError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, LockError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("lock connection mutex poisoned"))?;
            f(&mut conn)
        })
        .await
        .context("join lock task")?
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[async_trait]
impl DistributedLock for SqliteLock {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<LockLease, LockError> {
        let lease = LockLease {
            key: key.to_string(),
            token: Uuid::new_v4().to_string(),
        };
        let row = lease.clone();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .context("begin lock transaction")?;
            let now = now_ms();
            tx.execute(
                "DELETE FROM locks WHERE lock_key = ?1 AND expires_at_ms <= ?2",
                params![&row.key, now],
            )
            .context("purge expired lock")?;

            let inserted = tx.execute(
                "INSERT INTO locks (lock_key, token, expires_at_ms) VALUES (?1, ?2, ?3)",
                params![&row.key, &row.token, now.saturating_add(ttl_ms)],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(LockError::Locked);
                }
                Err(e) => return Err(anyhow::Error::new(e).context("insert lock").into()),
            }

            tx.commit().context("commit lock transaction")?;
            Ok(())
        })
        .await?;

        tracing::debug!(key, "acquired lock");
        Ok(lease)
    }

    async fn release(&self, lease: &LockLease) -> Result<(), LockError> {
        let lease = lease.clone();
        self.with_conn(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM locks WHERE lock_key = ?1 AND token = ?2",
                    params![&lease.key, &lease.token],
                )
                .context("delete lock")?;
            if removed == 0 {
                tracing::warn!(key = %lease.key, "lock expired before release");
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_is_locked_until_release() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let lock = SqliteLock::open(dir.path().join("locks.sqlite3"))?;

        let lease = lock.acquire("walletScan-w1", Duration::from_secs(60)).await?;
        assert!(matches!(
            lock.acquire("walletScan-w1", Duration::from_secs(60)).await,
            Err(LockError::Locked)
        ));
        let other = lock.acquire("walletScan-w2", Duration::from_secs(60)).await?;

        lock.release(&lease).await?;
        let again = lock.acquire("walletScan-w1", Duration::from_secs(60)).await?;
        assert_ne!(again.token, lease.token);

        lock.release(&again).await?;
        lock.release(&other).await?;
        Ok(())
    }

    #[tokio::test]
    async fn expired_lease_can_be_taken_over() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let lock = SqliteLock::open(dir.path().join("locks.sqlite3"))?;

        let stale = lock.acquire("k", Duration::ZERO).await?;
        let fresh = lock.acquire("k", Duration::from_secs(60)).await?;

        // The stale holder must not drop the new lease.
        lock.release(&stale).await?;
        assert!(matches!(
            lock.acquire("k", Duration::from_secs(60)).await,
            Err(LockError::Locked)
        ));
        lock.release(&fresh).await?;
        Ok(())
    }
}
