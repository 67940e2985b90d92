use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension as _, params};

use super::{SwapRecord, SwapRequestRecord, SwapResponseRecord, SwapType};

/// Persistence for swaps created by the engine. Records are insert-only.
#[async_trait]
pub trait SwapRepository: Send + Sync {
    async fn create_swap(
        &self,
        wallet_account_id: &str,
        request: SwapRequestRecord,
        response: SwapResponseRecord,
    ) -> Result<SwapRecord>;

    async fn get_swap(&self, swap_id: &str) -> Result<Option<SwapRecord>>;

    /// Looks a swap up by the Lightning invoice it settles.
    async fn get_reverse_swap_by_invoice(&self, invoice: &str) -> Result<Option<SwapRecord>>;
}

#[derive(Debug)]
pub struct SqliteSwapStore {
    conn: Connection,
    path: PathBuf,
}

impl SqliteSwapStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create swap store dir {}", dir.display()))?;
        }

        let conn =
            Connection::open(&path).with_context(|| format!("open sqlite {}", path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .context("set sqlite busy_timeout")?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .context("configure sqlite pragmas")?;

        migrate(&conn).context("migrate sqlite schema")?;

        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn insert_swap(&mut self, record: &SwapRecord) -> Result<()> {
        let request_json =
            serde_json::to_string(&record.request).context("encode swap request")?;
        let response_json =
            serde_json::to_string(&record.response).context("encode swap response")?;
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();

        self.conn
            .execute(
                r#"
INSERT INTO swaps (
  swap_id,
  provider,
  swap_type,
  wallet_account_id,
  invoice,
  request_json,
  response_json,
  created_at
) VALUES (
  ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
)
"#,
                params![
                    &record.id,
                    record.provider.as_str(),
                    record.swap_type.as_str(),
                    &record.wallet_account_id,
                    record.invoice(),
                    request_json,
                    response_json,
                    created_at,
                ],
            )
            .with_context(|| format!("insert swap {}", record.id))?;
        Ok(())
    }

    pub fn get_swap(&self, swap_id: &str) -> Result<Option<SwapRecord>> {
        self.select_one("swap_id = ?1", swap_id)
            .with_context(|| format!("get swap {swap_id}"))
    }

    pub fn get_swap_by_invoice(&self, invoice: &str) -> Result<Option<SwapRecord>> {
        self.select_one("invoice = ?1", invoice)
            .context("get swap by invoice")
    }

    pub fn list_swaps(&self) -> Result<Vec<SwapRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_SWAP} ORDER BY created_at, swap_id"))
            .context("prepare list swaps")?;

        let rows = stmt.query_map([], read_row).context("query list swaps")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(decode_row(row.context("read swap row")?)?);
        }
        Ok(out)
    }

    fn select_one(&self, filter: &str, value: &str) -> Result<Option<SwapRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_SWAP} WHERE {filter} ORDER BY created_at DESC LIMIT 1"),
                params![value],
                read_row,
            )
            .optional()?;
        row.map(decode_row).transpose()
    }
}

const SELECT_SWAP: &str = r#"
SELECT
  swap_id,
  swap_type,
  wallet_account_id,
  request_json,
  response_json
FROM swaps
"#;

struct RawSwap {
    id: String,
    swap_type: String,
    wallet_account_id: String,
    request_json: String,
    response_json: String,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSwap> {
    Ok(RawSwap {
        id: row.get(0)?,
        swap_type: row.get(1)?,
        wallet_account_id: row.get(2)?,
        request_json: row.get(3)?,
        response_json: row.get(4)?,
    })
}

fn decode_row(raw: RawSwap) -> Result<SwapRecord> {
    let request: SwapRequestRecord = serde_json::from_str(&raw.request_json)
        .with_context(|| format!("decode request of swap {}", raw.id))?;
    let response: SwapResponseRecord = serde_json::from_str(&raw.response_json)
        .with_context(|| format!("decode response of swap {}", raw.id))?;
    let swap_type = swap_type_from_str(&raw.swap_type)?;
    anyhow::ensure!(
        response.swap_type() == swap_type,
        "swap {} is stored as {} but holds a {} response",
        raw.id,
        raw.swap_type,
        response.swap_type().as_str()
    );

    Ok(SwapRecord {
        id: raw.id,
        provider: response.provider,
        swap_type,
        wallet_account_id: raw.wallet_account_id,
        request,
        response,
    })
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS swaps (
  swap_id TEXT PRIMARY KEY,
  provider TEXT NOT NULL,
  swap_type TEXT NOT NULL,
  wallet_account_id TEXT NOT NULL,
  invoice TEXT,
  request_json TEXT NOT NULL,
  response_json TEXT NOT NULL,
  created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS swaps_invoice_idx ON swaps(invoice);
CREATE INDEX IF NOT EXISTS swaps_account_idx ON swaps(wallet_account_id);
"#,
    )
    .context("create tables")?;
    Ok(())
}

fn swap_type_from_str(s: &str) -> Result<SwapType> {
    match s {
        "SUBMARINE" => Ok(SwapType::Submarine),
        "REVERSE" => Ok(SwapType::Reverse),
        "CHAIN" => Ok(SwapType::Chain),
        other => anyhow::bail!("unknown swap type: {other}"),
    }
}

/// Thread-safe handle that runs store calls on the blocking pool.
#[derive(Debug, Clone)]
pub struct SharedSwapStore {
    inner: Arc<Mutex<SqliteSwapStore>>,
}

impl SharedSwapStore {
    pub fn new(store: SqliteSwapStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteSwapStore) -> Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut store = inner
                .lock()
                .map_err(|_| anyhow::anyhow!("swap store mutex poisoned"))?;
            f(&mut store)
        })
        .await
        .context("join swap store task")?
    }
}

#[async_trait]
impl SwapRepository for SharedSwapStore {
    async fn create_swap(
        &self,
        wallet_account_id: &str,
        request: SwapRequestRecord,
        response: SwapResponseRecord,
    ) -> Result<SwapRecord> {
        let record = SwapRecord {
            id: response.swap_id().to_string(),
            provider: response.provider,
            swap_type: response.swap_type(),
            wallet_account_id: wallet_account_id.to_string(),
            request,
            response,
        };
        self.with_store(move |store| {
            store.insert_swap(&record)?;
            Ok(record)
        })
        .await
    }

    async fn get_swap(&self, swap_id: &str) -> Result<Option<SwapRecord>> {
        let swap_id = swap_id.to_string();
        self.with_store(move |store| store.get_swap(&swap_id)).await
    }

    async fn get_reverse_swap_by_invoice(&self, invoice: &str) -> Result<Option<SwapRecord>> {
        let invoice = invoice.to_string();
        self.with_store(move |store| store.get_swap_by_invoice(&invoice))
            .await
    }
}
