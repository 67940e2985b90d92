use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a chain swap's claim-fee estimate is kept around.
pub const CLAIM_FEE_TTL: Duration = Duration::from_secs(60 * 60 * 12);

pub fn claim_fee_key(swap_id: &str) -> String {
    format!("swap-claim-fee-{swap_id}")
}

pub trait ClaimFeeCache: Send + Sync {
    fn set(&self, key: &str, value: i64, ttl: Duration);

    fn get(&self, key: &str) -> Option<i64>;
}

#[derive(Debug, Default)]
pub struct MemoryClaimFeeCache {
    entries: Mutex<HashMap<String, (i64, Instant)>>,
}

impl MemoryClaimFeeCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClaimFeeCache for MemoryClaimFeeCache {
    fn set(&self, key: &str, value: i64, ttl: Duration) {
        let now = Instant::now();
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!(key, "claim fee cache mutex poisoned");
            return;
        };
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value, now + ttl));
    }

    fn get(&self, key: &str) -> Option<i64> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Some(*value),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}
