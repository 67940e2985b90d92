use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider-advertised bounds, in satoshis, for one ordered pair of chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapLimits {
    pub minimal: u64,
    pub maximal: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    #[error("Amount is too small, minimum is {minimal}")]
    TooSmall { minimal: u64 },

    #[error("Amount is too big, maximum is {maximal}")]
    TooBig { maximal: u64 },
}

impl SwapLimits {
    /// Accepts `amount` when `minimal <= amount <= maximal`.
    pub fn check(&self, amount: u64) -> Result<(), LimitError> {
        if amount < self.minimal {
            return Err(LimitError::TooSmall {
                minimal: self.minimal,
            });
        }
        if amount > self.maximal {
            return Err(LimitError::TooBig {
                maximal: self.maximal,
            });
        }
        Ok(())
    }
}
