use thiserror::Error;

use crate::swap::limits::LimitError;
use crate::task_graph::GraphError;

#[derive(Error, Debug)]
pub enum PayError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Limit(#[from] LimitError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{context}: {source:#}")]
    Provider {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Wallet scan is already in progress")]
    LockContention,

    #[error("Invalid Lightning Invoice: {0}")]
    InvalidInvoice(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl PayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        PayError::Validation(msg.into())
    }

    pub fn provider(context: &'static str, source: anyhow::Error) -> Self {
        PayError::Provider { context, source }
    }

    /// Text safe to hand back to the caller.
    ///
    /// Provider and internal failures collapse into a generic retry message and missing
    /// resources never name which lookup failed.
    pub fn public_message(&self) -> String {
        match self {
            PayError::Validation(msg) | PayError::Config(msg) => msg.clone(),
            PayError::Limit(e) => e.to_string(),
            PayError::InvalidInvoice(_) => "Invalid Lightning Invoice".to_string(),
            PayError::NotFound(_) => "Not found".to_string(),
            PayError::LockContention => self.to_string(),
            PayError::Provider { .. } | PayError::Graph(_) | PayError::Internal(_) => {
                "An error occurred, please try again".to_string()
            }
        }
    }
}

pub type PayResult<T> = std::result::Result<T, PayError>;
