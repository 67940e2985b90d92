pub mod config;
pub mod error;
pub mod lightning;
pub mod liquid;
pub mod lnurl;
pub mod logging;
pub mod pay;
pub mod receive;
pub mod swap;
pub mod task_graph;
pub mod wallet;

pub use error::{PayError, PayResult};
