pub mod config;
pub mod error;
pub mod types;

pub use config::BaateinConfig;
pub use error::{BaateinError, Result, UpstreamError, UpstreamKind};
pub use types::*;
