pub mod audit;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod types;

pub use audit::*;
pub use collaborators::{CandleProvider, RecordSink};
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
