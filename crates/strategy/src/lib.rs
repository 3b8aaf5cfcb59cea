pub mod bias;
pub mod config;
pub mod engine;
pub mod entry;
pub mod gaps;
pub mod indicators;
pub mod report;
pub mod session;

pub use bias::BiasDetector;
pub use config::{SessionConfig, SessionPreset, StrategyFileConfig, StrategyParams};
pub use engine::StrategyEngine;
pub use entry::{EntryDecision, EntryEvaluator};
pub use gaps::{GapDetector, GapMemory, GapScan, RecentBuffer};
pub use report::{consolidate, ReportSummary};
pub use session::SessionFilter;
