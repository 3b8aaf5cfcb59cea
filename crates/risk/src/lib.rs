pub mod sizer;

pub use sizer::{RiskConfig, RiskSizer, MIN_POSITION_SIZE};
