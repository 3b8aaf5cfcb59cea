pub mod atr;

pub use atr::{true_range, AtrIndicator};
