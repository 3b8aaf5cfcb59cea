pub mod csv_feed;
pub mod lifecycle;
pub mod records;

pub use csv_feed::CsvCandleProvider;
pub use lifecycle::{Runner, RunnerHandle};
pub use records::{load_records, JsonFileSink};
