use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use common::{AnalysisRecord, RecordSink, Result};

/// Writes each analysis record as a pretty-printed JSON file named
/// `analysis_<sequence>_<timestamp>.json`.
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    /// Creates `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn file_name(record: &AnalysisRecord) -> String {
        format!(
            "analysis_{:06}_{}.json",
            record.sequence,
            record.analyzed_at.format("%Y%m%d_%H%M%S%3f")
        )
    }
}

impl RecordSink for JsonFileSink {
    fn write_record(&self, record: &AnalysisRecord) -> Result<()> {
        let path = self.dir.join(Self::file_name(record));
        let mut out = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut out, record)?;
        out.flush()?;
        debug!(path = %path.display(), decision = record.decision.label(), "Analysis record written");
        Ok(())
    }
}

/// Read every analysis record in `dir`, oldest first.
///
/// Files that are not analysis records, or fail to parse, are skipped with
/// a warning.
pub fn load_records(dir: impl AsRef<Path>) -> Result<Vec<AnalysisRecord>> {
    let mut records = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        let is_record = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("analysis_") && n.ends_with(".json"));
        if !is_record {
            continue;
        }
        let parsed = File::open(&path)
            .map_err(common::Error::from)
            .and_then(|f| serde_json::from_reader::<_, AnalysisRecord>(BufReader::new(f)).map_err(Into::into));
        match parsed {
            Ok(record) => records.push(record),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
        }
    }
    records.sort_by_key(|r| (r.analyzed_at, r.sequence));
    Ok(records)
}
