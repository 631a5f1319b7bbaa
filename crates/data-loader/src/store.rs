//! JSON-lines storage for acquired samples and audit records.
//!
//! One JSON document per line keeps the files appendable and greppable, and
//! lets a partially written file still be read up to the last complete line.

use crate::corpus::{LabeledSample, TrainingCorpus};
use crate::error::{DataLoadError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Write every item as one JSON line, replacing the file
pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a JSON-lines file; blank lines are skipped
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).map_err(|_| DataLoadError::FileNotFound {
        path: path.display().to_string(),
    })?;
    let reader = BufReader::new(file);
    let file_name = path.display().to_string();

    let mut items = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|e| DataLoadError::ParseError {
            file: file_name.clone(),
            line: idx + 1,
            reason: e.to_string(),
        })?;
        items.push(item);
    }
    Ok(items)
}

/// Load a training corpus previously written with [`write_jsonl`]
pub fn load_corpus(path: &Path) -> Result<TrainingCorpus> {
    let entries: Vec<LabeledSample> = read_jsonl(path)?;
    if entries.is_empty() {
        return Err(DataLoadError::ValidationError(format!(
            "{} contains no samples",
            path.display()
        )));
    }
    Ok(entries.into_iter().collect())
}
