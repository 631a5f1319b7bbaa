//! Acquisition output files.
//!
//! Stage 1 (id resolution) writes `accepted_ids.csv` and `rejected_ids.csv`.
//! Stage 2 (metadata fetch) writes `samples.jsonl`, the labeled training
//! examples, and `rejected_samples.jsonl`, the full audit rows for everything
//! dropped. Every row carries its drop reason, if any.

use crate::ingest::{FetchedRecord, Partitioned, ResolvedRecord};
use crate::resolver::MatchKind;
use anyhow::{Context, Result};
use data_loader::{LabeledSample, TmdbId, store};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ACCEPTED_IDS_FILE: &str = "accepted_ids.csv";
pub const REJECTED_IDS_FILE: &str = "rejected_ids.csv";
pub const SAMPLES_FILE: &str = "samples.jsonl";
pub const REJECTED_SAMPLES_FILE: &str = "rejected_samples.jsonl";

/// CSV row: the historical columns plus the resolution outcome
#[derive(Debug, Serialize)]
struct IdRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Studio")]
    studio: &'a str,
    #[serde(rename = "Opening")]
    opening: Option<f64>,
    #[serde(rename = "Theaters")]
    theaters: Option<u32>,
    #[serde(rename = "Date")]
    date: String,
    resolved_id: Option<TmdbId>,
    match_kind: Option<MatchKind>,
    drop_reason: Option<String>,
}

impl<'a> From<&'a ResolvedRecord> for IdRow<'a> {
    fn from(r: &'a ResolvedRecord) -> Self {
        Self {
            title: &r.record.title,
            studio: &r.record.studio,
            opening: r.record.opening,
            theaters: r.record.theaters,
            date: r.record.date.format("%Y-%m-%d").to_string(),
            resolved_id: r.resolved_id,
            match_kind: r.match_kind,
            drop_reason: r.drop_reason.as_ref().map(ToString::to_string),
        }
    }
}

fn write_id_csv(path: &Path, rows: &[ResolvedRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Creating {}", path.display()))?;
    for row in rows {
        writer
            .serialize(IdRow::from(row))
            .with_context(|| format!("Writing {}", path.display()))?;
    }
    writer.flush()?;
    Ok(())
}

/// The two columns of an id file needed to look up known openings
#[derive(Debug, Deserialize)]
struct KnownOpeningRow {
    #[serde(rename = "Opening")]
    opening: Option<f64>,
    resolved_id: Option<TmdbId>,
}

/// Map resolved id to actual opening from an `accepted_ids.csv`
pub fn read_known_openings(path: &Path) -> Result<HashMap<TmdbId, f64>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("Opening {}", path.display()))?;
    let mut openings = HashMap::new();
    for row in reader.deserialize() {
        let row: KnownOpeningRow = row.with_context(|| format!("Reading {}", path.display()))?;
        if let (Some(id), Some(opening)) = (row.resolved_id, row.opening) {
            openings.insert(id, opening);
        }
    }
    info!("Loaded {} known openings", openings.len());
    Ok(openings)
}

/// Write both stage 1 files into `dir`, creating it if needed
pub fn write_resolved(dir: &Path, resolved: &Partitioned<ResolvedRecord>) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("Creating {}", dir.display()))?;
    let accepted = dir.join(ACCEPTED_IDS_FILE);
    let rejected = dir.join(REJECTED_IDS_FILE);
    write_id_csv(&accepted, &resolved.accepted)?;
    write_id_csv(&rejected, &resolved.rejected)?;
    info!(
        "Wrote {} accepted / {} rejected ids to {}",
        resolved.accepted.len(),
        resolved.rejected.len(),
        dir.display()
    );
    Ok((accepted, rejected))
}

/// Write both stage 2 files into `dir`. Returns the training-sample path.
pub fn write_fetched(dir: &Path, fetched: &Partitioned<FetchedRecord>) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Creating {}", dir.display()))?;
    let samples_path = dir.join(SAMPLES_FILE);
    let rejected_path = dir.join(REJECTED_SAMPLES_FILE);

    let labeled: Vec<LabeledSample> = fetched
        .accepted
        .iter()
        .filter_map(FetchedRecord::labeled)
        .collect();
    store::write_jsonl(&samples_path, &labeled)
        .with_context(|| format!("Writing {}", samples_path.display()))?;
    store::write_jsonl(&rejected_path, &fetched.rejected)
        .with_context(|| format!("Writing {}", rejected_path.display()))?;

    info!(
        "Wrote {} samples ({} rejected) to {}",
        labeled.len(),
        fetched.rejected.len(),
        dir.display()
    );
    Ok(samples_path)
}
