//! Parser for the historical opening-weekend table.
//!
//! The table is a CSV export with a header row containing at least:
//! `Title, Studio, Opening, Theaters, Date`
//!
//! - Opening and Theaters may carry `$` and thousands separators
//! - Date is either `YYYY-MM-DD` or `M/D/YYYY`
//! - Column order does not matter, extra columns are ignored

use crate::error::{DataLoadError, Result};
use crate::types::HistoricalRecord;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const COLUMNS: [&str; 5] = ["Title", "Studio", "Opening", "Theaters", "Date"];

/// Positions of the columns we need, resolved from the header row
struct ColumnIndex {
    title: usize,
    studio: usize,
    opening: usize,
    theaters: usize,
    date: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord, file: &str) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| DataLoadError::MissingColumn {
                    file: file.to_string(),
                    column: name.to_string(),
                })
        };
        Ok(Self {
            title: find(COLUMNS[0])?,
            studio: find(COLUMNS[1])?,
            opening: find(COLUMNS[2])?,
            theaters: find(COLUMNS[3])?,
            date: find(COLUMNS[4])?,
        })
    }
}

/// Parse the historical table from a file
pub fn parse_historical(path: &Path) -> Result<Vec<HistoricalRecord>> {
    let file = File::open(path).map_err(|_| DataLoadError::FileNotFound {
        path: path.display().to_string(),
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    parse_historical_reader(file, &name)
}

/// Parse the historical table from any reader
///
/// `file` is only used for error messages.
pub fn parse_historical_reader<R: Read>(reader: R, file: &str) -> Result<Vec<HistoricalRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let columns = ColumnIndex::from_headers(rdr.headers()?, file)?;
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (idx, row) in rdr.records().enumerate() {
        // Header is line 1
        let line_no = idx + 2;
        let row = row?;
        if row.iter().all(|field| field.trim().is_empty()) {
            continue; // Skip empty lines
        }

        // Short rows read as blank cells
        let field = |pos: usize| row.get(pos).map(str::trim).unwrap_or("");

        let title = field(columns.title);
        if title.is_empty() {
            warn!("{}:{}: empty title, skipping row", file, line_no);
            continue;
        }
        let studio = field(columns.studio);

        // A missing target keeps the row; it is dropped before fitting
        let opening_str = field(columns.opening);
        let opening = parse_money(opening_str);
        if opening.is_none() {
            warn!("{}:{}: invalid opening {:?} for {}", file, line_no, opening_str, title);
        }

        let theaters_str = field(columns.theaters);
        let theaters = if theaters_str.is_empty() || theaters_str == "-" {
            None
        } else {
            let value = parse_money(theaters_str);
            if value.is_none() {
                warn!("{}:{}: invalid theaters {:?}", file, line_no, theaters_str);
            }
            value.map(|v| v as u32)
        };

        // The date drives the title search, so a row without one cannot be resolved
        let date_str = field(columns.date);
        let Some(date) = parse_date(date_str) else {
            warn!("{}:{}: invalid date {:?} for {}, skipping row", file, line_no, date_str, title);
            skipped += 1;
            continue;
        };

        records.push(HistoricalRecord {
            title: title.to_string(),
            studio: studio.to_string(),
            opening,
            theaters,
            date,
        });
    }

    if skipped > 0 {
        warn!("{}: skipped {} rows without a usable date", file, skipped);
    }
    debug!("{}: parsed {} rows", file, records.len());
    Ok(records)
}

/// Parse a dollar amount or count such as `$1,234,567` or `3,510`
fn parse_money(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
    let value: f64 = cleaned.trim().parse().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// Parse `YYYY-MM-DD` or `M/D/YYYY`
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
}

/// Split a trailing release year off a title
///
/// Example: "Aliens (1986)" -> ("Aliens", Some(1986))
///          "Movie Title" -> ("Movie Title", None)
pub fn split_title_year(title: &str) -> (&str, Option<i32>) {
    let trimmed = title.trim_end();
    if let Some(stripped) = trimmed.strip_suffix(')') {
        if let Some(start) = stripped.rfind(" (") {
            let year_str = &stripped[start + 2..];
            if year_str.len() == 4 && year_str.chars().all(|c| c.is_ascii_digit()) {
                if let Ok(year) = year_str.parse::<i32>() {
                    return (&trimmed[..start], Some(year));
                }
            }
        }
    }
    (title, None)
}
