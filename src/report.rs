//! The per-attribute statistics rows handed to the report and
//! mapping-skeleton collaborators, and their CSV emission.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{io_utils, profile::Profile};

pub const TOP_VALUE_COUNT: usize = 5;

/// One attribute's statistics line. Percentages are rounded to two
/// decimals; `populated_pct` is relative to the run's total accepted
/// record count, `unique_pct` to the attribute's own populated count.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub order: u64,
    pub attribute: String,
    pub declared_type: String,
    pub populated_count: u64,
    pub populated_pct: f64,
    pub unique_count: u64,
    pub unique_pct: f64,
    pub top_value1: String,
    pub top_value2: String,
    pub top_value3: String,
    pub top_value4: String,
    pub top_value5: String,
}

impl ReportRow {
    pub fn top_values(&self) -> [&str; TOP_VALUE_COUNT] {
        [
            &self.top_value1,
            &self.top_value2,
            &self.top_value3,
            &self.top_value4,
            &self.top_value5,
        ]
    }
}

/// Builds the ordered statistics rows for every discovered attribute.
pub fn build_rows(profile: &Profile) -> Vec<ReportRow> {
    let total = profile.total_records();
    profile
        .tree()
        .ordered_nodes()
        .into_iter()
        .map(|node| {
            let populated = node.populated;
            let unique = node.values.distinct_count() as u64;
            let mut top = node
                .values
                .top(TOP_VALUE_COUNT)
                .into_iter()
                .map(|(value, count)| format!("{value} ({count})"))
                .collect::<Vec<_>>();
            top.resize(TOP_VALUE_COUNT, String::new());
            ReportRow {
                order: node.order,
                attribute: node.path.clone(),
                declared_type: node.declared.to_string(),
                populated_count: populated,
                populated_pct: percent(populated, total),
                unique_count: unique,
                unique_pct: percent(unique, populated),
                top_value1: top[0].clone(),
                top_value2: top[1].clone(),
                top_value3: top[2].clone(),
                top_value4: top[3].clone(),
                top_value5: top[4].clone(),
            }
        })
        .collect()
}

/// First attribute (in display order) whose distinct count equals the
/// total record count: the natural record-id candidate for the mapping
/// skeleton.
pub fn record_id_candidate(rows: &[ReportRow], total_records: u64) -> Option<&str> {
    if total_records == 0 {
        return None;
    }
    rows.iter()
        .find(|row| row.unique_count == total_records)
        .map(|row| row.attribute.as_str())
}

/// Writes the rows as an always-quoted CSV to `path`, or stdout when the
/// path is absent or `-`.
pub fn write_rows(rows: &[ReportRow], path: Option<&Path>) -> Result<()> {
    let mut writer = io_utils::open_report_writer(path)?;
    for row in rows {
        writer.serialize(row).context("Writing report row")?;
    }
    writer.flush().context("Flushing report output")?;
    Ok(())
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let raw = part as f64 / whole as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
