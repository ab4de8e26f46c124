//! Extraction and tabulation of free-energy estimates from engine output.
//!
//! The engine reports results as free text. Two markers anchor the
//! extraction: the localized accumulation-count label and the estimator
//! token. The estimate and its standard error sit at a fixed line offset
//! after the estimator marker; the offset is an observed property of the
//! engine's output and carries no version guard, so every deviation fails
//! loudly as [`AnalysisError::UnparsableOutput`] instead of being guessed
//! around.

use serde_json::json;
use std::collections::BTreeMap;
use std::io::{self, Write};
use thiserror::Error;

/// Line marker preceding the accumulation count (the engine speaks French).
pub const ACCUMULATION_MARKER: &str = "Nombre d'accumulations";
/// Line marker identifying the free-energy estimator block.
pub const ESTIMATOR_MARKER: &str = "BAR";
/// Lines between the estimator marker and the estimate/error line.
const ESTIMATE_LINE_OFFSET: usize = 9;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    #[error("Engine output is unparsable: {0}")]
    UnparsableOutput(String),
}

/// One free-energy estimate scraped from an analysis run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisResult {
    /// Number of accumulations the estimate is based on.
    pub accumulations: u64,
    /// Hydration free-energy estimate, in kT.
    pub estimate: f64,
    /// Standard error of the estimate.
    pub std_error: f64,
}

/// Scans engine output for the accumulation count and the estimator value.
///
/// The count is the last whitespace token of the first line containing
/// [`ACCUMULATION_MARKER`]; the estimate and error are whitespace tokens 1
/// and 2 of the line [`ESTIMATE_LINE_OFFSET`] lines after the first line
/// containing [`ESTIMATOR_MARKER`].
pub fn parse_engine_output(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let lines: Vec<&str> = text.lines().collect();

    let accumulation_line = lines
        .iter()
        .find(|line| line.contains(ACCUMULATION_MARKER))
        .ok_or_else(|| {
            AnalysisError::UnparsableOutput(format!("marker '{ACCUMULATION_MARKER}' not found"))
        })?;
    let accumulations = accumulation_line
        .split_whitespace()
        .last()
        .and_then(|token| token.parse::<u64>().ok())
        .ok_or_else(|| {
            AnalysisError::UnparsableOutput(format!(
                "no accumulation count on line '{accumulation_line}'"
            ))
        })?;

    let marker_index = lines
        .iter()
        .position(|line| line.contains(ESTIMATOR_MARKER))
        .ok_or_else(|| {
            AnalysisError::UnparsableOutput(format!("marker '{ESTIMATOR_MARKER}' not found"))
        })?;
    let estimate_line = lines.get(marker_index + ESTIMATE_LINE_OFFSET).ok_or_else(|| {
        AnalysisError::UnparsableOutput(format!(
            "output truncated: no line {ESTIMATE_LINE_OFFSET} after '{ESTIMATOR_MARKER}' marker"
        ))
    })?;

    let tokens: Vec<&str> = estimate_line.split_whitespace().collect();
    let parse = |idx: usize, what: &str| -> Result<f64, AnalysisError> {
        tokens
            .get(idx)
            .and_then(|token| token.parse::<f64>().ok())
            .ok_or_else(|| {
                AnalysisError::UnparsableOutput(format!("no {what} on line '{estimate_line}'"))
            })
    };
    let estimate = parse(1, "estimate")?;
    let std_error = parse(2, "standard error")?;

    Ok(AnalysisResult {
        accumulations,
        estimate,
        std_error,
    })
}

/// One row of the flat result table. A failed parse leaves the result empty;
/// the row is still reported so one bad solute never hides the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub name: String,
    pub result: Option<AnalysisResult>,
}

/// Single-snapshot result table, one row per solute in catalog order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatTable {
    rows: Vec<FlatRow>,
}

impl FlatTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, result: Option<AnalysisResult>) {
        self.rows.push(FlatRow {
            name: name.to_string(),
            result,
        });
    }

    pub fn rows(&self) -> &[FlatRow] {
        &self.rows
    }

    /// The accumulation count shared by the populated rows, if any row
    /// parsed successfully.
    pub fn accumulations(&self) -> Option<u64> {
        self.rows
            .iter()
            .find_map(|row| row.result.map(|r| r.accumulations))
    }

    /// Writes the tab-separated table: `Name\t HFE\t err`.
    pub fn write_tsv(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "Name\t HFE\t err")?;
        for row in &self.rows {
            match &row.result {
                Some(r) => writeln!(writer, "{}\t {}\t {}", row.name, r.estimate, r.std_error)?,
                None => writeln!(writer, "{}\t \t ", row.name)?,
            }
        }
        Ok(())
    }
}

/// Evolution of the estimates over accumulation counts: rows are solutes,
/// one HFE/err column pair per snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvolutionTable {
    solute_order: Vec<String>,
    snapshots: BTreeMap<u64, BTreeMap<String, (f64, f64)>>,
}

impl EvolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, solute: &str, result: AnalysisResult) {
        if !self.solute_order.iter().any(|name| name == solute) {
            self.solute_order.push(solute.to_string());
        }
        self.snapshots
            .entry(result.accumulations)
            .or_default()
            .insert(solute.to_string(), (result.estimate, result.std_error));
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshot_counts(&self) -> impl Iterator<Item = u64> + '_ {
        self.snapshots.keys().copied()
    }

    /// Writes the tab-separated evolution table: a `name` column followed by
    /// `HFE-{n}` / `err-{n}` column pairs in ascending snapshot order.
    pub fn write_tsv(&self, writer: &mut impl Write) -> io::Result<()> {
        write!(writer, "name\t")?;
        for count in self.snapshots.keys() {
            write!(writer, "HFE-{count}\terr-{count}\t")?;
        }
        writeln!(writer)?;

        for name in &self.solute_order {
            write!(writer, "{name}\t")?;
            for snapshot in self.snapshots.values() {
                match snapshot.get(name) {
                    Some((estimate, err)) => write!(writer, "{estimate}\t{err}\t")?,
                    None => write!(writer, "\t\t")?,
                }
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    /// Writes the machine-readable mirror of the same data: a JSON object
    /// with one `HFE-{n}` and one `err-{n}` map per snapshot.
    pub fn write_json(&self, writer: &mut impl Write) -> io::Result<()> {
        let mut root = serde_json::Map::new();
        for (count, snapshot) in &self.snapshots {
            let mut estimates = serde_json::Map::new();
            let mut errors = serde_json::Map::new();
            for (name, (estimate, err)) in snapshot {
                estimates.insert(name.clone(), json!(estimate));
                errors.insert(name.clone(), json!(err));
            }
            root.insert(format!("HFE-{count}"), estimates.into());
            root.insert(format!("err-{count}"), errors.into());
        }
        serde_json::to_writer(&mut *writer, &serde_json::Value::Object(root))?;
        Ok(())
    }
}
