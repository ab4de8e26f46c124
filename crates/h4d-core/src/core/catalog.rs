use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// One solute from the campaign database.
///
/// The reference volume (partial molar volume) and reference free energy are
/// present in the energy-workflow catalog and absent in the name-only catalog
/// used by the structure workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoluteRecord {
    pub name: String,
    pub reference_volume: Option<f64>,
    pub reference_free_energy: Option<f64>,
}

/// Ordered collection of solutes, preserving catalog file order.
///
/// Iteration order is the campaign iteration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoluteCatalog {
    records: Vec<SoluteRecord>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Malformed catalog row {row}: expected '{column}' to be numeric, got '{value}'")]
    MalformedRow {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error("Malformed catalog row {row}: expected {expected} tab-separated columns, got {got}")]
    MissingColumns {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("Duplicate solute name in catalog: '{0}'")]
    DuplicateSolute(String),
}

impl SoluteCatalog {
    /// Loads the three-column energy catalog: a header row, then one
    /// `name<TAB>volume<TAB>freeEnergy` row per solute.
    ///
    /// Column position determines meaning; the header is skipped, never
    /// matched by name.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let mut reader = Self::open_reader(path)?;
        let mut records = Vec::new();
        let mut seen = HashSet::new();

        for (row_idx, result) in reader.records().enumerate() {
            // The header occupies row 0 of the file.
            let row = row_idx + 1;
            let record = result.map_err(|e| CatalogError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
            if record.len() < 3 {
                return Err(CatalogError::MissingColumns {
                    row,
                    expected: 3,
                    got: record.len(),
                });
            }

            let name = record[0].trim().to_string();
            let volume = parse_field(&record[1], row, "referenceVolume")?;
            let free_energy = parse_field(&record[2], row, "referenceFreeEnergy")?;

            if !seen.insert(name.clone()) {
                return Err(CatalogError::DuplicateSolute(name));
            }
            records.push(SoluteRecord {
                name,
                reference_volume: Some(volume),
                reference_free_energy: Some(free_energy),
            });
        }

        Ok(Self { records })
    }

    /// Loads the name-only catalog variant used by the structure workflow.
    ///
    /// Only the first column of each row is read; volume and free energy are
    /// left unset.
    pub fn load_names(path: &Path) -> Result<Self, CatalogError> {
        let mut reader = Self::open_reader(path)?;
        let mut records = Vec::new();
        let mut seen = HashSet::new();

        for result in reader.records() {
            let record = result.map_err(|e| CatalogError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })?;
            let Some(name) = record.get(0).map(|n| n.trim().to_string()) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            if !seen.insert(name.clone()) {
                return Err(CatalogError::DuplicateSolute(name));
            }
            records.push(SoluteRecord {
                name,
                reference_volume: None,
                reference_free_energy: None,
            });
        }

        Ok(Self { records })
    }

    fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, CatalogError> {
        csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| CatalogError::Csv {
                path: path.to_string_lossy().to_string(),
                source: e,
            })
    }

    pub fn records(&self) -> &[SoluteRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SoluteRecord> {
        self.records.iter()
    }
}

fn parse_field(raw: &str, row: usize, column: &'static str) -> Result<f64, CatalogError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| CatalogError::MalformedRow {
            row,
            column,
            value: raw.trim().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_catalog(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("solutes.csv");
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        (dir, path)
    }

    #[test]
    fn load_parses_three_column_catalog_in_order() {
        let (_dir, path) =
            write_catalog("Name\tV0\tmu0\nmethane\t0.0617\t2.0\nwater\t0.0\t-6.3\n");

        let catalog = SoluteCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.records()[0].name, "methane");
        assert_eq!(catalog.records()[1].name, "water");
        assert_eq!(catalog.records()[1].reference_volume, Some(0.0));
        assert_eq!(catalog.records()[1].reference_free_energy, Some(-6.3));
    }

    #[test]
    fn load_fails_on_non_numeric_volume() {
        let (_dir, path) = write_catalog("Name\tV0\tmu0\nmethane\tbroken\t2.0\n");

        let err = SoluteCatalog::load(&path).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::MalformedRow {
                row: 1,
                column: "referenceVolume",
                ..
            }
        ));
    }

    #[test]
    fn load_fails_on_missing_columns() {
        let (_dir, path) = write_catalog("Name\tV0\tmu0\nmethane\t0.0617\n");

        let err = SoluteCatalog::load(&path).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::MissingColumns {
                row: 1,
                expected: 3,
                got: 2
            }
        ));
    }

    #[test]
    fn load_fails_on_duplicate_solute() {
        let (_dir, path) =
            write_catalog("Name\tV0\tmu0\nwater\t0.0\t-6.3\nwater\t0.0\t-6.3\n");

        let err = SoluteCatalog::load(&path).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateSolute(name) if name == "water"));
    }

    #[test]
    fn load_names_accepts_single_column_catalog() {
        let (_dir, path) = write_catalog("Name\nmethane\nethanol\n");

        let catalog = SoluteCatalog::load_names(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.records()[0].name, "methane");
        assert_eq!(catalog.records()[0].reference_volume, None);
        assert_eq!(catalog.records()[0].reference_free_energy, None);
    }

    #[test]
    fn load_names_detects_duplicates() {
        let (_dir, path) = write_catalog("Name\nmethane\nmethane\n");

        let err = SoluteCatalog::load_names(&path).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateSolute(_)));
    }
}
