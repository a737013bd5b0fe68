use super::set::{ResponseKind, ResultSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResultError {
    #[error("Result artifact '{path}' does not exist")]
    Missing { path: String },
    #[error("CSV error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Result artifact '{path}' contains no results")]
    Empty { path: String },
}

/// Locates and parses the result artifact the solver produced for a model file.
pub trait ResultReader: Send + Sync {
    /// Path of the result artifact sharing the model file's basename.
    fn result_path(&self, model_path: &Path) -> PathBuf;

    /// Parses a result artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ResultError`] if the artifact is missing, malformed, or empty.
    fn read(&self, path: &Path) -> Result<ResultSet, ResultError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TableName {
    Displacement,
    CbushForce,
}

impl From<TableName> for ResponseKind {
    fn from(name: TableName) -> Self {
        match name {
            TableName::Displacement => ResponseKind::Displacement,
            TableName::CbushForce => ResponseKind::CBushForce,
        }
    }
}

impl From<ResponseKind> for TableName {
    fn from(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::Displacement => TableName::Displacement,
            ResponseKind::CBushForce => TableName::CbushForce,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ResultRow {
    load_case: u32,
    table: TableName,
    id: u32,
    c1: f64,
    c2: f64,
    c3: f64,
}

/// Reads results from `<basename>.csv` with the columns
/// `load_case,table,id,c1,c2,c3`, where `table` is `displacement` or `cbush_force`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvResultReader;

impl CsvResultReader {
    pub const EXTENSION: &'static str = "csv";

    /// Writes a result set in the layout [`CsvResultReader::read`] expects.
    pub fn write(set: &ResultSet, path: &Path) -> Result<(), ResultError> {
        let csv_err = |source| ResultError::Csv {
            path: path.to_string_lossy().to_string(),
            source,
        };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        for load_case in set.load_case_ids() {
            let Some(tables) = set.load_case(load_case) else {
                continue;
            };
            for kind in [ResponseKind::Displacement, ResponseKind::CBushForce] {
                for (&id, &[c1, c2, c3]) in tables.table(kind) {
                    writer
                        .serialize(ResultRow {
                            load_case,
                            table: kind.into(),
                            id,
                            c1,
                            c2,
                            c3,
                        })
                        .map_err(csv_err)?;
                }
            }
        }
        writer.flush().map_err(|e| csv_err(e.into()))?;
        Ok(())
    }
}

impl ResultReader for CsvResultReader {
    fn result_path(&self, model_path: &Path) -> PathBuf {
        model_path.with_extension(Self::EXTENSION)
    }

    fn read(&self, path: &Path) -> Result<ResultSet, ResultError> {
        let path_str = path.to_string_lossy().to_string();
        if !path.exists() {
            return Err(ResultError::Missing { path: path_str });
        }

        let mut reader = csv::Reader::from_path(path).map_err(|e| ResultError::Csv {
            path: path_str.clone(),
            source: e,
        })?;

        let mut set = ResultSet::new();
        for result in reader.deserialize::<ResultRow>() {
            let row = result.map_err(|e| ResultError::Csv {
                path: path_str.clone(),
                source: e,
            })?;
            set.insert(row.load_case, row.table.into(), row.id, [row.c1, row.c2, row.c3]);
        }

        if set.is_empty() {
            return Err(ResultError::Empty { path: path_str });
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn result_path_shares_the_model_basename() {
        let path = CsvResultReader.result_path(Path::new("/tmp/run/opt_3.bdf"));
        assert_eq!(path, PathBuf::from("/tmp/run/opt_3.csv"));
    }

    #[test]
    fn reads_both_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opt_1.csv");
        fs::write(
            &path,
            "load_case,table,id,c1,c2,c3\n\
             1,displacement,101,0.1,0.2,0.3\n\
             1,cbush_force,7,10.0,-20.0,5.0\n",
        )
        .unwrap();

        let set = CsvResultReader.read(&path).unwrap();
        let tables = set.load_case(1).unwrap();
        assert_eq!(tables.displacements[&101], [0.1, 0.2, 0.3]);
        assert_eq!(tables.cbush_forces[&7], [10.0, -20.0, 5.0]);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = CsvResultReader.read(&dir.path().join("absent.csv"));
        assert!(matches!(result, Err(ResultError::Missing { .. })));
    }

    #[test]
    fn header_only_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "load_case,table,id,c1,c2,c3\n").unwrap();
        assert!(matches!(
            CsvResultReader.read(&path),
            Err(ResultError::Empty { .. })
        ));
    }

    #[test]
    fn unknown_table_is_a_csv_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "load_case,table,id,c1,c2,c3\n1,stress,1,0,0,0\n").unwrap();
        assert!(matches!(
            CsvResultReader.read(&path),
            Err(ResultError::Csv { .. })
        ));
    }

    #[test]
    fn written_sets_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut set = ResultSet::new();
        set.insert(2, ResponseKind::Displacement, 1, [1.0, 2.0, 3.0]);
        set.insert(2, ResponseKind::CBushForce, 9, [4.0, 5.0, 6.0]);
        CsvResultReader::write(&set, &path).unwrap();
        assert_eq!(CsvResultReader.read(&path).unwrap(), set);
    }
}
