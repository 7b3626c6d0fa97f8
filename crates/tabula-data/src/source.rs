//! Tabular sources: documents made of named sheets of text cells.
//!
//! A CSV file is a document with a single sheet named after the file stem. A
//! directory is a workbook whose sheets are the `.csv` files directly inside
//! it, in file-name order. [`MemorySource`] holds sheets in memory and is
//! mostly useful in tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors raised while opening or reading a tabular source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source not found: {path}")]
    NotFound { path: PathBuf },

    #[error("unsupported source format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("sheet '{sheet}' not found in {path}")]
    SheetNotFound { path: PathBuf, sheet: String },

    #[error("CSV error in {path}: {detail}")]
    Csv { path: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Locators and sheets
// ===========================================================================

/// Identifies one sheet of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocator {
    pub path: PathBuf,
    pub sheet: String,
}

impl SourceLocator {
    pub fn new(path: impl Into<PathBuf>, sheet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sheet: sheet.into(),
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.path.display(), self.sheet)
    }
}

/// One named grid of cells. Row 0 is the first row of the sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Build a sheet from string literals.
    pub fn from_rows(name: &str, rows: &[&[&str]]) -> Self {
        Self::new(
            name,
            rows.iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }
}

// ===========================================================================
// Traits
// ===========================================================================

/// A document that exposes one or more sheets.
pub trait TabularSource {
    /// Path of the document, used to build locators.
    fn path(&self) -> &Path;

    /// Read every sheet of the document.
    fn sheets(&self) -> Result<Vec<Sheet>, SourceError>;

    fn locator(&self, sheet: &str) -> SourceLocator {
        SourceLocator::new(self.path(), sheet)
    }
}

/// Reopens a single sheet from a locator recorded earlier.
pub trait SourceResolver {
    fn open_sheet(&self, locator: &SourceLocator) -> Result<Sheet, SourceError>;
}

// ===========================================================================
// CSV
// ===========================================================================

/// A CSV file or a directory of CSV files.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TabularSource for CsvSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn sheets(&self) -> Result<Vec<Sheet>, SourceError> {
        if self.path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(&self.path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_csv(p))
                .collect();
            files.sort();
            files.iter().map(|file| read_csv_sheet(file)).collect()
        } else if self.path.is_file() {
            if !is_csv(&self.path) {
                return Err(SourceError::UnsupportedFormat {
                    path: self.path.clone(),
                });
            }
            Ok(vec![read_csv_sheet(&self.path)?])
        } else {
            Err(SourceError::NotFound {
                path: self.path.clone(),
            })
        }
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn sheet_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read a CSV file into a sheet. Rows may have differing lengths.
pub fn read_csv_sheet(path: &Path) -> Result<Sheet, SourceError> {
    let csv_err = |e: csv::Error| SourceError::Csv {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(Sheet::new(sheet_name(path), rows))
}

/// Resolves locators against the filesystem using [`CsvSource`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FsResolver;

impl SourceResolver for FsResolver {
    fn open_sheet(&self, locator: &SourceLocator) -> Result<Sheet, SourceError> {
        CsvSource::new(&locator.path)
            .sheets()?
            .into_iter()
            .find(|s| s.name == locator.sheet)
            .ok_or_else(|| SourceError::SheetNotFound {
                path: locator.path.clone(),
                sheet: locator.sheet.clone(),
            })
    }
}

// ===========================================================================
// In-memory
// ===========================================================================

/// A document held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    path: PathBuf,
    sheets: Vec<Sheet>,
}

impl MemorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheets: Vec::new(),
        }
    }

    pub fn with_sheet(mut self, sheet: Sheet) -> Self {
        self.sheets.push(sheet);
        self
    }

    pub fn remove_sheet(&mut self, name: &str) {
        self.sheets.retain(|s| s.name != name);
    }
}

impl TabularSource for MemorySource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn sheets(&self) -> Result<Vec<Sheet>, SourceError> {
        Ok(self.sheets.clone())
    }
}

impl SourceResolver for MemorySource {
    fn open_sheet(&self, locator: &SourceLocator) -> Result<Sheet, SourceError> {
        if locator.path != self.path {
            return Err(SourceError::NotFound {
                path: locator.path.clone(),
            });
        }
        self.sheets
            .iter()
            .find(|s| s.name == locator.sheet)
            .cloned()
            .ok_or_else(|| SourceError::SheetNotFound {
                path: locator.path.clone(),
                sheet: locator.sheet.clone(),
            })
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tabula_core::test_utils::{cleanup, make_test_dir};

    #[test]
    fn csv_file_is_one_sheet() {
        let dir = make_test_dir("source_file");
        let path = dir.join("Item.csv");
        fs::write(&path, "id,name\n1,,\n\"a,b\",c\n").unwrap();

        let sheets = CsvSource::new(&path).sheets().unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "Item");
        assert_eq!(sheets[0].rows[0], vec!["id", "name"]);
        assert_eq!(sheets[0].rows[1], vec!["1", "", ""]);
        assert_eq!(sheets[0].rows[2], vec!["a,b", "c"]);

        cleanup(&dir);
    }

    #[test]
    fn directory_is_a_workbook_in_name_order() {
        let dir = make_test_dir("source_dir");
        fs::write(dir.join("b_Monster.csv"), "id\n").unwrap();
        fs::write(dir.join("a_Item.csv"), "id\n").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let names: Vec<String> = CsvSource::new(&dir)
            .sheets()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["a_Item", "b_Monster"]);

        cleanup(&dir);
    }

    #[test]
    fn missing_source_is_not_found() {
        let result = CsvSource::new("/no/such/tables").sheets();
        assert!(matches!(result, Err(SourceError::NotFound { .. })));
    }

    #[test]
    fn non_csv_file_is_unsupported() {
        let dir = make_test_dir("source_unsupported");
        let path = dir.join("Item.xlsx");
        fs::write(&path, "binary").unwrap();

        let result = CsvSource::new(&path).sheets();
        assert!(matches!(result, Err(SourceError::UnsupportedFormat { .. })));

        cleanup(&dir);
    }

    #[test]
    fn fs_resolver_finds_sheet_in_workbook() {
        let dir = make_test_dir("source_resolve");
        fs::write(dir.join("Item.csv"), "id\n").unwrap();

        let sheet = FsResolver
            .open_sheet(&SourceLocator::new(&dir, "Item"))
            .unwrap();
        assert_eq!(sheet.rows, vec![vec!["id".to_string()]]);

        let missing = FsResolver.open_sheet(&SourceLocator::new(&dir, "Monster"));
        assert!(matches!(missing, Err(SourceError::SheetNotFound { .. })));

        cleanup(&dir);
    }

    #[test]
    fn memory_source_resolves_its_own_sheets() {
        let source = MemorySource::new("design.xlsx")
            .with_sheet(Sheet::from_rows("Item", &[&["id"], &["1"], &["int"]]));
        let locator = source.locator("Item");
        assert_eq!(locator.to_string(), "design.xlsx#Item");
        assert_eq!(source.open_sheet(&locator).unwrap().rows.len(), 3);

        let elsewhere = SourceLocator::new("other.xlsx", "Item");
        assert!(matches!(
            source.open_sheet(&elsewhere),
            Err(SourceError::NotFound { .. })
        ));
    }
}
