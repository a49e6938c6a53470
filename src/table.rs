use std::path::Path;

use anyhow::{bail, Context, Result};

/// A CSV sheet held in memory. Missing cells read as empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Input file not found: {}", path.display());
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let headers = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let rows = reader
            .records()
            .map(|r| r.map(|rec| rec.iter().map(str::to_string).collect()))
            .collect::<Result<Vec<Vec<String>>, _>>()
            .with_context(|| format!("Failed to read rows from {}", path.display()))?;
        Ok(Self { headers, rows })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Column index, or an error naming what the sheet does have.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column(name).with_context(|| {
            format!(
                "Column '{}' not found (have: {})",
                name,
                self.headers.join(", ")
            )
        })
    }

    /// Non-blank cell value.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)?
            .get(col)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// Copy of the sheet with extra columns appended (or replaced, if the
    /// name already exists). Short columns are padded with empty cells.
    pub fn with_columns(&self, extra: &[(&str, Vec<Option<String>>)]) -> Table {
        let mut out = self.clone();
        for (name, values) in extra {
            let col = match out.column(name) {
                Some(c) => c,
                None => {
                    out.headers.push(name.to_string());
                    out.headers.len() - 1
                }
            };
            for (i, row) in out.rows.iter_mut().enumerate() {
                if row.len() <= col {
                    row.resize(col + 1, String::new());
                }
                row[col] = values.get(i).cloned().flatten().unwrap_or_default();
            }
        }
        out
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }
}
