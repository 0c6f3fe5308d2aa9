//! Common test utilities and fixtures

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tabrecon_core::{Dataset, Record};
use tempfile::TempDir;

/// Test fixture paths and utilities
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
    pub data_dir: PathBuf,
    pub configs_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");

        Self {
            data_dir: fixtures_dir.join("data"),
            configs_dir: fixtures_dir.join("configs"),
            fixtures_dir,
        }
    }

    /// Directory holding the old version of the fixture tables
    pub fn old_dir(&self) -> PathBuf {
        self.data_dir.join("old")
    }

    /// Directory holding the new version of the fixture tables
    pub fn new_dir(&self) -> PathBuf {
        self.data_dir.join("new")
    }

    pub fn config_file(&self, name: &str) -> PathBuf {
        self.configs_dir.join(name)
    }
}

/// Scratch directory with an `old/` and a `new/` side
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().to_path_buf();
        fs::create_dir_all(path.join("old")).expect("Failed to create old dir");
        fs::create_dir_all(path.join("new")).expect("Failed to create new dir");
        Self { temp_dir, path }
    }

    pub fn old_dir(&self) -> PathBuf {
        self.path.join("old")
    }

    pub fn new_dir(&self) -> PathBuf {
        self.path.join("new")
    }

    /// Write `content` to `relative` inside the workspace
    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let target = self.path.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        fs::write(&target, content).expect("Failed to write file");
        target
    }

    /// Write an Excel workbook with one sheet per `(name, rows)` pair; the
    /// first row of each sheet is its header
    pub fn write_workbook(&self, relative: &str, sheets: &[(&str, &[&[&str]])]) -> PathBuf {
        let target = self.path.join(relative);
        let mut workbook = rust_xlsxwriter::Workbook::new();
        for (name, rows) in sheets {
            let sheet = workbook.add_worksheet();
            sheet.set_name(*name).expect("Invalid sheet name");
            for (row, cells) in rows.iter().enumerate() {
                for (col, cell) in cells.iter().enumerate() {
                    sheet
                        .write_string(row as u32, col as u16, *cell)
                        .expect("Failed to write cell");
                }
            }
        }
        workbook.save(&target).expect("Failed to save workbook");
        target
    }

    /// Copy a fixture data file into the workspace
    pub fn copy_fixture(&self, fixture: &str, relative: &str) -> PathBuf {
        let source = TestFixtures::new().data_dir.join(fixture);
        let target = self.path.join(relative);
        fs::copy(&source, &target).expect("Failed to copy fixture");
        target
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Change to the workspace directory (for tests that need current dir)
    pub fn change_to_workspace(&self) -> WorkspaceGuard {
        let original_dir = std::env::current_dir().expect("Failed to get current directory");
        std::env::set_current_dir(&self.path).expect("Failed to change to workspace directory");
        WorkspaceGuard { original_dir }
    }
}

/// RAII guard to restore original directory
pub struct WorkspaceGuard {
    original_dir: PathBuf,
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if self.original_dir.exists() {
            let _ = std::env::set_current_dir(&self.original_dir);
        }
    }
}

/// Build a dataset from literal rows
pub fn dataset(rows: &[&[(&str, &str)]]) -> Dataset {
    rows.iter()
        .map(|pairs| Record::from_cells(pairs.iter().copied()))
        .collect()
}
