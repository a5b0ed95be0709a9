#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::Workbook;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.file(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Writes an `.xlsx` workbook. Cells that parse as numbers are stored as numbers,
    /// empty strings are left blank.
    pub fn write_workbook(&self, name: &str, sheets: &[(&str, Vec<Vec<&str>>)]) -> PathBuf {
        let path = self.file(name);
        let mut workbook = Workbook::new();
        for (sheet_name, rows) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(*sheet_name).expect("sheet name");
            for (row_idx, row) in rows.iter().enumerate() {
                for (col_idx, cell) in row.iter().enumerate() {
                    let (row_idx, col_idx) = (row_idx as u32, col_idx as u16);
                    if cell.is_empty() {
                        continue;
                    }
                    match cell.parse::<f64>() {
                        Ok(number) => worksheet
                            .write_number(row_idx, col_idx, number)
                            .expect("write number"),
                        Err(_) => worksheet
                            .write_string(row_idx, col_idx, *cell)
                            .expect("write string"),
                    };
                }
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }
}

/// A small project register: a title block above the header, two data sheets
/// and a sheet without any header row.
pub fn project_register(workspace: &TestWorkspace) -> PathBuf {
    workspace.write_workbook(
        "register.xlsx",
        &[
            (
                "Действующие",
                vec![
                    vec!["Реестр объектов", "", "", "", ""],
                    vec!["", "", "", "", ""],
                    vec!["Застройщик", "Регион", "Стоимость", "Площадь", "Год"],
                    vec!["ТОО Альфа", "Астана", "300", "1.5", "2023"],
                    vec!["ТОО Бета", "Алматы", "500", "2", "2024"],
                    vec!["", "", "", "", ""],
                    vec!["ТОО Альфа", "Астана", "200", "", "2024"],
                ],
            ),
            (
                "Завершенные",
                vec![
                    vec!["Застройщик", "Регион", "Стоимость", "Площадь", "Год"],
                    vec!["ТОО Гамма", "Шымкент", "800", "4", "2022"],
                ],
            ),
            ("Итоги", vec![vec!["Всего объектов", "4"]]),
        ],
    )
}
