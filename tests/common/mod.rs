#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

pub const CALL_HEADER: &str = "Date,Agent ID,Team,Handle Time,First Call Resolution,Calls Offered,Calls Answered,Logged Time,Productive Time,QA Score,CSAT Score,NPS Score,Compliance Pass";

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

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn write_calls(&self, name: &str, rows: usize) -> PathBuf {
        self.write(name, &call_center_csv(rows))
    }

    pub fn write_config(&self, yaml: &str) -> PathBuf {
        self.write("config.yaml", yaml)
    }
}

/// One call-center record, produced deterministically from its index.
#[derive(Debug, Clone)]
pub struct CallRow {
    pub date: String,
    pub agent: String,
    pub team: &'static str,
    pub handle_time: f64,
    pub resolved: bool,
    pub offered: u32,
    pub answered: u32,
    pub logged: f64,
    pub productive: f64,
    pub qa_score: f64,
    pub csat: f64,
    pub nps: i32,
    pub compliant: bool,
}

impl CallRow {
    pub fn generate(index: usize) -> Self {
        let day = 1 + (index % 28);
        let month = 1 + (index / 28) % 12;
        let spread = ((index * 37) % 120) as f64;
        Self {
            date: format!("2024-{month:02}-{day:02}"),
            agent: format!("A{}", 1 + index % 4),
            team: if index % 2 == 0 { "North" } else { "South" },
            handle_time: 240.0 + spread,
            resolved: index % 3 != 0,
            offered: 100,
            answered: 80 + (index % 15) as u32,
            logged: 480.0,
            productive: 360.0 + (index % 60) as f64,
            // Quality tracks handle time so the pair correlates strongly.
            qa_score: 70.0 + spread / 6.0,
            csat: 3.0 + (index % 3) as f64 * 0.5,
            nps: (index % 11) as i32 * 10 - 20,
            compliant: index % 10 != 0,
        }
    }

    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.date,
            self.agent,
            self.team,
            self.handle_time,
            u8::from(self.resolved),
            self.offered,
            self.answered,
            self.logged,
            self.productive,
            self.qa_score,
            self.csat,
            self.nps,
            u8::from(self.compliant)
        )
    }
}

pub fn call_rows(rows: usize) -> Vec<CallRow> {
    (0..rows).map(CallRow::generate).collect()
}

pub fn call_center_csv(rows: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{CALL_HEADER}");
    for row in call_rows(rows) {
        let _ = writeln!(out, "{}", row.to_csv_line());
    }
    out
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    sum / count as f64
}

pub fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}
