//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const EXIT_BREACH: i32 = 1;
pub const EXIT_ERROR: i32 = 2;
pub const EXIT_REDIRECT: i32 = 3;
pub const EXIT_NOT_FOUND: i32 = 4;
pub const EXIT_FORBIDDEN: i32 = 5;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// Checked-in result documents shared by the CLI tests.
pub fn results_fixture_dir() -> PathBuf {
    manifest_dir().join("tests").join("fixtures").join("results")
}

/// Scratch space holding a report directory and its archive state.
pub struct Workspace {
    pub temp: TempDir,
    pub report_dir: PathBuf,
    pub state_path: PathBuf,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("create temp dir");
        let report_dir = temp.path().join("report");
        let state_path = temp.path().join("report.archive.json");
        Self {
            temp,
            report_dir,
            state_path,
        }
    }

    pub fn report_file(&self, rel: &str) -> PathBuf {
        self.report_dir.join(rel)
    }

    pub fn read_report_file(&self, rel: &str) -> String {
        let path = self.report_file(rel);
        std::fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("read {}: {err}", path.display()))
    }

    /// Run `generate` over the fixture results with extra flags.
    pub fn generate(&self, extra: &[&str]) -> Output {
        let mut args: Vec<String> = vec![
            "generate".into(),
            "--input".into(),
            results_fixture_dir().display().to_string(),
            "--output".into(),
            self.report_dir.display().to_string(),
        ];
        args.extend(extra.iter().map(|arg| arg.to_string()));
        run_bddreport(&args)
    }

    pub fn fetch(&self, rel: &str) -> Output {
        run_bddreport(&[
            "fetch".to_string(),
            "--state".to_string(),
            self.state_path.display().to_string(),
            rel.to_string(),
        ])
    }
}

pub fn run_bddreport<S: AsRef<std::ffi::OsStr>>(args: &[S]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bddreport"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run bddreport")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn assert_exit(output: &Output, expected: i32) {
    assert_eq!(
        output.status.code(),
        Some(expected),
        "stdout:\n{}\nstderr:\n{}",
        stdout(output),
        stderr(output)
    );
}

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent directory");
    }
    std::fs::write(path, contents.as_bytes()).expect("write file");
}
