//! External test-harness invocation.
//!
//! The harness (`ctest`) manages its own parallelism; this module only
//! decides how many tests may run at once and captures what the harness
//! printed. Exit status is recorded but does not judge the run; the
//! evaluator does that from the output.
use crate::error::Error;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

pub const CTEST_PROGRAM: &str = "ctest";

/// Tests that may run at once: available parallelism over processes per
/// test, never below one.
pub fn concurrency_budget(parallel: u32, nprocs_per_test: u32) -> u32 {
    parallel.checked_div(nprocs_per_test).unwrap_or(0).max(1)
}

/// What the harness printed and how it exited.
#[derive(Debug, Clone)]
pub struct HarnessOutput {
    /// Stdout followed by stderr.
    pub text: String,
    /// `None` when the harness was killed by a signal.
    pub exit_code: Option<i32>,
}

/// Runs the test suite of a configured build tree.
pub trait HarnessRunner {
    /// Run the suite in `build_dir` with at most `concurrency` tests at once.
    ///
    /// A failing suite is still `Ok`; only a harness that could not be
    /// started is an error.
    fn run(&self, build_dir: &Path, concurrency: u32) -> Result<HarnessOutput, Error>;
}

/// [`HarnessRunner`] that shells out to `ctest`.
#[derive(Debug, Clone)]
pub struct CtestRunner {
    program: PathBuf,
}

impl CtestRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use `explicit` when given, otherwise find `ctest` on `PATH`.
    pub fn locate(explicit: Option<&Path>) -> Result<Self, Error> {
        if let Some(program) = explicit {
            return Ok(Self::new(program));
        }
        let program = which::which(CTEST_PROGRAM).map_err(|err| Error::Harness {
            command: CTEST_PROGRAM.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, err.to_string()),
        })?;
        Ok(Self::new(program))
    }

    /// Arguments passed to `ctest` after the program name.
    pub fn args(concurrency: u32) -> Vec<String> {
        vec![
            format!("-j{concurrency}"),
            "--output-on-failure".to_string(),
        ]
    }

    fn command_line(&self, concurrency: u32) -> String {
        let mut words = vec![self.program.display().to_string()];
        words.extend(Self::args(concurrency));
        shell_words::join(words)
    }
}

impl HarnessRunner for CtestRunner {
    fn run(&self, build_dir: &Path, concurrency: u32) -> Result<HarnessOutput, Error> {
        let command_line = self.command_line(concurrency);
        tracing::info!(command = %command_line, dir = %build_dir.display(), "running test suite");
        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(Self::args(concurrency))
            .current_dir(build_dir)
            .output()
            .map_err(|source| Error::Harness {
                command: command_line.clone(),
                source,
            })?;
        let elapsed_ms = start.elapsed().as_millis();

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let exit_code = output.status.code();
        tracing::info!(
            elapsed_ms,
            exit_code = ?exit_code,
            output_bytes = text.len(),
            "test suite finished"
        );
        tracing::debug!(output = %text, "test suite output");
        Ok(HarnessOutput { text, exit_code })
    }
}
