//! Error taxonomy shared by the configure, test, and verify hooks.
//!
//! Every variant carries the offending values so the orchestrator can report
//! them without re-deriving anything.
use serde::Serialize;
use std::path::PathBuf;

/// Which test-suite threshold a run violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKind {
    /// Raw percent-passed reported by the harness.
    SuccessRate,
    /// Failures left after allow-list filtering.
    UnallowedFailures,
}

/// Failure of one of the workflow hooks.
///
/// `Configuration` and `ThresholdViolation` are the two the build framework
/// reports as a user-facing refusal; the rest are I/O or input problems.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid or conflicting feature combination, or an unsupported version.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Harness output without a usable summary line.
    #[error("failed to parse test suite output: {0}")]
    Parse(String),

    /// A test-suite threshold was not met. Rates are fractions in `[0, 1]`.
    #[error("{}", describe_violation(.kind, .required, .measured))]
    ThresholdViolation {
        kind: ThresholdKind,
        required: f64,
        measured: f64,
    },

    /// Expected binaries absent from the install root, relative to `root`.
    #[error("missing {} expected file(s) under {}: {}", .missing.len(), .root.display(), .missing.join(", "))]
    ArtifactMissing { root: PathBuf, missing: Vec<String> },

    /// The test harness could not be started.
    #[error("failed to run {command}: {source}")]
    Harness {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A config snapshot that could not be read, parsed, or written.
    #[error("invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

fn describe_violation(kind: &ThresholdKind, required: &f64, measured: &f64) -> String {
    match kind {
        ThresholdKind::SuccessRate => format!(
            "test suite failed with less than {:.2}% ({:.2}%) success rate",
            required * 100.0,
            measured * 100.0
        ),
        ThresholdKind::UnallowedFailures => format!(
            "test suite failed with more than {required} unallowed failures ({measured})"
        ),
    }
}
