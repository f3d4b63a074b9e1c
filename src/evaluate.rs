//! Test-suite outcome evaluation.
//!
//! The harness prints one summary line plus one line per failing test:
//! ```text
//! 635/635 Test #570: system--epw_wfpt-correctness ..........***Failed    3.52 sec
//! 74% tests passed, 124 tests failed out of 481
//! ```
//! Two independent checks decide the run:
//! - the raw percent-passed from the summary line against the rate threshold,
//!   allowed failures included;
//! - the number of failing lines no allow rule matches against the maximum.
//!
//! Allow rules are plain substrings (case-sensitive, unanchored). They only
//! shrink the failure count; they never raise the raw rate.
use crate::error::{Error, ThresholdKind};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Marks a per-test failure line in the harness output.
pub const FAILURE_MARKER: &str = "***Failed";

/// Counts from the harness summary line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestRunSummary {
    /// Fraction in [0, 1] as reported by the harness (integer percent / 100).
    pub percent_passed: f64,
    pub failed_count: u64,
    pub total_count: u64,
}

impl TestRunSummary {
    /// Tests that did not fail.
    pub fn passed_count(&self) -> u64 {
        self.total_count.saturating_sub(self.failed_count)
    }
}

/// One threshold a run did not meet.
///
/// For [`ThresholdKind::SuccessRate`] both values are fractions; for
/// [`ThresholdKind::UnallowedFailures`] they are counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub kind: ThresholdKind,
    /// Configured threshold.
    pub required: f64,
    /// Value observed in the run.
    pub measured: f64,
}

impl Violation {
    fn into_error(self) -> Error {
        Error::ThresholdViolation {
            kind: self.kind,
            required: self.required,
            measured: self.measured,
        }
    }
}

/// Outcome of a test run: `Fail` when any threshold was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Pass,
    Fail,
}

/// Full result of judging one harness run.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub summary: TestRunSummary,
    pub unallowed_failures: Vec<String>,
    pub allowed_failures: Vec<String>,
    /// Rate violation first, then count violation.
    pub violations: Vec<Violation>,
}

impl Evaluation {
    /// Turn a failing decision into a threshold error naming the first violation.
    pub fn into_result(self) -> Result<Self, Error> {
        match self.violations.first() {
            Some(violation) => Err(violation.clone().into_error()),
            None => Ok(self),
        }
    }
}

fn summary_regex() -> &'static Regex {
    static SUMMARY: OnceLock<Regex> = OnceLock::new();
    SUMMARY.get_or_init(|| {
        Regex::new(
            r"(?m)^ *(?P<perc>\d+)% tests passed, +(?P<failed>\d+) +tests failed out of +(?P<total>\d+)",
        )
        .expect("regex for test summary line")
    })
}

/// Find and parse the harness summary line.
pub fn parse_summary(output: &str) -> Result<TestRunSummary, Error> {
    let mut matches = summary_regex().captures_iter(output);
    let Some(caps) = matches.next() else {
        return Err(Error::Parse(
            "no \"<pct>% tests passed, <n> tests failed out of <total>\" line".to_string(),
        ));
    };
    let extra = matches.count();
    if extra > 0 {
        tracing::warn!(extra, "multiple test summary lines found; using the first");
    }

    let number = |name: &str| -> Result<u64, Error> {
        let text = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
        text.parse::<u64>()
            .map_err(|err| Error::Parse(format!("summary field {name} {text:?}: {err}")))
    };
    let percent = number("perc")?;
    let failed_count = number("failed")?;
    let total_count = number("total")?;
    if total_count == 0 {
        return Err(Error::Parse(
            "summary reports zero tests; an empty run cannot be judged".to_string(),
        ));
    }
    Ok(TestRunSummary {
        percent_passed: percent as f64 / 100.0,
        failed_count,
        total_count,
    })
}

/// Split failing lines into allowed and unallowed by substring rules.
pub fn partition_failures<S: AsRef<str>>(
    output: &str,
    allow_rules: &[S],
) -> (Vec<String>, Vec<String>) {
    let mut allowed = Vec::new();
    let mut unallowed = Vec::new();
    for line in output.lines().filter(|line| line.contains(FAILURE_MARKER)) {
        tracing::warn!(line, "test failed");
        let rule = allow_rules
            .iter()
            .map(|rule| rule.as_ref())
            .find(|rule| line.contains(*rule));
        match rule {
            Some(rule) => {
                tracing::info!(line, rule, "ignoring allowed failure");
                allowed.push(line.to_string());
            }
            None => unallowed.push(line.to_string()),
        }
    }
    (allowed, unallowed)
}

/// Judge harness output against the rate threshold and the unallowed-failure
/// maximum.
///
/// Both checks always run, so `violations` lists every threshold missed.
/// Returns `Error::Parse` when the output has no usable summary line; a
/// failing run is still `Ok` with [`Decision::Fail`] (see
/// [`Evaluation::into_result`]).
pub fn evaluate<S: AsRef<str>>(
    output: &str,
    allow_rules: &[S],
    rate_threshold: f64,
    max_unallowed_failures: u32,
) -> Result<Evaluation, Error> {
    let summary = parse_summary(output)?;
    let (allowed_failures, unallowed_failures) = partition_failures(output, allow_rules);

    tracing::info!(
        passed = summary.passed_count(),
        total = summary.total_count,
        percent = summary.percent_passed * 100.0,
        unallowed = unallowed_failures.len(),
        allowed = allowed_failures.len(),
        "test suite summary"
    );

    let mut violations = Vec::new();
    if summary.percent_passed < rate_threshold {
        violations.push(Violation {
            kind: ThresholdKind::SuccessRate,
            required: rate_threshold,
            measured: summary.percent_passed,
        });
    }
    let unallowed_count = unallowed_failures.len();
    if unallowed_count > max_unallowed_failures as usize {
        violations.push(Violation {
            kind: ThresholdKind::UnallowedFailures,
            required: f64::from(max_unallowed_failures),
            measured: unallowed_count as f64,
        });
    }

    let decision = if violations.is_empty() {
        Decision::Pass
    } else {
        Decision::Fail
    };
    Ok(Evaluation {
        decision,
        summary,
        unallowed_failures,
        allowed_failures,
        violations,
    })
}
