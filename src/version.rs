//! Package version tokens with segment-wise numeric ordering.
//!
//! Versions are split into runs of digits and runs of letters, so `7.3.1`
//! becomes `[7, 3, 1]` and `7.4rc1` becomes `[7, 4, "rc", 1]`. Numeric runs
//! compare as integers, never as strings, which keeps `7.10 > 7.9`. Segment
//! lists compare element by element and, when one is a prefix of the other,
//! the longer one is greater: `7.3 < 7.3.0 < 7.3.1`. Exact-release checks
//! therefore only match the spelling they name.
use crate::error::Error;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Num(u64),
    Text(String),
}

impl Segment {
    fn cmp_segment(&self, other: &Segment) -> Ordering {
        match (self, other) {
            (Segment::Num(a), Segment::Num(b)) => a.cmp(b),
            (Segment::Text(a), Segment::Text(b)) => a.cmp(b),
            (Segment::Num(_), Segment::Text(_)) => Ordering::Less,
            (Segment::Text(_), Segment::Num(_)) => Ordering::Greater,
        }
    }
}

/// A package version such as `7.3.1`.
///
/// Keeps the raw spelling for display and serialization; ordering and
/// equality use the parsed segments only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    raw: String,
    segments: Vec<Segment>,
}

fn segment_regex() -> &'static Regex {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT.get_or_init(|| Regex::new(r"\d+|[A-Za-z]+").expect("regex for version segments"))
}

impl Version {
    /// Parse a version token, rejecting text with no digit or letter runs.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();
        let mut segments = Vec::new();
        for token in segment_regex().find_iter(trimmed) {
            let text = token.as_str();
            let segment = if text.as_bytes()[0].is_ascii_digit() {
                let value = text.parse::<u64>().map_err(|_| {
                    Error::Configuration(format!("version segment {text:?} in {raw:?} is out of range"))
                })?;
                Segment::Num(value)
            } else {
                Segment::Text(text.to_string())
            };
            segments.push(segment);
        }
        if segments.is_empty() {
            return Err(Error::Configuration(format!("invalid version {raw:?}")));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The trimmed version text as written in the config.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for (left, right) in self.segments.iter().zip(&other.segments) {
            match left.cmp_segment(right) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.segments.len().cmp(&other.segments.len())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl FromStr for Version {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Version::parse(raw)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Version::parse(&raw)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.raw
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
