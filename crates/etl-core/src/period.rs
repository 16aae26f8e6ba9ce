//! Reporting periods encoded in directory names such as `3T2024`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};

fn period_dir_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([1-4])T(\d{4})$").expect("regex is valid"))
}

// ── Period ────────────────────────────────────────────────────────────────────

/// One quarterly reporting interval.
///
/// Field order makes the derived `Ord` chronological: year first, then quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: u16,
    pub quarter: u8,
}

impl Period {
    /// Build a period, rejecting quarters outside `1..=4`.
    pub fn new(quarter: u8, year: u16) -> Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(EtlError::InvalidPeriod(format!("{}T{}", quarter, year)));
        }
        Ok(Self { year, quarter })
    }

    /// Parse a period directory name.
    ///
    /// The whole name must match `<1-4>T<yyyy>`; anything else (`5T2024`,
    /// `1T2024_old`, `backup`) yields `None`.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        let caps = period_dir_regex().captures(name)?;
        let quarter = caps.get(1)?.as_str().parse().ok()?;
        let year = caps.get(2)?.as_str().parse().ok()?;
        Some(Self { year, quarter })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{:04}", self.quarter, self.year)
    }
}

impl FromStr for Period {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_dir_name(s).ok_or_else(|| EtlError::InvalidPeriod(s.to_string()))
    }
}

// ── PeriodOrder ───────────────────────────────────────────────────────────────

/// How period directories are sequenced before consolidation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodOrder {
    /// String order of the directory names. `2T2023` sorts after `1T2024`,
    /// so this is not chronological across year boundaries.
    #[default]
    Lexicographic,
    /// `(year, quarter)` ascending.
    Chronological,
}

impl PeriodOrder {
    /// Sort `(directory name, period)` pairs in place.
    pub fn sort<T>(&self, items: &mut [(String, Period, T)]) {
        match self {
            PeriodOrder::Lexicographic => items.sort_by(|a, b| a.0.cmp(&b.0)),
            PeriodOrder::Chronological => items.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodOrder::Lexicographic => "lexicographic",
            PeriodOrder::Chronological => "chronological",
        }
    }
}

impl fmt::Display for PeriodOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodOrder {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lexicographic" => Ok(PeriodOrder::Lexicographic),
            "chronological" => Ok(PeriodOrder::Chronological),
            other => Err(EtlError::Config(format!("unknown period order: {}", other))),
        }
    }
}
