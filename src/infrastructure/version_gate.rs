//! `pragma solidity` gate.
//!
//! Both the pragma and the supported range are parsed into unions of
//! half-open intervals over `major.minor.patch`; a file is compatible when
//! the two unions intersect.

use crate::domain::ast::SourceUnit;
use crate::domain::errors::IncompatibleVersion;
use crate::ports::VersionGate;

type Version = (u64, u64, u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version range `{range}`: {reason}")]
pub struct InvalidRange {
    pub range: String,
    pub reason: String,
}

/// `[low, high)`; `high == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    low: Version,
    high: Option<Version>,
}

impl Interval {
    const ANY: Interval = Interval { low: (0, 0, 0), high: None };

    fn is_empty(&self) -> bool {
        self.high.is_some_and(|high| high <= self.low)
    }

    fn intersect(&self, other: &Interval) -> Interval {
        let high = match (self.high, other.high) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Interval { low: self.low.max(other.low), high }
    }
}

/// A version as written, possibly partial: `0.8`, `0.8.x`, `*`.
#[derive(Debug, Clone, Copy)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
}

impl Partial {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim_start_matches(['v', 'V']);
        let mut parts = text.split('.').map(|part| match part {
            "x" | "X" | "*" => Ok(None),
            _ => part.parse::<u64>().map(Some),
        });
        let major = parts.next().unwrap_or(Ok(None)).ok()?;
        let minor = parts.next().unwrap_or(Ok(None)).ok()?;
        let patch = parts.next().unwrap_or(Ok(None)).ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Partial { major, minor, patch })
    }

    fn floor(&self) -> Version {
        (self.major.unwrap_or(0), self.minor.unwrap_or(0), self.patch.unwrap_or(0))
    }

    /// First version after everything this partial version covers.
    fn ceil(&self) -> Result<Option<Version>, String> {
        let ceil = match (self.major, self.minor, self.patch) {
            (None, _, _) => None,
            (Some(major), None, _) => Some((successor(major)?, 0, 0)),
            (Some(major), Some(minor), None) => Some((major, successor(minor)?, 0)),
            (Some(major), Some(minor), Some(patch)) => Some((major, minor, successor(patch)?)),
        };
        Ok(ceil)
    }

    fn caret_ceil(&self) -> Result<Option<Version>, String> {
        let ceil = match (self.major, self.minor, self.patch) {
            (Some(0), Some(0), Some(patch)) => Some((0, 0, successor(patch)?)),
            (Some(0), Some(minor), _) => Some((0, successor(minor)?, 0)),
            (Some(major), _, _) => Some((successor(major)?, 0, 0)),
            (None, _, _) => None,
        };
        Ok(ceil)
    }

    fn tilde_ceil(&self) -> Result<Option<Version>, String> {
        let ceil = match (self.major, self.minor) {
            (Some(major), Some(minor)) => Some((major, successor(minor)?, 0)),
            (Some(major), None) => Some((successor(major)?, 0, 0)),
            (None, _) => None,
        };
        Ok(ceil)
    }
}

fn successor(component: u64) -> Result<u64, String> {
    component
        .checked_add(1)
        .ok_or_else(|| format!("version component `{component}` is out of range"))
}

fn comparator(operator: &str, version: Partial) -> Result<Interval, String> {
    let below = |high: Option<Version>| Interval { low: (0, 0, 0), high };
    let from = |low: Version| Interval { low, high: None };
    let interval = match operator {
        "" | "=" => Interval { low: version.floor(), high: version.ceil()? },
        ">=" => from(version.floor()),
        ">" => match version.ceil()? {
            Some(low) => from(low),
            None => Interval { low: (0, 0, 0), high: Some((0, 0, 0)) },
        },
        "<" => below(Some(version.floor())),
        "<=" => below(version.ceil()?),
        "^" => Interval { low: version.floor(), high: version.caret_ceil()? },
        "~" => Interval { low: version.floor(), high: version.tilde_ceil()? },
        _ => return Err(format!("unknown operator `{operator}`")),
    };
    Ok(interval)
}

/// Splits `>= 0.4.22 <0.9.0` into `(">=", "0.4.22")`, `("<", "0.9.0")`;
/// a lone `-` is returned as an operator with an empty version.
fn comparator_tokens(set: &str) -> Vec<(String, String)> {
    let mut tokens = Vec::new();
    let mut chars = set.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return tokens;
        }
        let mut operator = String::new();
        while let Some(c) = chars.next_if(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            operator.push(c);
        }
        if operator.is_empty() && chars.next_if_eq(&'-').is_some() {
            tokens.push(("-".to_string(), String::new()));
            continue;
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let mut version = String::new();
        let in_version = |c: &char| !c.is_whitespace() && !matches!(c, '<' | '>' | '=' | '^' | '~');
        while let Some(c) = chars.next_if(in_version) {
            version.push(c);
        }
        tokens.push((operator, version));
    }
}

fn comparator_set(set: &str) -> Result<Interval, String> {
    let tokens = comparator_tokens(set);
    if tokens.is_empty() {
        return Ok(Interval::ANY);
    }

    // `a - b` hyphen range.
    if let [(op_a, a), (dash, _), (op_b, b)] = tokens.as_slice() {
        if dash == "-" && op_a.is_empty() && op_b.is_empty() {
            let a = Partial::parse(a).ok_or_else(|| format!("bad version `{a}`"))?;
            let b = Partial::parse(b).ok_or_else(|| format!("bad version `{b}`"))?;
            return Ok(Interval { low: a.floor(), high: b.ceil()? });
        }
    }

    let mut interval = Interval::ANY;
    for (operator, version) in &tokens {
        let partial = Partial::parse(version).ok_or_else(|| format!("bad version `{version}`"))?;
        interval = interval.intersect(&comparator(operator, partial)?);
    }
    Ok(interval)
}

/// A union of intervals: comparator sets joined by `||`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    text: String,
    intervals: Vec<Interval>,
}

impl VersionRange {
    pub fn parse(text: &str) -> Result<Self, InvalidRange> {
        let intervals = text
            .split("||")
            .map(comparator_set)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| InvalidRange { range: text.to_string(), reason })?;
        Ok(Self { text: text.trim().to_string(), intervals })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn intersects(&self, other: &VersionRange) -> bool {
        self.intervals
            .iter()
            .any(|a| other.intervals.iter().any(|b| !a.intersect(b).is_empty()))
    }
}

pub struct PragmaVersionGate {
    supported: VersionRange,
}

impl PragmaVersionGate {
    pub fn new(supported: &str) -> Result<Self, InvalidRange> {
        Ok(Self { supported: VersionRange::parse(supported)? })
    }
}

impl VersionGate for PragmaVersionGate {
    fn check(&self, unit: &SourceUnit) -> Result<(), IncompatibleVersion> {
        let Some(declared) = unit.solidity_pragma() else {
            return Ok(());
        };
        let incompatible = || IncompatibleVersion {
            declared: declared.to_string(),
            supported: self.supported.as_str().to_string(),
        };
        // A pragma that cannot be read cannot be shown to be compatible.
        let range = VersionRange::parse(declared).map_err(|_| incompatible())?;
        if range.intersects(&self.supported) {
            Ok(())
        } else {
            Err(incompatible())
        }
    }
}
