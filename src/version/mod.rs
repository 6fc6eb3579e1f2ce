// src/version/mod.rs

//! Version handling and range satisfaction for installable units
//!
//! Versions follow the `major.minor.micro[.qualifier]` shape used by component
//! platforms: missing numeric segments default to zero and the qualifier
//! compares lexicographically after the numbers. Ranges accept interval
//! notation (`[1.0,2.0)`), a bare minimum (`1.0` means "1.0 or later"), the
//! operator forms (`>= 1.0, < 2.0`) and `*` for any version.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A parsed unit version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    pub qualifier: String,
}

impl Version {
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    /// The lowest possible version, `0.0.0`
    pub fn zero() -> Self {
        Self::default()
    }

    /// Parse a version string
    ///
    /// Examples:
    /// - "1" → 1.0.0
    /// - "1.2" → 1.2.0
    /// - "1.2.3" → 1.2.3
    /// - "1.2.3.v20080101" → 1.2.3 with qualifier "v20080101"
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(invalid_version(s, "empty version"));
        }

        let mut parts = s.splitn(4, '.');
        let mut numbers = [0u64; 3];
        for (slot, number) in numbers.iter_mut().enumerate() {
            match parts.next() {
                Some(part) => {
                    *number = part.parse::<u64>().map_err(|e| {
                        invalid_version(s, &format!("segment {} '{}': {}", slot + 1, part, e))
                    })?;
                }
                None => break,
            }
        }

        let qualifier = parts.next().unwrap_or_default().to_string();
        if qualifier
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        {
            return Err(invalid_version(s, "qualifier may only contain [A-Za-z0-9_-]"));
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier,
        })
    }
}

fn invalid_version(input: &str, reason: &str) -> Error {
    Error::InvalidVersion {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

/// A contiguous range of versions
///
/// The lower bound always exists (`0.0.0` inclusive when unbounded); the upper
/// bound is optional.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    pub min: Version,
    pub min_inclusive: bool,
    pub max: Option<Version>,
    pub max_inclusive: bool,
}

impl VersionRange {
    /// Any version is acceptable
    pub fn any() -> Self {
        Self {
            min: Version::zero(),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
        }
    }

    /// Exactly one version, `[v,v]`
    pub fn exact(version: Version) -> Self {
        Self {
            min: version.clone(),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
        }
    }

    /// `version` or later
    pub fn at_least(version: Version) -> Self {
        Self {
            min: version,
            min_inclusive: true,
            max: None,
            max_inclusive: false,
        }
    }

    /// Half-open `[min,max)`
    pub fn between(min: Version, max: Version) -> Self {
        Self {
            min,
            min_inclusive: true,
            max: Some(max),
            max_inclusive: false,
        }
    }

    pub fn is_any(&self) -> bool {
        self.max.is_none() && self.min_inclusive && self.min == Version::zero()
    }

    /// Parse a version range string
    ///
    /// Examples:
    /// - "[1.0,2.0)" → 1.0 <= v < 2.0
    /// - "(1.0,)" → v > 1.0
    /// - "1.0" → v >= 1.0
    /// - ">= 1.0, < 2.0" → 1.0 <= v < 2.0
    /// - "= 1.5" → exactly 1.5
    /// - "*" → any
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(Self::any());
        }

        if s.starts_with('[') || s.starts_with('(') {
            return Self::parse_interval(s);
        }

        // Compound operator constraints (e.g., ">= 1.0, < 2.0")
        if s.contains(',') {
            let mut range = Self::any();
            for part in s.split(',').map(str::trim) {
                range = range.intersect(&Self::parse_operator(s, part)?);
            }
            return range.validated(s);
        }

        Self::parse_operator(s, s)?.validated(s)
    }

    fn parse_interval(s: &str) -> Result<Self> {
        let min_inclusive = s.starts_with('[');
        let max_inclusive = match s.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(invalid_range(s, "interval must end with ']' or ')'")),
        };

        let body = &s[1..s.len() - 1];
        let (low, high) = body
            .split_once(',')
            .ok_or_else(|| invalid_range(s, "interval needs a ',' between bounds"))?;

        let min = match low.trim() {
            "" => Version::zero(),
            low => Version::parse(low).map_err(|e| invalid_range(s, &e.to_string()))?,
        };
        let max = match high.trim() {
            "" => None,
            high => Some(Version::parse(high).map_err(|e| invalid_range(s, &e.to_string()))?),
        };

        Self {
            min,
            min_inclusive,
            max,
            max_inclusive,
        }
        .validated(s)
    }

    fn parse_operator(whole: &str, part: &str) -> Result<Self> {
        let version = |rest: &str| {
            Version::parse(rest.trim()).map_err(|e| invalid_range(whole, &e.to_string()))
        };

        if let Some(rest) = part.strip_prefix(">=") {
            Ok(Self::at_least(version(rest)?))
        } else if let Some(rest) = part.strip_prefix("<=") {
            Ok(Self {
                max: Some(version(rest)?),
                max_inclusive: true,
                ..Self::any()
            })
        } else if let Some(rest) = part.strip_prefix('>') {
            Ok(Self {
                min: version(rest)?,
                min_inclusive: false,
                ..Self::any()
            })
        } else if let Some(rest) = part.strip_prefix('<') {
            Ok(Self {
                max: Some(version(rest)?),
                max_inclusive: false,
                ..Self::any()
            })
        } else if let Some(rest) = part.strip_prefix('=') {
            Ok(Self::exact(version(rest)?))
        } else {
            // No operator means "this version or later"
            Ok(Self::at_least(version(part)?))
        }
    }

    /// The tightest range contained in both `self` and `other`
    fn intersect(&self, other: &Self) -> Self {
        let (min, min_inclusive) = match self.min.cmp(&other.min) {
            Ordering::Greater => (self.min.clone(), self.min_inclusive),
            Ordering::Less => (other.min.clone(), other.min_inclusive),
            Ordering::Equal => (self.min.clone(), self.min_inclusive && other.min_inclusive),
        };

        let (max, max_inclusive) = match (&self.max, &other.max) {
            (None, None) => (None, false),
            (Some(a), None) => (Some(a.clone()), self.max_inclusive),
            (None, Some(b)) => (Some(b.clone()), other.max_inclusive),
            (Some(a), Some(b)) => match a.cmp(b) {
                Ordering::Less => (Some(a.clone()), self.max_inclusive),
                Ordering::Greater => (Some(b.clone()), other.max_inclusive),
                Ordering::Equal => (Some(a.clone()), self.max_inclusive && other.max_inclusive),
            },
        };

        Self {
            min,
            min_inclusive,
            max,
            max_inclusive,
        }
    }

    fn validated(self, input: &str) -> Result<Self> {
        if let Some(max) = &self.max {
            let empty = match self.min.cmp(max) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.min_inclusive && self.max_inclusive),
                Ordering::Less => false,
            };
            if empty {
                return Err(invalid_range(input, "range contains no versions"));
            }
        }
        Ok(self)
    }

    /// Check if a version falls inside this range
    pub fn includes(&self, version: &Version) -> bool {
        let above_min = match version.cmp(&self.min) {
            Ordering::Greater => true,
            Ordering::Equal => self.min_inclusive,
            Ordering::Less => false,
        };
        let below_max = match &self.max {
            None => true,
            Some(max) => match version.cmp(max) {
                Ordering::Less => true,
                Ordering::Equal => self.max_inclusive,
                Ordering::Greater => false,
            },
        };
        above_min && below_max
    }
}

fn invalid_range(input: &str, reason: &str) -> Error {
    Error::InvalidRange {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return write!(f, "*");
        }
        match &self.max {
            None if self.min_inclusive => write!(f, "{}", self.min),
            None => write!(f, "({},)", self.min),
            Some(max) => write!(
                f,
                "{}{},{}{}",
                if self.min_inclusive { '[' } else { '(' },
                self.min,
                max,
                if self.max_inclusive { ']' } else { ')' }
            ),
        }
    }
}

impl FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(value: VersionRange) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_version_parse_short_forms() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
    }

    #[test]
    fn test_version_parse_qualifier() {
        let version = v("3.4.0.v20080512-1800");
        assert_eq!(version.micro, 0);
        assert_eq!(version.qualifier, "v20080512-1800");
        assert_eq!(version.to_string(), "3.4.0.v20080512-1800");
    }

    #[test]
    fn test_version_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("a.b").is_err());
        assert!(Version::parse("1.0.0.bad!qualifier").is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(v("1.2.3") < v("1.2.4"));
        assert!(v("1.10") > v("1.9"));
        assert!(v("1.0.0") < v("1.0.0.a"));
        assert!(v("1.0.0.a") < v("1.0.0.b"));
        assert!(v("2") > v("1.99.99.zzz"));
    }

    #[test]
    fn test_range_interval_half_open() {
        let r = VersionRange::parse("[1,2)").unwrap();
        assert!(r.includes(&v("1.0.0")));
        assert!(r.includes(&v("1.9.9")));
        assert!(!r.includes(&v("2.0.0")));
        assert!(!r.includes(&v("0.9")));
    }

    #[test]
    fn test_range_interval_exclusive_min_open_max() {
        let r = VersionRange::parse("(1.0,)").unwrap();
        assert!(!r.includes(&v("1.0")));
        assert!(r.includes(&v("1.0.0.a")));
        assert!(r.includes(&v("99")));
    }

    #[test]
    fn test_range_bare_version_is_minimum() {
        let r = VersionRange::parse("1.5").unwrap();
        assert!(r.includes(&v("1.5")));
        assert!(r.includes(&v("7.0")));
        assert!(!r.includes(&v("1.4.9")));
    }

    #[test]
    fn test_range_operator_compound() {
        let r = VersionRange::parse(">= 1.0.0, < 2.0.0").unwrap();
        assert_eq!(r, VersionRange::parse("[1.0.0,2.0.0)").unwrap());
        assert!(r.includes(&v("1.5")));
        assert!(!r.includes(&v("2.0")));
    }

    #[test]
    fn test_range_exact() {
        let r = VersionRange::parse("= 1.5.0").unwrap();
        assert!(r.includes(&v("1.5")));
        assert!(!r.includes(&v("1.5.0.q")));
        assert_eq!(r.to_string(), "[1.5.0,1.5.0]");
    }

    #[test]
    fn test_range_any() {
        let r = VersionRange::parse("*").unwrap();
        assert!(r.is_any());
        assert!(r.includes(&v("0")));
        assert_eq!(r.to_string(), "*");
    }

    #[test]
    fn test_range_empty_is_rejected() {
        assert!(VersionRange::parse("[2,1)").is_err());
        assert!(VersionRange::parse("[1,1)").is_err());
        assert!(VersionRange::parse("> 2, < 1").is_err());
        assert!(VersionRange::parse("[1,2").is_err());
    }

    #[test]
    fn test_range_display_parses_back() {
        for input in ["[1.0.0,2.0.0)", "(1.0.0,3.0.0]", "1.2.0", "(1.0.0,)", "*"] {
            let r = VersionRange::parse(input).unwrap();
            assert_eq!(VersionRange::parse(&r.to_string()).unwrap(), r, "{input}");
        }
    }

    #[test]
    fn test_range_serde_as_string() {
        let r = VersionRange::between(v("1"), v("2"));
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"[1.0.0,2.0.0)\"");
        let back: VersionRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
