//! Migration versions and their ordering.
//!
//! Every place that sorts migrations or picks an extremum (next pending,
//! current version) goes through [`Version`]'s [`Ord`] impl, which follows
//! Semantic Versioning 2.0.0 precedence:
//!
//! - `MAJOR.MINOR.PATCH` compared numerically, so `1.0.9 < 1.0.10`;
//! - a pre-release sorts before its release (`1.0.0-rc.1 < 1.0.0`);
//! - pre-release identifiers compare numerically when both are numeric,
//!   numeric identifiers sort before alphanumeric ones, and a shorter
//!   identifier list sorts first when it is a prefix of the longer one.
//!
//! Build metadata carries no precedence under SemVer. It is only used as a
//! final tie-break so that the ordering stays total and agrees with
//! equality (two distinct version strings never compare `Equal`).
//!
//! Anything else, including four-component versions such as `2.0.0.1` and
//! numeric components with leading zeros, is rejected.

use std::{cmp::Ordering, fmt, hash, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid version {input:?}: {reason}")]
pub struct ParseVersionError {
  pub input:  String,
  pub reason: String,
}

// ─── Version ─────────────────────────────────────────────────────────────────

/// A parsed semantic version. Displays as the exact string it was parsed
/// from.
#[derive(Debug, Clone)]
pub struct Version {
  inner: semver::Version,
  raw:   String,
}

impl Version {
  pub fn parse(input: &str) -> Result<Self, ParseVersionError> {
    let inner = semver::Version::parse(input).map_err(|e| ParseVersionError {
      input:  input.to_owned(),
      reason: e.to_string(),
    })?;
    Ok(Self { inner, raw: input.to_owned() })
  }

  pub fn as_str(&self) -> &str { &self.raw }

  pub fn major(&self) -> u64 { self.inner.major }

  pub fn minor(&self) -> u64 { self.inner.minor }

  pub fn patch(&self) -> u64 { self.inner.patch }

  pub fn is_pre_release(&self) -> bool { !self.inner.pre.is_empty() }
}

// ─── Ordering ────────────────────────────────────────────────────────────────

// `semver::Version` orders by precedence, then by build metadata.
impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering { self.inner.cmp(&other.inner) }
}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool { self.inner == other.inner }
}

impl Eq for Version {}

impl hash::Hash for Version {
  fn hash<H: hash::Hasher>(&self, state: &mut H) { self.inner.hash(state) }
}

// ─── Conversions ─────────────────────────────────────────────────────────────

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.raw) }
}

impl FromStr for Version {
  type Err = ParseVersionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}

impl TryFrom<&str> for Version {
  type Error = ParseVersionError;

  fn try_from(s: &str) -> Result<Self, Self::Error> { Self::parse(s) }
}

impl Serialize for Version {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.raw)
  }
}

impl<'de> Deserialize<'de> for Version {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Self::parse(&raw).map_err(serde::de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn v(s: &str) -> Version { Version::parse(s).unwrap() }

  fn sorted(input: &[&str]) -> Vec<String> {
    let mut versions: Vec<Version> = input.iter().map(|s| v(s)).collect();
    versions.sort();
    versions.into_iter().map(|v| v.to_string()).collect()
  }

  #[test]
  fn numeric_components_compare_numerically() {
    assert_eq!(sorted(&["1.0.2", "1.0.10", "1.0.9"]), ["1.0.2", "1.0.9", "1.0.10"]);
    assert_eq!(sorted(&["10.0.0", "2.0.0", "2.10.0", "2.9.1"]), [
      "2.0.0", "2.9.1", "2.10.0", "10.0.0"
    ]);
  }

  #[test]
  fn pre_release_precedence_follows_semver() {
    // Example chain from the SemVer 2.0.0 specification, §11.
    let expected = [
      "1.0.0-alpha",
      "1.0.0-alpha.1",
      "1.0.0-alpha.beta",
      "1.0.0-beta",
      "1.0.0-beta.2",
      "1.0.0-beta.11",
      "1.0.0-rc.1",
      "1.0.0",
    ];
    let mut shuffled = expected;
    shuffled.reverse();
    assert_eq!(sorted(&shuffled), expected);
  }

  #[test]
  fn build_metadata_only_breaks_ties() {
    assert!(v("1.0.0+build.1") < v("1.0.1"));
    assert!(v("1.0.0+a") < v("1.0.0+b"));
    assert!(v("1.0.0") < v("1.0.0+a"));
    assert_ne!(v("1.0.0+a"), v("1.0.0"));
    assert_eq!(v("1.0.0+a"), v("1.0.0+a"));
  }

  #[test]
  fn descending_order_is_reverse_of_ascending() {
    let mut versions = vec![v("1.0.1"), v("2.0.0"), v("1.0.0")];
    versions.sort_by(|a, b| b.cmp(a));
    let out: Vec<_> = versions.iter().map(Version::as_str).collect();
    assert_eq!(out, ["2.0.0", "1.0.1", "1.0.0"]);
  }

  #[test]
  fn rejects_invalid_versions() {
    for bad in [
      "", "1", "1.0", "2.0.0.1", "1.0.x", "01.0.0", "1.0.0-", "1.0.0+", "1..0",
      "1.0.0-alpha..1", "1.0.0-01", " 1.0.0", "v1.0.0",
    ] {
      assert!(Version::parse(bad).is_err(), "{bad:?} should be rejected");
    }
  }

  #[test]
  fn display_preserves_input() {
    assert_eq!(v("1.2.3-rc.1+sha.5114f85").to_string(), "1.2.3-rc.1+sha.5114f85");
  }

  #[test]
  fn serde_round_trips_as_string() {
    let json = serde_json::to_string(&v("3.1.4")).unwrap();
    assert_eq!(json, "\"3.1.4\"");
    let back: Version = serde_json::from_str(&json).unwrap();
    assert_eq!(back, v("3.1.4"));
    assert!(serde_json::from_str::<Version>("\"3.1\"").is_err());
  }
}
