//! Shared data and configuration types for strider.
//!
//! These types are used by both the core library and the merge tool, and
//! are the parts of the persisted formats that don't carry behavior.

pub mod formatting;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Video frame index
pub type Frame = i64;

/// Track display color as RGB
pub type Rgb = [u8; 3];

// ═══════════════════════════════════════════════════════════════════════════
// Point
// ═══════════════════════════════════════════════════════════════════════════

/// A 2D position in video pixel coordinates.
///
/// Serialized as a two-element array `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&formatting::format_point(self.x, self.y))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Merge Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// How to behave when a merged track's id already exists in the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Silently assign a freshly generated id
    #[default]
    Random,
    /// Ask the operator for a replacement id (blank generates one)
    Prompt,
    /// Abort the whole merge
    Error,
}

impl ConflictPolicy {
    pub const ALL: [ConflictPolicy; 3] = [Self::Random, Self::Prompt, Self::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Prompt => "prompt",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown conflict policy name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPolicy(pub String);

impl fmt::Display for UnknownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown conflict policy {:?} (expected one of: random, prompt, error)",
            self.0
        )
    }
}

impl std::error::Error for UnknownPolicy {}

impl FromStr for ConflictPolicy {
    type Err = UnknownPolicy;

    /// Accepts the canonical names plus the legacy `auto` / `raise` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" | "auto" => Ok(Self::Random),
            "prompt" => Ok(Self::Prompt),
            "error" | "raise" => Ok(Self::Error),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Default oversampling factor used when allocating new track ids
pub const DEFAULT_ID_OVERSAMPLE: f64 = 2.0;

/// Persistent settings for the merge tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeSettings {
    /// Policy used when no `--on-conflict` flag is given
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Directories scanned for `*.toml` rule files on every merge
    #[serde(default)]
    pub rule_directories: Vec<PathBuf>,

    /// Oversampling factor for random id allocation (must be > 1)
    #[serde(default = "default_id_oversample")]
    pub id_oversample: f64,

    /// Log every rule that fires
    #[serde(default = "default_true")]
    pub log_rule_hits: bool,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::default(),
            rule_directories: Vec::new(),
            id_oversample: DEFAULT_ID_OVERSAMPLE,
            log_rule_hits: true,
        }
    }
}

fn default_id_oversample() -> f64 {
    DEFAULT_ID_OVERSAMPLE
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_serializes_as_pair() {
        let p = Point::new(3.0, 4.5);
        assert_eq!(serde_json::to_string(&p).unwrap(), "[3.0,4.5]");
        let back: Point = serde_json::from_str("[1, 2]").unwrap();
        assert_eq!(back, Point::new(1.0, 2.0));
    }

    #[test]
    fn test_point_distance() {
        assert_eq!(Point::new(0.0, 0.0).distance(&Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_conflict_policy_parse() {
        assert_eq!("random".parse(), Ok(ConflictPolicy::Random));
        assert_eq!("auto".parse(), Ok(ConflictPolicy::Random));
        assert_eq!("Prompt".parse(), Ok(ConflictPolicy::Prompt));
        assert_eq!("raise".parse(), Ok(ConflictPolicy::Error));
        assert!("explode".parse::<ConflictPolicy>().is_err());
        for policy in ConflictPolicy::ALL {
            assert_eq!(policy.as_str().parse(), Ok(policy));
        }
    }

    #[test]
    fn test_merge_settings_defaults_from_partial_toml() {
        let settings: MergeSettings = toml::from_str(r#"conflict_policy = "error""#).unwrap();
        assert_eq!(settings.conflict_policy, ConflictPolicy::Error);
        assert_eq!(settings.id_oversample, DEFAULT_ID_OVERSAMPLE);
        assert!(settings.log_rule_hits);
        assert!(settings.rule_directories.is_empty());
    }
}
