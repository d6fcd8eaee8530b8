//! Merge rules
//!
//! Rules decide what happens to each track while several packs are merged
//! into one. They are built from three pieces:
//! - **Triggers**: predicates over a track and its merge context
//! - **Actions**: transforms producing a new track, or [`Outcome::Skip`]
//! - **Rules**: a trigger/action pair, or a single function, with a name
//!
//! Rules can be written in code or loaded from TOML rule files.
//!
//! # Evaluation
//!
//! ```text
//!  track ──► rule 1 ──changed?──yes──► outcome
//!              │no
//!              ▼
//!            rule 2 ──changed?──yes──► outcome
//!              │no
//!              ▼
//!             ...   ──────────────────► track unchanged
//! ```

mod action;
mod builtins;
mod config;
mod definitions;
mod rule;
mod trigger;

use thiserror::Error;

use crate::pack::TrackPack;
use crate::track::Track;

pub use action::{Action, ActionSource, MutateFn, SKIP, TransformFn, action};
pub use builtins::{
    add_tags, change_id, has_any_tag, has_tag, id_matches, min_points, remove_tags, set_color,
    source_matches,
};
pub use config::{
    default_rule_dir, load_rule_config, load_rule_directory, load_rule_file, load_rule_files,
};
pub use definitions::{ActionDefinition, RuleConfig, RuleDefinition, TriggerDefinition};
pub use rule::{Rule, RuleFn, RuleOutcome, RuleSource, RuleVerdict};
pub use trigger::{PredicateFn, Trigger, TriggerSource, trigger};

/// What rules can see while deciding about a track.
///
/// `source` is the complete pack the track under evaluation comes from.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub source: &'a TrackPack,
    pub destination: &'a TrackPack,
}

/// Result of an action: the track to merge, or the SKIP sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Keep(Track),
    Skip,
}

impl Outcome {
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip)
    }

    pub fn track(&self) -> Option<&Track> {
        match self {
            Self::Keep(track) => Some(track),
            Self::Skip => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule could not be built from its definition. Fatal before any merge.
    #[error("invalid rule {name:?}: {message}")]
    Construction { name: String, message: String },

    /// Raised by rule logic while evaluating a track
    #[error("{0}")]
    Evaluation(String),

    #[error("I/O error reading rules from {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("parse error in rule file {path:?}: {source}")]
    Parse {
        path: std::path::PathBuf,
        source: toml::de::Error,
    },
}

impl RuleError {
    pub fn construction(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Construction {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }
}
