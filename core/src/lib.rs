//! Track annotation data model and merge engine for strider
//!
//! - [`track`]: one object's points over frames
//! - [`pack`]: collections of tracks, saved as `.json` annotation files
//! - [`quick_tags`]: single-keystroke tag menus
//! - [`rules`] and [`merge`]: combining several packs into one

pub mod config;
pub mod merge;
pub mod pack;
pub mod quick_tags;
pub mod rules;
pub mod track;

pub use merge::{
    IdPrompt, MergeError, MergeOptions, MergeOutcome, MergeSummary, Merger, NoPrompt, merge_files,
};
pub use pack::{FORMAT_VERSION, PackError, TrackPack};
pub use quick_tags::{
    QuickTagError, QuickTagLookup, QuickTagOptions, QuickTagTree, resolve_quick_tags, tag_names,
};
pub use rules::{Action, Outcome, Rule, RuleContext, RuleError, SKIP, Trigger};
pub use track::{Track, TrackError};
