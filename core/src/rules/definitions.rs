//! Rule definition types
//!
//! Definitions describe rules declaratively in TOML rule files. They are
//! turned into [`Rule`]s once at load time; a definition that cannot be
//! built (bad regex, empty tag list) is a construction error.

use serde::{Deserialize, Serialize};
use strider_types::Rgb;

use super::{Action, Rule, RuleError, Trigger, builtins};

// ═══════════════════════════════════════════════════════════════════════════
// Triggers
// ═══════════════════════════════════════════════════════════════════════════

/// When a rule fires
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TriggerDefinition {
    /// Every track
    #[default]
    Always,

    /// No track (useful for disabling a rule without deleting it)
    Never,

    /// Track carries the tag
    HasTag { tag: String },

    /// Track carries at least one of the tags
    HasAnyTag { tags: Vec<String> },

    /// Full regex match against the source pack name, file name or stem
    SourceMatches { pattern: String },

    /// Full regex match against the track id
    IdMatches { pattern: String },

    /// Track has at least `count` points
    MinPoints { count: usize },

    /// Every nested trigger passes (true when empty)
    All { triggers: Vec<TriggerDefinition> },

    /// Some nested trigger passes (false when empty)
    Any { triggers: Vec<TriggerDefinition> },

    /// An odd number of nested triggers pass
    Xor { triggers: Vec<TriggerDefinition> },

    /// Nested trigger fails
    Not { trigger: Box<TriggerDefinition> },
}

impl TriggerDefinition {
    /// Build the trigger; `rule` names the owning rule in errors
    pub fn build(&self, rule: &str) -> Result<Trigger, RuleError> {
        let named = |e: RuleError| rename_construction(e, rule);
        Ok(match self {
            Self::Always => Trigger::always(),
            Self::Never => Trigger::never(),
            Self::HasTag { tag } => {
                if tag.trim().is_empty() {
                    return Err(RuleError::construction(rule, "has_tag needs a tag"));
                }
                builtins::has_tag(tag.trim())
            }
            Self::HasAnyTag { tags } => builtins::has_any_tag(non_empty(tags, rule, "has_any_tag")?),
            Self::SourceMatches { pattern } => builtins::source_matches(pattern).map_err(named)?,
            Self::IdMatches { pattern } => builtins::id_matches(pattern).map_err(named)?,
            Self::MinPoints { count } => builtins::min_points(*count),
            Self::All { triggers } => build_all(triggers, rule)?
                .into_iter()
                .fold(Trigger::always(), Trigger::and),
            Self::Any { triggers } => build_all(triggers, rule)?
                .into_iter()
                .fold(Trigger::never(), Trigger::or),
            Self::Xor { triggers } => build_all(triggers, rule)?
                .into_iter()
                .fold(Trigger::never(), Trigger::xor),
            Self::Not { trigger } => trigger.build(rule)?.not(),
        })
    }
}

fn build_all(triggers: &[TriggerDefinition], rule: &str) -> Result<Vec<Trigger>, RuleError> {
    triggers.iter().map(|t| t.build(rule)).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Actions
// ═══════════════════════════════════════════════════════════════════════════

/// One step of what a rule does once it fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ActionDefinition {
    /// Drop the track from the merge
    Skip,

    AddTags { tags: Vec<String> },

    RemoveTags { tags: Vec<String> },

    /// Rename to `prefix + id + postfix`
    ChangeId {
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        postfix: String,
    },

    SetColor { color: Rgb },
}

impl ActionDefinition {
    pub fn build(&self, rule: &str) -> Result<Action, RuleError> {
        Ok(match self {
            Self::Skip => Action::skip(),
            Self::AddTags { tags } => builtins::add_tags(non_empty(tags, rule, "add_tags")?),
            Self::RemoveTags { tags } => {
                builtins::remove_tags(non_empty(tags, rule, "remove_tags")?)
            }
            Self::ChangeId { prefix, postfix } => {
                if prefix.is_empty() && postfix.is_empty() {
                    return Err(RuleError::construction(
                        rule,
                        "change_id needs a prefix or a postfix",
                    ));
                }
                builtins::change_id(prefix.as_str(), postfix.as_str())
            }
            Self::SetColor { color } => builtins::set_color(*color),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Rules
// ═══════════════════════════════════════════════════════════════════════════

/// Definition of a merge rule (loaded from config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Unique identifier for this rule (e.g., "tag_cam1")
    pub id: String,

    /// Display name used when the rule fires (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub trigger: TriggerDefinition,

    /// Applied in order; an empty list keeps the track as it is
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

impl RuleDefinition {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn build(&self) -> Result<Rule, RuleError> {
        if self.id.trim().is_empty() {
            return Err(RuleError::construction(
                self.display_name(),
                "rule id must not be empty",
            ));
        }
        let trigger = self.trigger.build(&self.id)?;
        let action = self
            .actions
            .iter()
            .map(|a| a.build(&self.id))
            .try_fold(Action::identity(), |chain, next| next.map(|n| chain.then(n)))?;
        Ok(Rule::new(self.display_name(), trigger, action))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Serde Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn default_true() -> bool {
    true
}

fn non_empty<'a>(tags: &'a [String], rule: &str, what: &str) -> Result<&'a [String], RuleError> {
    if tags.iter().all(|t| t.trim().is_empty()) {
        return Err(RuleError::construction(rule, format!("{what} needs at least one tag")));
    }
    Ok(tags)
}

fn rename_construction(e: RuleError, rule: &str) -> RuleError {
    match e {
        RuleError::Construction { message, .. } => RuleError::construction(rule, message),
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Config File Structure
// ═══════════════════════════════════════════════════════════════════════════

/// Root structure for rule files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleDefinition>,
}
