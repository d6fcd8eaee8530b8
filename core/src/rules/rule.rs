use std::fmt;
use std::sync::Arc;

use super::{Action, ActionSource, Outcome, RuleContext, RuleError, Trigger, TriggerSource};
use crate::track::Track;

/// What a function rule decided about a track
#[derive(Debug, Clone, PartialEq)]
pub enum RuleVerdict {
    /// Did not apply; evaluation moves on to the next rule
    Unchanged,
    /// Applied, the track is kept as it was
    Changed,
    /// Applied, the track is replaced
    Replace(Track),
    /// Applied, the track is dropped from the merge
    Skip,
}

pub type RuleFn =
    dyn Fn(&Track, &RuleContext<'_>) -> Result<RuleVerdict, RuleError> + Send + Sync;

/// Result of applying one rule to one track
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Whether the rule fired. The first rule that fires ends evaluation.
    pub changed: bool,
    pub outcome: Outcome,
}

impl RuleOutcome {
    fn unchanged(track: Track) -> Self {
        Self {
            changed: false,
            outcome: Outcome::Keep(track),
        }
    }

    fn changed(outcome: Outcome) -> Self {
        Self {
            changed: true,
            outcome,
        }
    }
}

#[derive(Clone)]
enum RuleKind {
    Combo { trigger: Trigger, action: Action },
    Func(Arc<RuleFn>),
}

/// A named merge rule
#[derive(Clone)]
pub struct Rule {
    name: String,
    kind: RuleKind,
}

impl Rule {
    pub fn new(name: impl Into<String>, trigger: Trigger, action: Action) -> Self {
        Self {
            name: name.into(),
            kind: RuleKind::Combo { trigger, action },
        }
    }

    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Track, &RuleContext<'_>) -> Result<RuleVerdict, RuleError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: RuleKind::Func(Arc::new(f)),
        }
    }

    /// Build a rule from any supported source. Invalid action literals fail here.
    pub fn build(name: impl Into<String>, source: RuleSource) -> Result<Self, RuleError> {
        let name = name.into();
        match source {
            RuleSource::Rule(rule) => Ok(rule.named(name)),
            RuleSource::Pair(trigger, action) => {
                let action = Action::try_from(action).map_err(|e| match e {
                    RuleError::Construction { message, .. } => RuleError::Construction {
                        name: name.clone(),
                        message,
                    },
                    other => other,
                })?;
                Ok(Self::new(name, Trigger::from(trigger), action))
            }
            RuleSource::Func(f) => Ok(Self {
                name,
                kind: RuleKind::Func(f),
            }),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply the rule, consuming the track.
    ///
    /// When the rule does not fire the track comes back untouched in
    /// `outcome`.
    pub fn apply(&self, track: Track, ctx: &RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        match &self.kind {
            RuleKind::Combo { trigger, action } => {
                if trigger.matches(&track, ctx)? {
                    Ok(RuleOutcome::changed(action.apply(track, ctx)?))
                } else {
                    Ok(RuleOutcome::unchanged(track))
                }
            }
            RuleKind::Func(f) => Ok(match f(&track, ctx)? {
                RuleVerdict::Unchanged => RuleOutcome::unchanged(track),
                RuleVerdict::Changed => RuleOutcome::changed(Outcome::Keep(track)),
                RuleVerdict::Replace(replacement) => {
                    RuleOutcome::changed(Outcome::Keep(replacement))
                }
                RuleVerdict::Skip => RuleOutcome::changed(Outcome::Skip),
            }),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            RuleKind::Combo { .. } => "combo",
            RuleKind::Func(_) => "fn",
        };
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}

/// Everything a [`Rule`] can be built from
#[derive(Clone)]
pub enum RuleSource {
    Rule(Rule),
    Pair(TriggerSource, ActionSource),
    Func(Arc<RuleFn>),
}

impl From<Rule> for RuleSource {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

impl<T, A> From<(T, A)> for RuleSource
where
    T: Into<TriggerSource>,
    A: Into<ActionSource>,
{
    fn from((trigger, action): (T, A)) -> Self {
        Self::Pair(trigger.into(), action.into())
    }
}

impl From<Arc<RuleFn>> for RuleSource {
    fn from(f: Arc<RuleFn>) -> Self {
        Self::Func(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::SKIP;
    use crate::rules::test_support::{packs, tagged};

    fn run(rule: &Rule, track: Track) -> RuleOutcome {
        let (src, dst) = packs();
        let ctx = RuleContext {
            source: &src,
            destination: &dst,
        };
        rule.apply(track, &ctx).unwrap()
    }

    fn rename(to: &'static str) -> Action {
        Action::mutate(move |t, _| {
            t.id = to.to_string();
            Ok(())
        })
    }

    #[test]
    fn test_combo_fires_only_when_triggered() {
        let rule = Rule::new("r", Trigger::from_track_fn(|t| t.has_tag("car")), rename("c"));

        let hit = run(&rule, tagged("1", &["car"]));
        assert!(hit.changed);
        assert_eq!(hit.outcome.track().unwrap().id, "c");

        let miss = run(&rule, tagged("1", &["bus"]));
        assert!(!miss.changed);
        assert_eq!(miss.outcome.track().unwrap().id, "1");
    }

    #[test]
    fn test_function_verdicts() {
        let verdicts = [
            (RuleVerdict::Unchanged, false, Some("1")),
            (RuleVerdict::Changed, true, Some("1")),
            (RuleVerdict::Replace(tagged("r", &[])), true, Some("r")),
            (RuleVerdict::Skip, true, None),
        ];
        for (verdict, changed, id) in verdicts {
            let rule = Rule::from_fn("f", move |_, _| Ok(verdict.clone()));
            let out = run(&rule, tagged("1", &[]));
            assert_eq!(out.changed, changed);
            assert_eq!(out.outcome.track().map(|t| t.id.as_str()), id);
        }
    }

    #[test]
    fn test_build_from_pair() {
        let rule = Rule::build("drop all", (true, SKIP).into()).unwrap();
        assert_eq!(rule.name(), "drop all");
        assert!(run(&rule, tagged("1", &[])).outcome.is_skip());

        let err = Rule::build("bad", (true, "DROP").into()).unwrap_err();
        assert!(matches!(err, RuleError::Construction { ref name, .. } if name == "bad"));
    }

    #[test]
    fn test_build_from_rule_renames() {
        let inner = Rule::new("inner", Trigger::never(), Action::identity());
        let rule = Rule::build("outer", inner.into()).unwrap();
        assert_eq!(rule.name(), "outer");
        assert!(!run(&rule, tagged("1", &[])).changed);
    }

    #[test]
    fn test_evaluation_error_propagates() {
        let rule = Rule::from_fn("boom", |_, _| Err(RuleError::evaluation("bad track")));
        let (src, dst) = packs();
        let ctx = RuleContext {
            source: &src,
            destination: &dst,
        };
        assert!(rule.apply(tagged("1", &[]), &ctx).is_err());
    }
}
