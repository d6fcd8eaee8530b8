use std::fmt;
use std::sync::Arc;

use super::{Outcome, RuleContext, RuleError};
use crate::track::Track;

/// Literal that lifts to an always-skip action
pub const SKIP: &str = "SKIP";

pub type TransformFn =
    dyn Fn(Track, &RuleContext<'_>) -> Result<Outcome, RuleError> + Send + Sync;
pub type MutateFn = dyn Fn(&mut Track, &RuleContext<'_>) -> Result<(), RuleError> + Send + Sync;

/// A transform applied to a track when its rule fires
#[derive(Clone)]
pub struct Action {
    transform: Arc<TransformFn>,
}

impl Action {
    /// Action that consumes the track and decides its outcome
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Track, &RuleContext<'_>) -> Result<Outcome, RuleError> + Send + Sync + 'static,
    {
        Self {
            transform: Arc::new(f),
        }
    }

    /// Action that edits the track in place and always keeps it
    pub fn mutate<F>(f: F) -> Self
    where
        F: Fn(&mut Track, &RuleContext<'_>) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        Self::from_fn(move |mut track, ctx| {
            f(&mut track, ctx)?;
            Ok(Outcome::Keep(track))
        })
    }

    pub fn identity() -> Self {
        Self::from_fn(|track, _| Ok(Outcome::Keep(track)))
    }

    pub fn skip() -> Self {
        Self::from_fn(|_, _| Ok(Outcome::Skip))
    }

    pub fn apply(&self, track: Track, ctx: &RuleContext<'_>) -> Result<Outcome, RuleError> {
        (self.transform)(track, ctx)
    }

    /// Run `self`, then `next` on its result. A skip ends the chain.
    pub fn then(self, next: Action) -> Action {
        Self::from_fn(move |track, ctx| match self.apply(track, ctx)? {
            Outcome::Keep(track) => next.apply(track, ctx),
            Outcome::Skip => Ok(Outcome::Skip),
        })
    }

    /// Run `prev` first, then `self`
    pub fn after(self, prev: Action) -> Action {
        prev.then(self)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Action(..)")
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Construction
// ═══════════════════════════════════════════════════════════════════════════

/// Everything an [`Action`] can be built from
#[derive(Clone)]
pub enum ActionSource {
    /// Used as-is
    Action(Action),
    /// Consumes the track and returns the outcome
    Map(Arc<TransformFn>),
    /// Edits the track in place
    Mutate(Arc<MutateFn>),
    /// Only [`SKIP`] is accepted
    Literal(String),
    /// Lifted to the identity action
    None,
}

impl From<Action> for ActionSource {
    fn from(a: Action) -> Self {
        Self::Action(a)
    }
}

impl From<Option<Action>> for ActionSource {
    fn from(a: Option<Action>) -> Self {
        a.map_or(Self::None, Self::Action)
    }
}

impl From<&str> for ActionSource {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<Arc<TransformFn>> for ActionSource {
    fn from(f: Arc<TransformFn>) -> Self {
        Self::Map(f)
    }
}

impl From<Arc<MutateFn>> for ActionSource {
    fn from(f: Arc<MutateFn>) -> Self {
        Self::Mutate(f)
    }
}

impl TryFrom<ActionSource> for Action {
    type Error = RuleError;

    fn try_from(source: ActionSource) -> Result<Self, Self::Error> {
        match source {
            ActionSource::Action(a) => Ok(a),
            ActionSource::Map(transform) => Ok(Action { transform }),
            ActionSource::Mutate(f) => Ok(Action::mutate(move |track, ctx| f(track, ctx))),
            ActionSource::Literal(s) if s == SKIP => Ok(Action::skip()),
            ActionSource::Literal(s) => Err(RuleError::construction(
                "<action>",
                format!("{s:?} is not a valid action literal (only {SKIP:?} is)"),
            )),
            ActionSource::None => Ok(Action::identity()),
        }
    }
}

/// Build an action from any supported source
pub fn action(source: impl Into<ActionSource>) -> Result<Action, RuleError> {
    Action::try_from(source.into())
}
