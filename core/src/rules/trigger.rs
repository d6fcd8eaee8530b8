use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};
use std::sync::Arc;

use super::{RuleContext, RuleError};
use crate::track::Track;

pub type PredicateFn = dyn Fn(&Track, &RuleContext<'_>) -> Result<bool, RuleError> + Send + Sync;

/// A predicate deciding whether a rule fires.
///
/// Triggers are cheap to clone and combine with `&`, `|`, `^` and `!`
/// (or the equivalent methods). Combinations short-circuit left to right.
#[derive(Clone)]
pub struct Trigger {
    predicate: Arc<PredicateFn>,
}

impl Trigger {
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Track, &RuleContext<'_>) -> Result<bool, RuleError> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(f),
        }
    }

    /// Trigger that only looks at the track itself and cannot fail
    pub fn from_track_fn<F>(f: F) -> Self
    where
        F: Fn(&Track) -> bool + Send + Sync + 'static,
    {
        Self::from_fn(move |track, _| Ok(f(track)))
    }

    pub fn constant(value: bool) -> Self {
        Self::from_fn(move |_, _| Ok(value))
    }

    pub fn always() -> Self {
        Self::constant(true)
    }

    pub fn never() -> Self {
        Self::constant(false)
    }

    pub fn matches(&self, track: &Track, ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
        (self.predicate)(track, ctx)
    }

    pub fn and(self, other: Trigger) -> Trigger {
        Self::from_fn(move |t, c| Ok(self.matches(t, c)? && other.matches(t, c)?))
    }

    pub fn or(self, other: Trigger) -> Trigger {
        Self::from_fn(move |t, c| Ok(self.matches(t, c)? || other.matches(t, c)?))
    }

    pub fn xor(self, other: Trigger) -> Trigger {
        Self::from_fn(move |t, c| Ok(self.matches(t, c)? ^ other.matches(t, c)?))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Trigger {
        Self::from_fn(move |t, c| Ok(!self.matches(t, c)?))
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Trigger(..)")
    }
}

impl BitAnd for Trigger {
    type Output = Trigger;

    fn bitand(self, rhs: Trigger) -> Trigger {
        self.and(rhs)
    }
}

impl BitOr for Trigger {
    type Output = Trigger;

    fn bitor(self, rhs: Trigger) -> Trigger {
        self.or(rhs)
    }
}

impl BitXor for Trigger {
    type Output = Trigger;

    fn bitxor(self, rhs: Trigger) -> Trigger {
        self.xor(rhs)
    }
}

impl Not for Trigger {
    type Output = Trigger;

    fn not(self) -> Trigger {
        Trigger::not(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Construction
// ═══════════════════════════════════════════════════════════════════════════

/// Everything a [`Trigger`] can be built from
#[derive(Clone)]
pub enum TriggerSource {
    /// Used as-is
    Trigger(Trigger),
    /// Wrapped as a trigger
    Predicate(Arc<PredicateFn>),
    /// Lifted to a predicate that ignores its input
    Constant(bool),
}

impl From<Trigger> for TriggerSource {
    fn from(t: Trigger) -> Self {
        Self::Trigger(t)
    }
}

impl From<bool> for TriggerSource {
    fn from(b: bool) -> Self {
        Self::Constant(b)
    }
}

impl From<Arc<PredicateFn>> for TriggerSource {
    fn from(f: Arc<PredicateFn>) -> Self {
        Self::Predicate(f)
    }
}

impl From<TriggerSource> for Trigger {
    fn from(source: TriggerSource) -> Self {
        match source {
            TriggerSource::Trigger(t) => t,
            TriggerSource::Predicate(predicate) => Trigger { predicate },
            TriggerSource::Constant(value) => Trigger::constant(value),
        }
    }
}

/// Build a trigger from any supported source
pub fn trigger(source: impl Into<TriggerSource>) -> Trigger {
    Trigger::from(source.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{packs, tagged};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn eval(t: &Trigger) -> bool {
        let (src, dst) = packs();
        let ctx = RuleContext {
            source: &src,
            destination: &dst,
        };
        t.matches(&tagged("1", &[]), &ctx).unwrap()
    }

    #[test]
    fn test_constant_lifting() {
        assert!(eval(&trigger(true)));
        assert!(!eval(&trigger(false)));
        assert!(eval(&trigger(Trigger::always())));
    }

    #[test]
    fn test_predicate_lifting() {
        let f: Arc<PredicateFn> =
            Arc::new(|t: &Track, _: &RuleContext<'_>| Ok::<_, RuleError>(t.id == "1"));
        assert!(eval(&trigger(f)));
    }

    #[test]
    fn test_combinator_truth_tables() {
        for a in [false, true] {
            for b in [false, true] {
                assert_eq!(eval(&(trigger(a) & trigger(b))), a && b);
                assert_eq!(eval(&(trigger(a) | trigger(b))), a || b);
                assert_eq!(eval(&(trigger(a) ^ trigger(b))), a ^ b);
            }
            assert_eq!(eval(&!trigger(a)), !a);
        }
    }

    #[test]
    fn test_and_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = {
            let calls = Arc::clone(&calls);
            Trigger::from_fn(move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            })
        };
        assert!(!eval(&Trigger::never().and(counted.clone())));
        assert!(eval(&Trigger::always().or(counted)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_errors_propagate() {
        let failing = Trigger::from_fn(|_, _| Err(RuleError::evaluation("boom")));
        let (src, dst) = packs();
        let ctx = RuleContext {
            source: &src,
            destination: &dst,
        };
        let err = (Trigger::always() & failing)
            .matches(&tagged("1", &[]), &ctx)
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
