//! Merging several track packs into one
//!
//! Every track of every source pack runs through the rule list (first rule
//! that fires wins), then through id conflict resolution, and is finally
//! added to the destination. Nothing is written unless the whole merge
//! succeeds.


use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use strider_types::{ConflictPolicy, DEFAULT_ID_OVERSAMPLE, MergeSettings, formatting};
use thiserror::Error;

use crate::pack::{PackError, TrackPack};
use crate::rules::{Outcome, Rule, RuleContext, RuleError};
use crate::track::Track;

// ═══════════════════════════════════════════════════════════════════════════
// Id Prompt
// ═══════════════════════════════════════════════════════════════════════════

/// Asks for a replacement id when a track collides under
/// [`ConflictPolicy::Prompt`]. A blank answer means "generate one".
pub trait IdPrompt {
    fn replacement_id(&mut self, track: &Track, destination: &TrackPack) -> io::Result<String>;
}

impl<F> IdPrompt for F
where
    F: FnMut(&Track, &TrackPack) -> io::Result<String>,
{
    fn replacement_id(&mut self, track: &Track, destination: &TrackPack) -> io::Result<String> {
        self(track, destination)
    }
}

/// Prompt for non-interactive use; every request fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl IdPrompt for NoPrompt {
    fn replacement_id(&mut self, track: &Track, _: &TrackPack) -> io::Result<String> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no prompt available to rename track {:?}", track.id),
        ))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Options, Errors, Summary
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    pub policy: ConflictPolicy,
    /// Oversampling factor for generated ids, must be > 1
    pub id_oversample: f64,
    /// Log every rule hit at info level
    pub log_rule_hits: bool,
    /// Merge into the existing destination file instead of starting empty
    pub append_to_existing: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            policy: ConflictPolicy::default(),
            id_oversample: DEFAULT_ID_OVERSAMPLE,
            log_rule_hits: true,
            append_to_existing: false,
        }
    }
}

impl MergeOptions {
    /// Reject options that would only fail partway through a merge
    pub fn validate(&self) -> Result<(), PackError> {
        if !self.id_oversample.is_finite() || self.id_oversample <= 1.0 {
            return Err(PackError::InvalidOversample(self.id_oversample));
        }
        Ok(())
    }
}

impl From<&MergeSettings> for MergeOptions {
    fn from(settings: &MergeSettings) -> Self {
        Self {
            policy: settings.conflict_policy,
            id_oversample: settings.id_oversample,
            log_rule_hits: settings.log_rule_hits,
            append_to_existing: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("ID conflict: track with id {id:?} from {source_name} already exists in destination")]
    IdConflict { id: String, source_name: String },

    #[error("rule {rule:?} failed on track {track_id:?} from {source_name}: {source}")]
    Rule {
        rule: String,
        track_id: String,
        source_name: String,
        source: RuleError,
    },

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error("prompt failed: {0}")]
    Prompt(#[source] io::Error),
}

/// Counts reported after a merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Tracks added to the destination
    pub merged: usize,
    /// Tracks dropped by a rule
    pub skipped: usize,
    /// Tracks that got a new id to resolve a conflict
    pub renamed: usize,
    /// Source packs processed
    pub sources: usize,
    /// Tracks in the destination afterwards
    pub total: usize,
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "merged {} track packs (total {} tracks",
            self.sources,
            formatting::format_thousands(self.total as i64)
        )?;
        if self.skipped > 0 {
            write!(f, ", {} skipped", self.skipped)?;
        }
        if self.renamed > 0 {
            write!(f, ", {} renamed", self.renamed)?;
        }
        f.write_str(")")
    }
}

/// A merged destination and what it took to get there
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub pack: TrackPack,
    pub summary: MergeSummary,
}

// ═══════════════════════════════════════════════════════════════════════════
// Merger
// ═══════════════════════════════════════════════════════════════════════════

pub struct Merger<'a> {
    rules: &'a [Rule],
    options: MergeOptions,
    prompt: &'a mut dyn IdPrompt,
    rng: StdRng,
}

impl<'a> Merger<'a> {
    pub fn new(rules: &'a [Rule], options: MergeOptions, prompt: &'a mut dyn IdPrompt) -> Self {
        Self {
            rules,
            options,
            prompt,
            rng: StdRng::from_entropy(),
        }
    }

    /// Use a fixed rng for generated ids
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Merge `sources` in order into a copy of `destination`.
    ///
    /// On error the caller's destination is untouched.
    pub fn merge_into<I>(
        &mut self,
        destination: &TrackPack,
        sources: I,
    ) -> Result<MergeOutcome, MergeError>
    where
        I: IntoIterator<Item = TrackPack>,
    {
        self.options.validate()?;
        let mut pack = destination.clone();
        let mut summary = MergeSummary::default();

        for source in sources {
            self.merge_source(&mut pack, source, &mut summary)?;
            summary.sources += 1;
        }

        summary.total = pack.len();
        Ok(MergeOutcome { pack, summary })
    }

    fn merge_source(
        &mut self,
        destination: &mut TrackPack,
        source: TrackPack,
        summary: &mut MergeSummary,
    ) -> Result<(), MergeError> {
        tracing::debug!(source = %source.name, tracks = source.len(), "Merging track pack");

        // Rules see the whole source pack for every track, so each track is
        // copied into the rule chain rather than taken out of the source.
        for track in source.tracks() {
            let ctx = RuleContext {
                source: &source,
                destination: &*destination,
            };
            let mut track = match self.apply_rules(track.clone(), &ctx)? {
                Outcome::Keep(track) => track,
                Outcome::Skip => {
                    summary.skipped += 1;
                    continue;
                }
            };

            if self.settle_id(&mut track, destination, &source.name)? {
                summary.renamed += 1;
            }
            destination.add_track(track);
            summary.merged += 1;
        }
        Ok(())
    }

    /// Run rules in order until one fires
    fn apply_rules(&self, mut track: Track, ctx: &RuleContext<'_>) -> Result<Outcome, MergeError> {
        for rule in self.rules {
            let track_id = track.id.clone();
            let result = rule
                .apply(track, ctx)
                .map_err(|source| MergeError::Rule {
                    rule: rule.name().to_string(),
                    track_id: track_id.clone(),
                    source_name: ctx.source.name.clone(),
                    source,
                })?;

            if result.changed {
                if self.options.log_rule_hits {
                    tracing::info!(
                        rule = rule.name(),
                        track = %track_id,
                        source = %ctx.source.name,
                        skipped = result.outcome.is_skip(),
                        "Rule applied"
                    );
                }
                return Ok(result.outcome);
            }
            track = match result.outcome {
                Outcome::Keep(t) => t,
                // Rules that did not fire always hand the track back
                Outcome::Skip => return Ok(Outcome::Skip),
            };
        }
        Ok(Outcome::Keep(track))
    }

    /// Apply the conflict policy until the track id is free. Returns whether
    /// the id changed.
    fn settle_id(
        &mut self,
        track: &mut Track,
        destination: &TrackPack,
        source_name: &str,
    ) -> Result<bool, MergeError> {
        let mut renamed = false;
        while destination.contains(&track.id) {
            let new_id = match self.options.policy {
                ConflictPolicy::Error => {
                    return Err(MergeError::IdConflict {
                        id: track.id.clone(),
                        source_name: source_name.to_string(),
                    });
                }
                ConflictPolicy::Random => self.generate_id(destination)?,
                ConflictPolicy::Prompt => {
                    let answer = self
                        .prompt
                        .replacement_id(track, destination)
                        .map_err(MergeError::Prompt)?;
                    let answer = answer.trim();
                    if answer.is_empty() {
                        self.generate_id(destination)?
                    } else {
                        answer.to_string()
                    }
                }
            };
            tracing::info!(
                old_id = %track.id,
                new_id = %new_id,
                source = source_name,
                "Track id already exists in destination, reassigned"
            );
            track.id = new_id;
            renamed = true;
        }
        Ok(renamed)
    }

    fn generate_id(&mut self, destination: &TrackPack) -> Result<String, MergeError> {
        Ok(destination.new_id_with(&mut self.rng, self.options.id_oversample)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// File Entry Point
// ═══════════════════════════════════════════════════════════════════════════

/// Merge pack files into `destination` and write it atomically.
///
/// All sources are read before anything is merged. The destination file is
/// only replaced when every source merged cleanly.
pub fn merge_files(
    destination: &Path,
    sources: &[PathBuf],
    rules: &[Rule],
    options: &MergeOptions,
    prompt: &mut dyn IdPrompt,
) -> Result<MergeSummary, MergeError> {
    options.validate()?;
    let base = if options.append_to_existing {
        TrackPack::read_or_new(destination)?
    } else {
        TrackPack::new(destination.display().to_string())
    };

    let packs = sources
        .iter()
        .map(|path| TrackPack::read(path))
        .collect::<Result<Vec<_>, _>>()?;

    let outcome = Merger::new(rules, options.clone(), prompt).merge_into(&base, packs)?;
    outcome.pack.write(destination)?;

    tracing::info!(
        destination = %destination.display(),
        merged = outcome.summary.merged,
        skipped = outcome.summary.skipped,
        renamed = outcome.summary.renamed,
        total = outcome.summary.total,
        "Merge complete"
    );
    Ok(outcome.summary)
}
