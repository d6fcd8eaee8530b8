//! Named collections of tracks.
//!
//! A [`TrackPack`] is what gets saved to and loaded from a `.json` annotation
//! file. Besides storage it keeps an "enabled" subset, which is what the
//! viewer draws, and hands out fresh track ids.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use hashbrown::{HashMap, HashSet};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strider_types::{DEFAULT_ID_OVERSAMPLE, Frame, Point};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::track::Track;

/// Current persisted format version
pub const FORMAT_VERSION: &str = "1";

/// Errors raised while manipulating, loading or saving a pack
#[derive(Debug, Error)]
pub enum PackError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not decode track pack {name}: {source}")]
    Decode {
        name: String,
        source: serde_json::Error,
    },

    #[error("could not encode track pack {name}: {source}")]
    Encode {
        name: String,
        source: serde_json::Error,
    },

    #[error("track pack {name} has unsupported format version {version:?}")]
    UnsupportedVersion { name: String, version: String },

    #[error("track pack {name} contains track id {id} more than once")]
    DuplicateTrack { name: String, id: String },

    #[error("a track with id {0} already exists")]
    TrackExists(String),

    #[error("no track with id {0}")]
    UnknownTrack(String),

    #[error("id oversampling factor must be a finite number greater than 1, got {0}")]
    InvalidOversample(f64),
}

#[derive(Debug, Clone, Default)]
pub struct TrackPack {
    /// Display name, usually the path the pack was read from
    pub name: String,
    /// Video the tracks were annotated on
    pub video_reference: Option<String>,

    tracks: HashMap<String, Track>,
    /// Ids in insertion / file order
    order: Vec<String>,
    /// Always a subset of `tracks` keys
    enabled: HashSet<String>,
}

impl TrackPack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    // --- Tracks ---

    /// Insert a track.
    ///
    /// The pack does not dedupe: a track with an existing id replaces the
    /// old one in place, keeping its position and enabled state.
    pub fn add_track(&mut self, track: Track) {
        if !self.tracks.contains_key(&track.id) {
            self.order.push(track.id.clone());
        }
        self.tracks.insert(track.id.clone(), track);
    }

    /// Create an empty, enabled track with a random color.
    ///
    /// Without an explicit id a fresh one is allocated with [`Self::new_id`].
    pub fn new_track(&mut self, id: Option<String>) -> Result<&Track, PackError> {
        let id = match id {
            Some(id) if self.tracks.contains_key(&id) => return Err(PackError::TrackExists(id)),
            Some(id) => id,
            None => self.new_id(),
        };
        let track = Track::with_random_color(id.clone(), &mut rand::thread_rng());
        self.add_track(track);
        self.enabled.insert(id.clone());
        self.tracks.get(&id).ok_or(PackError::UnknownTrack(id))
    }

    pub fn remove_track(&mut self, id: &str) -> Option<Track> {
        let track = self.tracks.remove(id)?;
        self.enabled.remove(id);
        if let Some(pos) = self.order.iter().position(|o| o == id) {
            self.order.remove(pos);
        }
        Some(track)
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    /// Edit a track in place.
    ///
    /// If `f` changes the id, the track is re-keyed under the new id, keeping
    /// its position and enabled state. A new id that is already taken is
    /// rolled back and reported as [`PackError::TrackExists`]; other edits
    /// made by `f` are kept.
    pub fn update<R>(&mut self, id: &str, f: impl FnOnce(&mut Track) -> R) -> Result<R, PackError> {
        let track = self
            .tracks
            .get_mut(id)
            .ok_or_else(|| PackError::UnknownTrack(id.to_string()))?;
        let ret = f(track);
        if track.id == id {
            return Ok(ret);
        }

        let new_id = std::mem::replace(&mut track.id, id.to_string());
        self.rename(id, &new_id)?;
        Ok(ret)
    }

    /// Give a track a new id, keeping its position and enabled state
    pub fn rename(&mut self, id: &str, new_id: &str) -> Result<(), PackError> {
        if id == new_id {
            return if self.contains(id) {
                Ok(())
            } else {
                Err(PackError::UnknownTrack(id.to_string()))
            };
        }
        if self.contains(new_id) {
            return Err(PackError::TrackExists(new_id.to_string()));
        }
        let mut track = self
            .tracks
            .remove(id)
            .ok_or_else(|| PackError::UnknownTrack(id.to_string()))?;
        track.id = new_id.to_string();
        self.tracks.insert(new_id.to_string(), track);

        if let Some(slot) = self.order.iter_mut().find(|o| o.as_str() == id) {
            *slot = new_id.to_string();
        }
        if self.enabled.remove(id) {
            self.enabled.insert(new_id.to_string());
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tracks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track ids in stored order
    pub fn track_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Tracks in stored order
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.order.iter().filter_map(move |id| self.tracks.get(id))
    }

    // --- Enabled subset ---

    /// Enable a track. Returns true if it was previously disabled.
    pub fn enable(&mut self, id: &str) -> Result<bool, PackError> {
        if !self.tracks.contains_key(id) {
            return Err(PackError::UnknownTrack(id.to_string()));
        }
        Ok(self.enabled.insert(id.to_string()))
    }

    /// Disable a track. Returns true if it was previously enabled.
    pub fn disable(&mut self, id: &str) -> bool {
        self.enabled.remove(id)
    }

    /// Flip a track's enabled state, returning the new state
    pub fn toggle(&mut self, id: &str) -> Result<bool, PackError> {
        if self.disable(id) {
            Ok(false)
        } else {
            self.enable(id)
        }
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.enabled.contains(id)
    }

    pub fn enable_all(&mut self) {
        self.enabled.extend(self.order.iter().cloned());
    }

    pub fn disable_all(&mut self) {
        self.enabled.clear();
    }

    /// Enable every track carrying `tag`, returning how many changed
    pub fn enable_tagged(&mut self, tag: &str) -> usize {
        let ids: Vec<String> = self
            .tracks()
            .filter(|t| t.has_tag(tag))
            .map(|t| t.id.clone())
            .collect();
        ids.into_iter().filter(|id| self.enabled.insert(id.clone())).count()
    }

    /// Disable every track carrying `tag`, returning how many changed
    pub fn disable_tagged(&mut self, tag: &str) -> usize {
        let ids: Vec<String> = self
            .tracks()
            .filter(|t| t.has_tag(tag))
            .map(|t| t.id.clone())
            .collect();
        ids.iter().filter(|id| self.enabled.remove(id.as_str())).count()
    }

    /// Enabled tracks in stored order
    pub fn enabled(&self) -> impl Iterator<Item = &Track> {
        self.tracks().filter(move |t| self.enabled.contains(&t.id))
    }

    /// Disabled tracks in stored order
    pub fn disabled(&self) -> impl Iterator<Item = &Track> {
        self.tracks().filter(move |t| !self.enabled.contains(&t.id))
    }

    /// For every enabled track, its trail of points strictly before `frame`
    pub fn under(
        &self,
        frame: Frame,
    ) -> impl Iterator<Item = (&Track, impl Iterator<Item = (Frame, Point)> + Clone + '_)> {
        self.enabled().map(move |t| (t, t.points_before(frame)))
    }

    // --- Tags ---

    /// Every tag used by any track
    pub fn all_tags(&self) -> BTreeSet<String> {
        self.tracks
            .values()
            .flat_map(|t| t.tags().map(str::to_string))
            .collect()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tracks.values().any(|t| t.has_tag(tag))
    }

    // --- Id allocation ---

    /// An id not used by any track in this pack
    pub fn new_id(&self) -> String {
        self.sample_free_id(&mut rand::thread_rng(), DEFAULT_ID_OVERSAMPLE)
    }

    /// Like [`Self::new_id`], with an explicit rng and oversampling factor.
    ///
    /// Candidates are drawn uniformly from `[0, ceil(len * oversample))`, so
    /// the expected number of draws is `1 / (1 - 1/oversample)`.
    pub fn new_id_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        oversample: f64,
    ) -> Result<String, PackError> {
        if !oversample.is_finite() || oversample <= 1.0 {
            return Err(PackError::InvalidOversample(oversample));
        }
        Ok(self.sample_free_id(rng, oversample))
    }

    fn sample_free_id<R: Rng + ?Sized>(&self, rng: &mut R, oversample: f64) -> String {
        // ceil(n * k) > n for k > 1, so at least one candidate is free
        let upper = ((self.tracks.len() as f64) * oversample).ceil().max(1.0) as u64;
        loop {
            let candidate = rng.gen_range(0..upper).to_string();
            if !self.tracks.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    // --- Serialization ---

    pub fn to_json(&self) -> Result<String, PackError> {
        let doc = PackDocumentRef {
            format_version: FORMAT_VERSION,
            video_reference: self.video_reference.as_deref(),
            tracks: self.tracks().collect(),
        };
        serde_json::to_string_pretty(&doc).map_err(|source| PackError::Encode {
            name: self.name.clone(),
            source,
        })
    }

    /// Decode a pack document. Nothing is returned unless every track decodes.
    pub fn from_json(name: impl Into<String>, contents: &str) -> Result<Self, PackError> {
        let name = name.into();
        let doc: PackDocument =
            serde_json::from_str(contents).map_err(|source| PackError::Decode {
                name: name.clone(),
                source,
            })?;

        if doc.format_version != FORMAT_VERSION {
            return Err(PackError::UnsupportedVersion {
                name,
                version: doc.format_version,
            });
        }

        let mut pack = TrackPack::new(name);
        pack.video_reference = doc.video_reference;
        for track in doc.tracks {
            if pack.contains(&track.id) {
                return Err(PackError::DuplicateTrack {
                    name: pack.name,
                    id: track.id,
                });
            }
            pack.add_track(track);
        }
        Ok(pack)
    }

    /// Read a pack file, naming the pack after its path
    pub fn read(path: &Path) -> Result<Self, PackError> {
        let contents = fs::read_to_string(path).map_err(|source| PackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let pack = Self::from_json(path.display().to_string(), &contents)?;
        tracing::debug!(path = %path.display(), tracks = pack.len(), "Loaded track pack");
        Ok(pack)
    }

    /// Read a pack file, or start an empty pack if the file doesn't exist yet
    pub fn read_or_new(path: &Path) -> Result<Self, PackError> {
        if path.exists() {
            Self::read(path)
        } else {
            tracing::info!(path = %path.display(), "Track pack not found, starting empty");
            Ok(Self::new(path.display().to_string()))
        }
    }

    /// Write the pack atomically: readers see either the old file or the new one
    pub fn write(&self, path: &Path) -> Result<(), PackError> {
        let contents = self.to_json()?;
        write_atomic(path, contents.as_bytes())?;
        tracing::debug!(path = %path.display(), tracks = self.len(), "Saved track pack");
        Ok(())
    }
}

/// Write to a temporary file next to `path`, then rename it into place
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PackError> {
    let io_err = |source| PackError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(contents).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Persisted Document
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Deserialize)]
struct PackDocument {
    #[serde(default = "default_format_version")]
    format_version: String,
    #[serde(default)]
    video_reference: Option<String>,
    tracks: Vec<Track>,
}

#[derive(Serialize)]
struct PackDocumentRef<'a> {
    format_version: &'a str,
    video_reference: Option<&'a str>,
    tracks: Vec<&'a Track>,
}

fn default_format_version() -> String {
    FORMAT_VERSION.to_string()
}
