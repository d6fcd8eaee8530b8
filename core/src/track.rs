//! A single object's trajectory across video frames.
//!
//! A [`Track`] owns at most one point per frame. Points are kept ordered by
//! frame so trail rendering and span queries never need to sort.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use strider_types::formatting::{
    format_count, format_distance_px, format_span, format_tag_list,
};
use strider_types::{Frame, Point, Rgb};
use thiserror::Error;

/// Errors raised by point and record operations on a track
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    /// A point already exists at the frame. The existing point is kept.
    #[error("track {track_id} already has a point at frame {frame}")]
    PointConflict { track_id: String, frame: Frame },

    /// A serialized record lists the same frame twice
    #[error("track {track_id} lists frame {frame} more than once")]
    DuplicateFrame { track_id: String, frame: Frame },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrackRecord", into = "TrackRecord")]
pub struct Track {
    pub id: String,
    pub color: Rgb,
    points: BTreeMap<Frame, Point>,
    tags: BTreeSet<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, color: Rgb) -> Self {
        Self {
            id: id.into(),
            color,
            points: BTreeMap::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Create an empty track with a uniformly random color
    pub fn with_random_color<R: Rng + ?Sized>(id: impl Into<String>, rng: &mut R) -> Self {
        Self::new(id, [rng.r#gen(), rng.r#gen(), rng.r#gen()])
    }

    // --- Points ---

    /// Add a point at `frame`.
    ///
    /// Fails with [`TrackError::PointConflict`] if the frame is occupied, even
    /// when the new point is identical. Callers that want to move a point
    /// must delete it first.
    pub fn add(&mut self, frame: Frame, point: Point) -> Result<(), TrackError> {
        use std::collections::btree_map::Entry;
        match self.points.entry(frame) {
            Entry::Vacant(slot) => {
                slot.insert(point);
                Ok(())
            }
            Entry::Occupied(_) => Err(TrackError::PointConflict {
                track_id: self.id.clone(),
                frame,
            }),
        }
    }

    /// Remove the last point at or before `frame`, returning it with its frame
    pub fn delete_nearest_at_or_before(&mut self, frame: Frame) -> Option<(Frame, Point)> {
        let key = *self.points.range(..=frame).next_back()?.0;
        self.points.remove_entry(&key)
    }

    /// Points strictly before `frame`, ascending.
    ///
    /// The iterator is `Clone`, so a renderer can walk the trail more than
    /// once without re-querying.
    pub fn points_before(
        &self,
        frame: Frame,
    ) -> impl DoubleEndedIterator<Item = (Frame, Point)> + Clone + '_ {
        self.points.range(..frame).map(|(f, p)| (*f, *p))
    }

    /// All points, ascending by frame
    pub fn points(&self) -> impl DoubleEndedIterator<Item = (Frame, Point)> + Clone + '_ {
        self.points.iter().map(|(f, p)| (*f, *p))
    }

    pub fn point_at(&self, frame: Frame) -> Option<Point> {
        self.points.get(&frame).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First and last frame, or `None` for an empty track
    pub fn span(&self) -> Option<(Frame, Frame)> {
        let (first, _) = self.points.first_key_value()?;
        let (last, _) = self.points.last_key_value()?;
        Some((*first, *last))
    }

    /// First and last point, or `None` for an empty track
    pub fn value_span(&self) -> Option<(Point, Point)> {
        let (_, first) = self.points.first_key_value()?;
        let (_, last) = self.points.last_key_value()?;
        Some((*first, *last))
    }

    /// Length of the polyline through all points in frame order, in pixels
    pub fn path_length(&self) -> f64 {
        self.points
            .values()
            .zip(self.points.values().skip(1))
            .map(|(a, b)| a.distance(b))
            .sum()
    }

    // --- Tags ---

    /// Tags are stored lowercase. Returns false if the tag was already present.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        self.tags.insert(tag.to_lowercase())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(&tag.to_lowercase())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag.to_lowercase())
    }

    /// Tags in sorted order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    // --- Reporting ---

    /// One-line human readable summary, as printed by listings and merge logs
    pub fn stats(&self) -> String {
        let mut ret = format!("{}: {}", self, format_count(self.len(), "point"));
        if let (Some((f0, f1)), Some((p0, p1))) = (self.span(), self.value_span()) {
            ret.push_str(", frame range: ");
            ret.push_str(&format_span(&f0, &f1));
            ret.push_str(", value range: ");
            ret.push_str(&format_span(&p0, &p1));
        }
        if !self.tags.is_empty() {
            ret.push_str(", tags: ");
            ret.push_str(&format_tag_list(&self.tags));
        }
        ret.push_str(", distance: ");
        ret.push_str(&format_distance_px(self.path_length()));
        ret
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Track({})", self.id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Persisted Record
// ═══════════════════════════════════════════════════════════════════════════

/// On-disk shape of a track.
///
/// Points are kept last so the files stay easy to edit by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub color: Rgb,
    #[serde(default)]
    pub tags: Vec<String>,
    pub points: Vec<(Frame, Point)>,
}

impl From<Track> for TrackRecord {
    fn from(track: Track) -> Self {
        Self {
            id: track.id,
            color: track.color,
            tags: track.tags.into_iter().collect(),
            points: track.points.into_iter().collect(),
        }
    }
}

impl TryFrom<TrackRecord> for Track {
    type Error = TrackError;

    fn try_from(record: TrackRecord) -> Result<Self, Self::Error> {
        let mut track = Track::new(record.id, record.color);
        for tag in &record.tags {
            track.add_tag(tag);
        }
        for (frame, point) in record.points {
            track.add(frame, point).map_err(|_| TrackError::DuplicateFrame {
                track_id: track.id.clone(),
                frame,
            })?;
        }
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with(points: &[(Frame, f64, f64)]) -> Track {
        let mut t = Track::new("t", [1, 2, 3]);
        for &(f, x, y) in points {
            t.add(f, Point::new(x, y)).unwrap();
        }
        t
    }

    #[test]
    fn test_add_rejects_occupied_frame() {
        let mut t = track_with(&[(5, 1.0, 1.0)]);
        let err = t.add(5, Point::new(9.0, 9.0)).unwrap_err();
        assert_eq!(
            err,
            TrackError::PointConflict {
                track_id: "t".into(),
                frame: 5
            }
        );
        // Identical point is still a conflict, and the original survives
        assert!(t.add(5, Point::new(1.0, 1.0)).is_err());
        assert_eq!(t.point_at(5), Some(Point::new(1.0, 1.0)));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_delete_nearest_at_or_before() {
        let mut t = track_with(&[(0, 0.0, 0.0), (10, 1.0, 1.0), (20, 2.0, 2.0)]);
        assert_eq!(t.delete_nearest_at_or_before(15), Some((10, Point::new(1.0, 1.0))));
        assert_eq!(t.delete_nearest_at_or_before(20), Some((20, Point::new(2.0, 2.0))));
        // Frame 0 is a real point, not "nothing"
        assert_eq!(t.delete_nearest_at_or_before(5), Some((0, Point::new(0.0, 0.0))));
        assert_eq!(t.delete_nearest_at_or_before(100), None);
    }

    #[test]
    fn test_delete_before_first_point_is_none() {
        let mut t = track_with(&[(10, 1.0, 1.0)]);
        assert_eq!(t.delete_nearest_at_or_before(9), None);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_points_before_is_exclusive_and_restartable() {
        let t = track_with(&[(3, 0.0, 0.0), (1, 1.0, 1.0), (7, 2.0, 2.0), (5, 3.0, 3.0)]);
        let trail = t.points_before(5);
        let frames: Vec<Frame> = trail.clone().map(|(f, _)| f).collect();
        assert_eq!(frames, vec![1, 3]);
        // Walk again from the same iterator value
        assert_eq!(trail.count(), 2);
        assert_eq!(t.points_before(1).count(), 0);
        assert_eq!(t.points_before(100).count(), 4);
    }

    #[test]
    fn test_spans() {
        let empty = Track::new("e", [0, 0, 0]);
        assert_eq!(empty.span(), None);
        assert_eq!(empty.value_span(), None);

        let t = track_with(&[(4, 1.0, 2.0), (2, 3.0, 4.0), (9, 5.0, 6.0)]);
        assert_eq!(t.span(), Some((2, 9)));
        assert_eq!(
            t.value_span(),
            Some((Point::new(3.0, 4.0), Point::new(5.0, 6.0)))
        );
    }

    #[test]
    fn test_path_length() {
        assert_eq!(Track::new("e", [0, 0, 0]).path_length(), 0.0);
        assert_eq!(track_with(&[(1, 5.0, 5.0)]).path_length(), 0.0);
        // Order is by frame, not insertion
        let t = track_with(&[(2, 3.0, 4.0), (1, 0.0, 0.0), (3, 3.0, 0.0)]);
        assert_eq!(t.path_length(), 9.0);
    }

    #[test]
    fn test_tags_are_lowercase() {
        let mut t = Track::new("t", [0, 0, 0]);
        assert!(t.add_tag("Car"));
        assert!(!t.add_tag("CAR"));
        assert!(t.has_tag("car"));
        assert_eq!(t.tags().collect::<Vec<_>>(), vec!["car"]);
        assert!(t.remove_tag("cAr"));
        assert!(!t.has_tag("car"));
    }

    #[test]
    fn test_record_shape() {
        let mut t = track_with(&[(2, 3.0, 4.5), (1, 0.0, 0.0)]);
        t.add_tag("zebra");
        t.add_tag("apple");
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "t",
                "color": [1, 2, 3],
                "tags": ["apple", "zebra"],
                "points": [[1, [0.0, 0.0]], [2, [3.0, 4.5]]],
            })
        );
    }

    #[test]
    fn test_record_decode_lowercases_and_rejects_duplicates() {
        let t: Track = serde_json::from_str(
            r#"{"id": "a", "color": [0, 0, 0], "tags": ["Car"], "points": [[3, [1, 1]], [1, [0, 0]]]}"#,
        )
        .unwrap();
        assert!(t.has_tag("car"));
        assert_eq!(t.span(), Some((1, 3)));

        let dup = serde_json::from_str::<Track>(
            r#"{"id": "a", "color": [0, 0, 0], "points": [[1, [1, 1]], [1, [0, 0]]]}"#,
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_stats_line() {
        let mut t = track_with(&[(1, 0.0, 0.0), (2, 3.0, 4.0)]);
        t.add_tag("car");
        assert_eq!(
            t.stats(),
            "Track(t): 2 points, frame range: (1, 2), value range: ((0, 0), (3, 4)), tags: [car], distance: 5px"
        );
        assert_eq!(
            Track::new("e", [0, 0, 0]).stats(),
            "Track(e): 0 points, distance: 0px"
        );
    }
}
