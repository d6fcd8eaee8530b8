//! Common triggers and actions, shared by code rules and TOML definitions

use std::path::Path;

use regex::Regex;
use strider_types::Rgb;

use super::{Action, RuleError, Trigger};

// ═══════════════════════════════════════════════════════════════════════════
// Triggers
// ═══════════════════════════════════════════════════════════════════════════

/// Trimmed, lowercased tags with blanks dropped
fn clean_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn anchored(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| RuleError::construction(pattern, format!("invalid regex: {e}")))
}

/// Fires when the whole source pack name, its file name, or its file stem
/// matches `pattern`
pub fn source_matches(pattern: &str) -> Result<Trigger, RuleError> {
    let re = anchored(pattern)?;
    Ok(Trigger::from_fn(move |_, ctx| {
        let name = ctx.source.name.as_str();
        let path = Path::new(name);
        let file_name = path.file_name().and_then(|s| s.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str());
        Ok(std::iter::once(Some(name))
            .chain([file_name, stem])
            .flatten()
            .any(|candidate| re.is_match(candidate)))
    }))
}

/// Fires when the whole track id matches `pattern`
pub fn id_matches(pattern: &str) -> Result<Trigger, RuleError> {
    let re = anchored(pattern)?;
    Ok(Trigger::from_track_fn(move |track| re.is_match(&track.id)))
}

pub fn has_tag(tag: &str) -> Trigger {
    let tag = tag.trim().to_lowercase();
    Trigger::from_track_fn(move |track| track.has_tag(&tag))
}

pub fn has_any_tag<I, S>(tags: I) -> Trigger
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tags = clean_tags(tags);
    Trigger::from_track_fn(move |track| tags.iter().any(|t| track.has_tag(t)))
}

/// Fires for tracks with at least `n` points
pub fn min_points(n: usize) -> Trigger {
    Trigger::from_track_fn(move |track| track.len() >= n)
}

// ═══════════════════════════════════════════════════════════════════════════
// Actions
// ═══════════════════════════════════════════════════════════════════════════

pub fn add_tags<I, S>(tags: I) -> Action
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tags = clean_tags(tags);
    Action::mutate(move |track, _| {
        for tag in &tags {
            track.add_tag(tag);
        }
        Ok(())
    })
}

pub fn remove_tags<I, S>(tags: I) -> Action
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tags = clean_tags(tags);
    Action::mutate(move |track, _| {
        for tag in &tags {
            track.remove_tag(tag);
        }
        Ok(())
    })
}

/// Wraps the track id as `prefix + id + postfix`
pub fn change_id(prefix: impl Into<String>, postfix: impl Into<String>) -> Action {
    let (prefix, postfix) = (prefix.into(), postfix.into());
    Action::mutate(move |track, _| {
        track.id = format!("{prefix}{}{postfix}", track.id);
        Ok(())
    })
}

pub fn set_color(color: Rgb) -> Action {
    Action::mutate(move |track, _| {
        track.color = color;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::TrackPack;
    use crate::rules::RuleContext;
    use crate::rules::test_support::tagged;
    use crate::track::Track;
    use strider_types::Point;

    fn fires(trigger: &Trigger, source: &str, track: &Track) -> bool {
        let src = TrackPack::new(source);
        let dst = TrackPack::new("out.json");
        let ctx = RuleContext {
            source: &src,
            destination: &dst,
        };
        trigger.matches(track, &ctx).unwrap()
    }

    fn transform(action: &Action, track: Track) -> Track {
        let (src, dst) = (TrackPack::new("in.json"), TrackPack::new("out.json"));
        let ctx = RuleContext {
            source: &src,
            destination: &dst,
        };
        action.apply(track, &ctx).unwrap().track().cloned().unwrap()
    }

    #[test]
    fn test_source_matches_name_basename_and_stem() {
        let t = tagged("1", &[]);
        let path = "videos/cam_1.json";
        assert!(fires(&source_matches("cam_1").unwrap(), path, &t));
        assert!(fires(&source_matches(r"cam_\d\.json").unwrap(), path, &t));
        assert!(fires(&source_matches("videos/.*").unwrap(), path, &t));
        // Full match only
        assert!(!fires(&source_matches("cam").unwrap(), path, &t));
        assert!(!fires(&source_matches("cam_1|cam_2").unwrap(), "cam_3.json", &t));
    }

    #[test]
    fn test_bad_regex_is_construction_error() {
        assert!(matches!(
            source_matches("("),
            Err(RuleError::Construction { .. })
        ));
        assert!(id_matches("[").is_err());
    }

    #[test]
    fn test_id_matches() {
        let trigger = id_matches(r"\d+").unwrap();
        assert!(fires(&trigger, "a.json", &tagged("42", &[])));
        assert!(!fires(&trigger, "a.json", &tagged("t42", &[])));
    }

    #[test]
    fn test_tag_triggers() {
        let t = tagged("1", &["car", "red"]);
        assert!(fires(&has_tag("CAR"), "a", &t));
        assert!(!fires(&has_tag("bus"), "a", &t));
        assert!(fires(&has_any_tag(["bus", "red"]), "a", &t));
        assert!(!fires(&has_any_tag(Vec::<String>::new()), "a", &t));
    }

    #[test]
    fn test_min_points() {
        let mut t = tagged("1", &[]);
        t.add(0, Point::new(0.0, 0.0)).unwrap();
        t.add(1, Point::new(1.0, 0.0)).unwrap();
        assert!(fires(&min_points(2), "a", &t));
        assert!(!fires(&min_points(3), "a", &t));
    }

    #[test]
    fn test_tag_actions() {
        let t = transform(&add_tags(["Cam1", "new"]), tagged("1", &["old"]));
        assert_eq!(t.tags().collect::<Vec<_>>(), ["cam1", "new", "old"]);
        let t = transform(&remove_tags(["old", "missing"]), t);
        assert_eq!(t.tags().collect::<Vec<_>>(), ["cam1", "new"]);
    }

    #[test]
    fn test_tag_lists_are_trimmed_and_blanks_dropped() {
        let t = transform(&add_tags(["", "  ", "car ", " Bus"]), tagged("1", &[]));
        assert_eq!(t.tags().collect::<Vec<_>>(), ["bus", "car"]);
        let t = transform(&remove_tags([" car", ""]), t);
        assert_eq!(t.tags().collect::<Vec<_>>(), ["bus"]);
        assert!(fires(&has_any_tag([" bus "]), "a", &t));
        assert!(!fires(&has_any_tag(["", " "]), "a", &t));
    }

    #[test]
    fn test_change_id_and_color() {
        let t = transform(&change_id("cam1_", "_v2"), tagged("7", &[]));
        assert_eq!(t.id, "cam1_7_v2");
        let t = transform(&set_color([255, 0, 0]), t);
        assert_eq!(t.color, [255, 0, 0]);
    }
}
