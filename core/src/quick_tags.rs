//! Single-keystroke mnemonics for tags.
//!
//! Every tag gets the first of its (lowercased) alphanumeric characters that
//! no earlier tag has claimed. Tags whose characters are all taken spill into
//! a submenu behind the "more" key, which is resolved the same way.
//!
//! ```text
//! ["hi", "i", "howdy", "hii"]
//!
//!   h → hi
//!   i → i
//!   o → howdy
//!   . → <more>
//!         h → hii
//!   esc → <cancel>
//! ```

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

pub const MORE_LABEL: &str = "<more>";
pub const CANCEL_LABEL: &str = "<cancel>";

/// Key code of the default "more" key (`.`)
pub const DEFAULT_MORE_CODE: u32 = '.' as u32;
/// Key code of the default cancel key (escape)
pub const DEFAULT_CANCEL_CODE: u32 = 27;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuickTagError {
    #[error("can't assign a quick key to tag {0:?}: it has no alphanumeric characters")]
    NoAlphanumeric(String),

    /// An overflow level failed to place any tag, so recursing would never end
    #[error("quick tag overflow did not shrink ({remaining} tags could not be placed)")]
    OverflowStalled { remaining: usize },

    /// The "more" and cancel keys share a key code
    #[error("the more key and the cancel key both use key code {code}")]
    ReservedKeyClash { code: u32 },
}

/// A key reserved for menu navigation, never handed out as a mnemonic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedKey {
    pub name: String,
    pub code: u32,
}

impl ReservedKey {
    pub fn new(name: impl Into<String>, code: u32) -> Self {
        Self {
            name: name.into(),
            code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickTagOptions {
    /// Opens the overflow submenu
    pub more_key: ReservedKey,
    /// Cancels tag entry. `None` leaves cancel handling to the caller.
    pub cancel_key: Option<ReservedKey>,
}

impl Default for QuickTagOptions {
    fn default() -> Self {
        Self {
            more_key: ReservedKey::new(".", DEFAULT_MORE_CODE),
            cancel_key: Some(ReservedKey::new("esc", DEFAULT_CANCEL_CODE)),
        }
    }
}

impl QuickTagOptions {
    /// Default keys, without a cancel entry
    pub fn without_cancel() -> Self {
        Self {
            cancel_key: None,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), QuickTagError> {
        match &self.cancel_key {
            Some(cancel) if cancel.code == self.more_key.code => {
                Err(QuickTagError::ReservedKeyClash { code: cancel.code })
            }
            _ => Ok(()),
        }
    }

    fn is_reserved(&self, code: u32) -> bool {
        code == self.more_key.code || self.cancel_key.as_ref().is_some_and(|k| k.code == code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickTagTarget {
    Tag(String),
    Cancel,
    Menu(QuickTagTree),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickTagEntry {
    /// Printable name of the key, e.g. `h` or `esc`
    pub key_name: String,
    /// What the menu shows next to the key
    pub label: String,
    pub target: QuickTagTarget,
}

/// Result of pressing a key while a quick tag menu is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickTagLookup<'a> {
    Tag(&'a str),
    Cancel,
    Menu(&'a QuickTagTree),
    Unbound,
}

/// One menu level, keyed by key code
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickTagTree {
    entries: BTreeMap<u32, QuickTagEntry>,
}

impl QuickTagTree {
    pub fn get(&self, code: u32) -> Option<&QuickTagEntry> {
        self.entries.get(&code)
    }

    /// Resolve a keypress at this level
    pub fn lookup(&self, code: u32) -> QuickTagLookup<'_> {
        match self.entries.get(&code).map(|e| &e.target) {
            Some(QuickTagTarget::Tag(tag)) => QuickTagLookup::Tag(tag),
            Some(QuickTagTarget::Cancel) => QuickTagLookup::Cancel,
            Some(QuickTagTarget::Menu(menu)) => QuickTagLookup::Menu(menu),
            None => QuickTagLookup::Unbound,
        }
    }

    /// Entries in key code order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &QuickTagEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(
        &mut self,
        code: u32,
        key_name: impl Into<String>,
        label: impl Into<String>,
        target: QuickTagTarget,
    ) {
        let previous = self.entries.insert(
            code,
            QuickTagEntry {
                key_name: key_name.into(),
                label: label.into(),
                target,
            },
        );
        debug_assert!(previous.is_none(), "key code {code} assigned twice");
    }
}

/// Assign a mnemonic key to every non-blank tag.
///
/// Returns the top-level menu and the number of tags placed across all
/// levels. The same tag given twice is placed twice (once per level), and
/// collapses to one entry in [`tag_names`].
pub fn resolve_quick_tags<I, S>(
    tags: I,
    options: &QuickTagOptions,
) -> Result<(QuickTagTree, usize), QuickTagError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    options.check()?;
    let tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    resolve_level(&tags, options)
}

fn resolve_level(
    tags: &[String],
    options: &QuickTagOptions,
) -> Result<(QuickTagTree, usize), QuickTagError> {
    let mut tree = QuickTagTree::default();
    let mut placed = 0;
    let mut overflow = Vec::new();

    for tag in tags {
        let mut has_alnum = false;
        let mut chosen = None;
        for c in tag.to_lowercase().chars().filter(|c| c.is_alphanumeric()) {
            has_alnum = true;
            let code = c as u32;
            if !options.is_reserved(code) && tree.get(code).is_none() {
                chosen = Some((c, code));
                break;
            }
        }

        match chosen {
            Some((c, code)) => {
                tree.insert(code, c.to_string(), tag.as_str(), QuickTagTarget::Tag(tag.clone()));
                placed += 1;
            }
            None if has_alnum => overflow.push(tag.clone()),
            None => return Err(QuickTagError::NoAlphanumeric(tag.clone())),
        }
    }

    if !overflow.is_empty() {
        // The first tag of a level can only overflow if all of its characters
        // are reserved keys; anything else strictly shrinks the next level.
        if overflow.len() >= tags.len() {
            return Err(QuickTagError::OverflowStalled {
                remaining: overflow.len(),
            });
        }
        let (submenu, sub_placed) = resolve_level(&overflow, options)?;
        tree.insert(
            options.more_key.code,
            options.more_key.name.as_str(),
            MORE_LABEL,
            QuickTagTarget::Menu(submenu),
        );
        placed += sub_placed;
    }

    if let Some(cancel) = &options.cancel_key {
        tree.insert(cancel.code, cancel.name.as_str(), CANCEL_LABEL, QuickTagTarget::Cancel);
    }

    Ok((tree, placed))
}

/// Every tag reachable from `tree`, including nested menus
pub fn tag_names(tree: &QuickTagTree) -> BTreeSet<String> {
    let mut ret = BTreeSet::new();
    collect_tag_names(tree, &mut ret);
    ret
}

fn collect_tag_names(tree: &QuickTagTree, out: &mut BTreeSet<String>) {
    for entry in tree.entries.values() {
        match &entry.target {
            QuickTagTarget::Tag(tag) => {
                out.insert(tag.clone());
            }
            QuickTagTarget::Menu(menu) => collect_tag_names(menu, out),
            QuickTagTarget::Cancel => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(c: char) -> u32 {
        c as u32
    }

    fn set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.trim().to_string()).collect()
    }

    #[test]
    fn test_distinct_first_letters() {
        let (tree, n) =
            resolve_quick_tags(["Vehicle", "Person", "2-Wheel-Vehicle"], &QuickTagOptions::default())
                .unwrap();
        assert_eq!(n, 3);
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.lookup(code('v')), QuickTagLookup::Tag("Vehicle"));
        assert_eq!(tree.lookup(code('p')), QuickTagLookup::Tag("Person"));
        assert_eq!(tree.lookup(code('2')), QuickTagLookup::Tag("2-Wheel-Vehicle"));
        assert_eq!(tree.lookup(DEFAULT_CANCEL_CODE), QuickTagLookup::Cancel);
        let cancel = tree.get(DEFAULT_CANCEL_CODE).unwrap();
        assert_eq!(cancel.key_name, "esc");
        assert_eq!(cancel.label, CANCEL_LABEL);
    }

    #[test]
    fn test_collisions_cascade_to_submenu() {
        let (tree, n) =
            resolve_quick_tags(["hi", "i", "howdy", "hii"], &QuickTagOptions::without_cancel())
                .unwrap();
        assert_eq!(n, 4);
        assert_eq!(tree.lookup(code('h')), QuickTagLookup::Tag("hi"));
        assert_eq!(tree.lookup(code('i')), QuickTagLookup::Tag("i"));
        assert_eq!(tree.lookup(code('o')), QuickTagLookup::Tag("howdy"));
        assert_eq!(tree.lookup(DEFAULT_CANCEL_CODE), QuickTagLookup::Unbound);

        let QuickTagLookup::Menu(more) = tree.lookup(DEFAULT_MORE_CODE) else {
            panic!("expected overflow menu");
        };
        assert_eq!(tree.get(DEFAULT_MORE_CODE).unwrap().label, MORE_LABEL);
        assert_eq!(more.len(), 1);
        assert_eq!(more.lookup(code('h')), QuickTagLookup::Tag("hii"));
    }

    #[test]
    fn test_submenus_carry_cancel_key() {
        let (tree, _) = resolve_quick_tags(["a", "a"], &QuickTagOptions::default()).unwrap();
        let QuickTagLookup::Menu(more) = tree.lookup(DEFAULT_MORE_CODE) else {
            panic!("expected overflow menu");
        };
        assert_eq!(more.lookup(DEFAULT_CANCEL_CODE), QuickTagLookup::Cancel);
    }

    #[test]
    fn test_blank_tags_skipped_and_labels_trimmed() {
        let (tree, n) =
            resolve_quick_tags(["  ", "", " Car "], &QuickTagOptions::without_cancel()).unwrap();
        assert_eq!(n, 1);
        assert_eq!(tree.lookup(code('c')), QuickTagLookup::Tag("Car"));
    }

    #[test]
    fn test_non_alphanumeric_skipped_when_scanning() {
        let (tree, _) =
            resolve_quick_tags(["--x", "x-y"], &QuickTagOptions::without_cancel()).unwrap();
        assert_eq!(tree.lookup(code('x')), QuickTagLookup::Tag("--x"));
        assert_eq!(tree.lookup(code('y')), QuickTagLookup::Tag("x-y"));
    }

    #[test]
    fn test_tag_without_alnum_is_error() {
        let err = resolve_quick_tags(["ok", "!!!"], &QuickTagOptions::default()).unwrap_err();
        assert_eq!(err, QuickTagError::NoAlphanumeric("!!!".into()));
    }

    #[test]
    fn test_colliding_tags_overflow_instead_of_sharing_a_key() {
        let tags = ["car", "cat", "cart", "art", "tar", "rat", "a"];
        let (tree, n) = resolve_quick_tags(tags, &QuickTagOptions::default()).unwrap();
        assert_eq!(n, tags.len());
        assert_eq!(tag_names(&tree), set(&tags));

        let top: BTreeSet<String> = tree
            .iter()
            .filter_map(|(_, entry)| match &entry.target {
                QuickTagTarget::Tag(tag) => Some(tag.clone()),
                _ => None,
            })
            .collect();
        // c, a, r, t are claimed by the first four tags; the rest overflow
        assert_eq!(top, set(&["car", "cat", "cart", "art"]));
        let QuickTagLookup::Menu(more) = tree.lookup(DEFAULT_MORE_CODE) else {
            panic!("expected overflow menu");
        };
        assert_eq!(tag_names(more), set(&["tar", "rat", "a"]));
    }

    #[test]
    fn test_more_and_cancel_on_same_key_rejected() {
        let options = QuickTagOptions {
            more_key: ReservedKey::new("esc", DEFAULT_CANCEL_CODE),
            ..QuickTagOptions::default()
        };
        let err = resolve_quick_tags(["a", "a2", "aa"], &options).unwrap_err();
        assert_eq!(
            err,
            QuickTagError::ReservedKeyClash {
                code: DEFAULT_CANCEL_CODE
            }
        );
    }

    #[test]
    fn test_round_trip_tag_names() {
        let inputs: Vec<Vec<&str>> = vec![
            vec![],
            vec!["a"],
            vec!["Vehicle", "Person", "2-Wheel-Vehicle"],
            vec!["hi", "i", "howdy", "hii"],
            vec!["car", "car", "Car"],
            vec!["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta"],
        ];
        for tags in inputs {
            let (tree, _) = resolve_quick_tags(&tags, &QuickTagOptions::default()).unwrap();
            assert_eq!(tag_names(&tree), set(&tags), "round trip failed for {tags:?}");
        }
    }

    #[test]
    fn test_pathological_shared_characters_terminate() {
        // Every tag uses exactly the same characters, so each level can place
        // only as many tags as there are distinct characters.
        let tags: Vec<String> = (0..30)
            .map(|i| if i % 2 == 0 { "ab".to_string() } else { "ba".to_string() })
            .collect();
        let (tree, n) = resolve_quick_tags(&tags, &QuickTagOptions::default()).unwrap();
        assert_eq!(n, 30);
        assert_eq!(tag_names(&tree), set(&["ab", "ba"]));

        let mut depth = 0;
        let mut level = &tree;
        while let QuickTagLookup::Menu(next) = level.lookup(DEFAULT_MORE_CODE) {
            depth += 1;
            level = next;
        }
        assert_eq!(depth, 14);
    }

    #[test]
    fn test_single_char_repeated() {
        let tags = vec!["z"; 50];
        let (tree, n) = resolve_quick_tags(&tags, &QuickTagOptions::without_cancel()).unwrap();
        assert_eq!(n, 50);
        assert_eq!(tag_names(&tree), set(&["z"]));
    }

    #[test]
    fn test_reserved_alnum_key_never_assigned() {
        let options = QuickTagOptions {
            more_key: ReservedKey::new("m", code('m')),
            cancel_key: None,
        };
        let (tree, _) = resolve_quick_tags(["moose", "mouse"], &options).unwrap();
        assert_eq!(tree.lookup(code('o')), QuickTagLookup::Tag("moose"));
        assert_eq!(tree.lookup(code('u')), QuickTagLookup::Tag("mouse"));

        // A tag made only of reserved characters can never be placed
        let err = resolve_quick_tags(["mm"], &options).unwrap_err();
        assert_eq!(err, QuickTagError::OverflowStalled { remaining: 1 });
    }
}
