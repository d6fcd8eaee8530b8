//! Loading rules from TOML rule files
//!
//! Rule files hold any number of `[[rule]]` tables. Rules are returned in
//! file order, and files in a directory are read sorted by file name, so
//! the evaluation order is stable across platforms.

use std::fs;
use std::path::{Path, PathBuf};

use hashbrown::HashSet;

use super::definitions::RuleConfig;
use super::{Rule, RuleError};

/// Parse a single rule file without building its rules
pub fn load_rule_config(path: &Path) -> Result<RuleConfig, RuleError> {
    let contents = fs::read_to_string(path).map_err(|e| RuleError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| RuleError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Load and build the enabled rules of one file
pub fn load_rule_file(path: &Path) -> Result<Vec<Rule>, RuleError> {
    let config = load_rule_config(path)?;
    if config.rules.is_empty() {
        tracing::warn!(path = %path.display(), "Rule file defines no rules");
        return Ok(Vec::new());
    }

    let rules = config
        .rules
        .iter()
        .filter(|def| def.enabled)
        .map(|def| def.build())
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        path = %path.display(),
        loaded = rules.len(),
        disabled = config.rules.len() - rules.len(),
        "Loaded rule file"
    );
    Ok(rules)
}

/// Load rule files in the given order. Duplicate rule names are kept but
/// reported, since only the first of them can be told apart in logs.
pub fn load_rule_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Rule>, RuleError> {
    let mut rules = Vec::new();
    let mut seen = HashSet::new();

    for path in paths {
        let path = path.as_ref();
        for rule in load_rule_file(path)? {
            if !seen.insert(rule.name().to_string()) {
                tracing::warn!(
                    rule = rule.name(),
                    path = %path.display(),
                    "Duplicate rule name"
                );
            }
            rules.push(rule);
        }
    }

    Ok(rules)
}

/// Load every `*.toml` file of a directory, sorted by file name
pub fn load_rule_directory(dir: &Path) -> Result<Vec<Rule>, RuleError> {
    let entries = fs::read_dir(dir).map_err(|e| RuleError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    tracing::debug!(dir = %dir.display(), files = paths.len(), "Loading rule directory");
    load_rule_files(&paths)
}

/// Default user rule directory
pub fn default_rule_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("strider").join("rules"))
}
