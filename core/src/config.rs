//! Persisted user settings
//!
//! Settings live in the platform config directory under the `strider` app
//! name (for example `~/.config/strider/default-config.toml` on Linux).

use std::path::PathBuf;

use strider_types::MergeSettings;

use crate::rules::default_rule_dir;

const APP_NAME: &str = "strider";

/// Load settings, creating the file with defaults on first use
pub fn load_settings() -> Result<MergeSettings, confy::ConfyError> {
    let settings: MergeSettings = confy::load(APP_NAME, None)?;
    tracing::debug!(policy = %settings.conflict_policy, "Loaded settings");
    Ok(settings)
}

/// Like [`load_settings`], but falls back to defaults when the file is
/// unreadable
pub fn load_settings_or_default() -> MergeSettings {
    load_settings().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load settings, using defaults");
        MergeSettings::default()
    })
}

pub fn store_settings(settings: &MergeSettings) -> Result<(), confy::ConfyError> {
    confy::store(APP_NAME, None, settings)
}

pub fn settings_path() -> Result<PathBuf, confy::ConfyError> {
    confy::get_configuration_file_path(APP_NAME, None)
}

/// Rule directories to scan: the configured ones, or the default user rule
/// directory when it exists and nothing is configured
pub fn rule_directories(settings: &MergeSettings) -> Vec<PathBuf> {
    if !settings.rule_directories.is_empty() {
        return settings.rule_directories.clone();
    }
    default_rule_dir()
        .filter(|dir| dir.is_dir())
        .into_iter()
        .collect()
}
