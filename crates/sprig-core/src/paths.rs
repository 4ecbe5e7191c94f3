use dirs::home_dir;
use std::path::PathBuf;

/// Returns the sprig home directory, or None if the user's home cannot be resolved.
pub fn try_sprig_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("SPRIG_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".sprig"))
}

/// Returns the canonical sprig home directory (`~/.sprig`).
///
/// # Panics
///
/// Panics if neither `SPRIG_HOME` is set nor the user's home directory can be
/// resolved.
pub fn sprig_home() -> PathBuf {
    try_sprig_home().expect("Could not determine home directory. Set SPRIG_HOME to override.")
}

/// Settings file: ~/.sprig/config.toml
pub fn config_path() -> PathBuf {
    sprig_home().join("config.toml")
}

/// Extract the filename from a URL.
pub fn filename_from_url(url: &str) -> &str {
    url.split(['?', '#'])
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
}
