//! Mirror URL assembly.
//!
//! A mirror is an alternate base location holding the same artifacts as
//! upstream, laid out as `<base>/<name>/<name>-<version>.<ext>`.

use crate::config::ConfigSource;

/// Configuration section kind holding mirror definitions.
pub const MIRROR_SECTION: &str = "mirror";

/// Base URLs of all configured mirrors, in configuration order.
///
/// Sections without a `url` are skipped. Trailing slashes are trimmed so
/// joining never doubles them.
pub fn mirror_bases(config: &dyn ConfigSource) -> Vec<String> {
    config
        .section_names(MIRROR_SECTION)
        .into_iter()
        .filter_map(|name| {
            let url = config.value(MIRROR_SECTION, &name, "url");
            if url.is_none() {
                tracing::warn!(mirror = %name, "mirror has no url; skipping");
            }
            url
        })
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

/// Candidate URLs for `mirror_path` under each base, in order.
pub fn mirror_urls<S: AsRef<str>>(bases: &[S], mirror_path: &str) -> Vec<String> {
    let path = mirror_path.trim_start_matches('/');
    bases
        .iter()
        .map(|base| format!("{}/{path}", base.as_ref().trim_end_matches('/')))
        .collect()
}
