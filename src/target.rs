//! Resolution of `Navigate` targets to loadable URLs.

use std::path::Path;
use url::Url;

const URL_SCHEMES: [&str; 5] = ["http://", "https://", "file://", "data:", "about:"];

/// Resolve a navigation target.
///
/// URLs are validated and used as-is; `file://` URLs must name an existing
/// file. Anything else is a file relative to `site_root`, optionally
/// followed by a `?query` or `#fragment`. The file must exist; it becomes a
/// `file://` URL carrying the same query and fragment.
pub fn resolve_target(target: &str, site_root: &Path) -> Result<Url, String> {
    let target = target.trim();
    if target.is_empty() {
        return Err("empty navigation target".to_string());
    }

    let lowered = target.to_lowercase();
    if URL_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        let url = Url::parse(target).map_err(|e| format!("invalid URL '{}': {}", target, e))?;
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| format!("invalid file URL '{}'", target))?;
            if !path.is_file() {
                return Err(format!("File not found: {}", path.display()));
            }
        }
        return Ok(url);
    }

    let (rest, fragment) = match target.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (target, None),
    };
    let (file, query) = match rest.split_once('?') {
        Some((file, query)) => (file, Some(query)),
        None => (rest, None),
    };

    let path = site_root.join(file);
    if !path.is_file() {
        return Err(format!("File not found: {}", path.display()));
    }
    let absolute = path
        .canonicalize()
        .map_err(|e| format!("cannot resolve {}: {}", path.display(), e))?;
    let mut url = Url::from_file_path(&absolute)
        .map_err(|_| format!("cannot express {} as a file URL", absolute.display()))?;
    url.set_query(query);
    url.set_fragment(fragment);
    Ok(url)
}
