//! URL canonicalization, stable-id hashing, and filename sanitization.
//!
//! Small, synchronous, pure helpers — kept separate from [`crate::frontier`]
//! so the invariants they encode (canonical form, id derivation) can be unit
//! tested in isolation from the Frontier's locking.

use url::Url;
use xxhash_rust::xxh3::xxh3_64;

/// User-agent string sent by the launched browser; kept in sync with a
/// recent stable Chrome release so navigation looks like a normal browser
/// rather than the chromiumoxide default.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// Normalize a URL for equivalence comparisons: lowercase the scheme, strip
/// any fragment, and upgrade a missing scheme to `https`. Returns the
/// normalized absolute URL string, or `None` if the input cannot be parsed
/// even after the `https://` upgrade attempt.
#[must_use]
pub fn canonicalize_url(raw: &str) -> Option<String> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let mut parsed = Url::parse(&with_scheme).ok()?;
    parsed.set_fragment(None);

    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != parsed.scheme() {
        parsed.set_scheme(&scheme).ok()?;
    }

    Some(parsed.to_string())
}

/// Strip the query string from a URL, used to key the slow/failed-request
/// tallies `RequestMonitor` compiles block patterns from.
#[must_use]
pub fn strip_query(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => raw.to_string(),
    }
}

/// Derive a stable, locally-unique identifier from a canonical URL string.
///
/// Deterministic across runs (same URL -> same id), which is what lets
/// output PDF paths avoid collisions without a shared counter.
#[must_use]
pub fn stable_id(canonical_url: &str) -> String {
    format!("{:016x}", xxh3_64(canonical_url.as_bytes()))
}

/// Replace characters in `[<>:"/\|?*]` with `_`, so a URL can be embedded
/// directly in a filesystem path segment.
#[must_use]
pub fn sanitize_url_segment(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Extract the registrable host for a URL, falling back to the full input
/// when it fails to parse.
#[must_use]
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Compute the URL-path "directory depth" of `url` relative to `base_dir`,
/// used by `LinksFinder`'s max-depth bound. Returns `None` when `url` is not
/// nested under `base_dir` at all.
#[must_use]
pub fn depth_relative_to(url: &Url, base_dir: &Url) -> Option<usize> {
    if url.scheme() != base_dir.scheme() || url.host_str() != base_dir.host_str() {
        return None;
    }

    let base_segments: Vec<&str> = base_dir
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    let url_segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if url_segments.len() < base_segments.len()
        || url_segments[..base_segments.len()] != base_segments[..]
    {
        return None;
    }

    Some(url_segments.len() - base_segments.len())
}

/// Directory URL containing `url`'s path (used to auto-derive `LinksFinder`
/// inclusion patterns from entry URLs when none are configured).
///
/// A URL that already names a directory (trailing `/`, e.g.
/// `https://site/a/`) is its own directory — popping one more segment would
/// climb a level too high. Only a file-style path (`https://site/a/b`) drops
/// its last segment.
#[must_use]
pub fn parent_dir(url: &Url) -> Url {
    let mut dir = url.clone();
    dir.set_query(None);
    dir.set_fragment(None);
    let already_dir = dir.path().ends_with('/');
    if !already_dir && let Ok(mut segments) = dir.path_segments_mut().map_err(|_| ()) {
        segments.pop_if_empty().pop();
    }
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_lowercases_scheme_and_strips_fragment() {
        let got = canonicalize_url("HTTPS://Example.org/path#frag")
            .expect("valid url should canonicalize");
        assert_eq!(got, "https://example.org/path");
    }

    #[test]
    fn canonicalize_upgrades_missing_scheme_to_https() {
        let got = canonicalize_url("example.org/a").expect("should parse with upgrade");
        assert_eq!(got, "https://example.org/a");
    }

    #[test]
    fn stable_id_is_deterministic() {
        let a = stable_id("https://example.org/");
        let b = stable_id("https://example.org/");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_url_segment("https://a/b?c=1"), "https___a_b_c=1");
    }

    #[test]
    fn depth_relative_to_counts_extra_segments() {
        let base = Url::parse("https://site/a/").expect("base parses");
        let deep = Url::parse("https://site/a/b/c/").expect("url parses");
        assert_eq!(depth_relative_to(&deep, &base), Some(2));
    }

    #[test]
    fn depth_relative_to_rejects_other_hosts() {
        let base = Url::parse("https://site/a/").expect("base parses");
        let other = Url::parse("https://other/a/b/").expect("url parses");
        assert_eq!(depth_relative_to(&other, &base), None);
    }

    #[test]
    fn parent_dir_of_a_directory_style_url_is_itself() {
        let dir = Url::parse("https://site/a/").expect("url parses");
        assert_eq!(parent_dir(&dir).as_str(), "https://site/a/");
    }

    #[test]
    fn parent_dir_of_a_file_style_url_strips_last_segment() {
        let file = Url::parse("https://site/a/b").expect("url parses");
        assert_eq!(parent_dir(&file).as_str(), "https://site/a/");
    }
}
