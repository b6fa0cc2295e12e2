//! Archive file name resolution
//!
//! Download URLs often end in a trailing slash or a redirect endpoint
//! (`.../zlib-1.3.1.tar.gz/download`), so the archive name is the last path
//! segment that looks like a file rather than simply the last segment.

use crate::manifest::DependencySpec;

/// Local file name for a dependency's downloaded archive.
///
/// Falls back to the dependency name when no path segment has an extension.
///
/// # Example
/// ```ignore
/// // https://example.com/releases/v1.2/pkg-1.2.tar.gz -> "pkg-1.2.tar.gz"
/// // https://example.com/download/                     -> dep.name
/// ```
pub fn resolve_archive_name(dep: &DependencySpec) -> String {
    archive_name_from_url(&dep.url)
        .map(str::to_string)
        .unwrap_or_else(|| dep.name.clone())
}

/// Find the right-most path segment of `url` containing a dot after its
/// first character.
///
/// Only the path is scanned: the scheme, host, query string and fragment are
/// ignored. Version directories like `v1.2` also qualify.
pub fn archive_name_from_url(url: &str) -> Option<&str> {
    // Strip query string and fragment
    let clean = url.split(['?', '#']).next().unwrap_or(url);

    let path = match clean.find("://") {
        Some(scheme_end) => {
            let after_scheme = &clean[scheme_end + 3..];
            match after_scheme.find('/') {
                Some(path_start) => &after_scheme[path_start..],
                None => return None,
            }
        }
        None => clean,
    };

    path.rsplit('/').find(|segment| looks_like_file(segment))
}

fn looks_like_file(segment: &str) -> bool {
    segment.find('.').is_some_and(|pos| pos > 0)
}
