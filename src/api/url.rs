//! URL and path joining helpers

/// Join a base URL with path segments without doubling slashes.
///
/// Empty segments are skipped. The first segment only loses trailing
/// slashes (so `https://` survives); later segments are trimmed on both ends
/// and internal slash runs are collapsed.
pub fn normalize_url<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut segments = segments.into_iter().filter(|s| !s.is_empty());

    let Some(base) = segments.next() else {
        return String::new();
    };
    let mut result = base.trim_end_matches('/').to_string();

    for segment in segments {
        let segment = path_segments(segment).join("/");
        if !segment.is_empty() {
            result.push('/');
            result.push_str(&segment);
        }
    }

    result
}

/// Join path fragments with single slashes, dropping empty fragments
pub fn join_url_path<'a>(paths: impl IntoIterator<Item = &'a str>) -> String {
    paths
        .into_iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join non-empty segments with `/` as-is
pub fn build_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Drop a leading `api/` (or `/api`) and any leading slashes from an endpoint path
pub fn strip_api_prefix(path: &str) -> &str {
    let rest = path.strip_prefix('/').unwrap_or(path);
    let rest = if rest == "api" {
        ""
    } else {
        rest.strip_prefix("api/").unwrap_or(rest)
    };
    rest.trim_start_matches('/')
}

/// Non-empty `/`-separated parts of `path`
pub(crate) fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
