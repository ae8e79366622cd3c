//! Joining configured base URLs with endpoint paths.
//!
//! Base URLs come from config files, environment variables and flags, so
//! they may or may not end in a slash.

/// Strip trailing slashes from a base URL.
///
/// ```
/// use relaychat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/"), "http://localhost:8000");
/// assert_eq!(normalize_base_url("http://localhost:8000///"), "http://localhost:8000");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Append `endpoint` to `base_url` with exactly one slash between them.
///
/// ```
/// use relaychat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8000/", "/chat/stream"),
///     "http://localhost:8000/chat/stream"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}
