use url::Url;

pub mod data;
pub mod payloads;

/// Builds the public share link for a transfer id.
pub fn share_url_for(origin: &str, id: &str) -> String {
    format!("{}/t/{}", origin.trim_end_matches('/'), id)
}

/// Extracts the transfer id from a share link.
///
/// The id is the last non-empty path segment, so trailing slashes and
/// foreign link layouts that end with the id both resolve.
pub fn transfer_id_from_share_url(link: &str) -> Option<String> {
    let url = Url::parse(link).ok()?;
    url.path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()
        .map(str::to_string)
}

/// Accepts either a bare transfer id or a full share link.
pub fn resolve_transfer_id(input: &str) -> Option<String> {
    if input.starts_with("http://") || input.starts_with("https://") {
        transfer_id_from_share_url(input)
    } else if input.is_empty() {
        None
    } else {
        Some(input.to_string())
    }
}
