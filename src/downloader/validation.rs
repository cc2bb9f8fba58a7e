//! Source URL validation and normalization

use url::Url;

use crate::error::{Error, Result};

/// Query parameter that identifies the video on watch URLs
const VIDEO_PARAM: &str = "v";

/// Whether `host` is one of `allowed` or a subdomain of one
fn host_allowed(host: &str, allowed: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    allowed.iter().any(|allowed| {
        let allowed = allowed.to_ascii_lowercase();
        host == allowed || host.ends_with(&format!(".{}", allowed))
    })
}

/// Validate a source URL and return its cleaned form
///
/// The URL must be http(s) and point at one of `allowed_hosts` (subdomains
/// included). See [`clean_url`] for the normalization applied.
pub fn validate_url(raw: &str, allowed_hosts: &[String]) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidInput("url is required".into()));
    }

    let url = Url::parse(raw).map_err(|e| Error::InvalidInput(format!("invalid url '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "unsupported url scheme '{}'",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if host_allowed(host, allowed_hosts) => Ok(clean_url(url)),
        Some(host) => Err(Error::InvalidInput(format!(
            "unsupported host '{}', expected one of: {}",
            host,
            allowed_hosts.join(", ")
        ))),
        None => Err(Error::InvalidInput(format!("url '{}' has no host", raw))),
    }
}

/// Drop every query parameter except the video id, and the fragment
///
/// Watch URLs copied from a playlist carry `list=` and `index=`; without
/// stripping them the engine would treat a single-video request as a playlist.
pub fn clean_url(mut url: Url) -> String {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key == VIDEO_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.set_fragment(None);
    url.to_string()
}
