use crate::PageError;
use url::Url;

/// Extracts the host of a URL string
///
/// The host is the authority's host component as standard URL parsing
/// yields it (lowercased, without port or userinfo). It keys per-host
/// admission and allow-list checks.
///
/// # Arguments
///
/// * `raw` - The URL to extract the host from
///
/// # Returns
///
/// * `Ok(String)` - The host
/// * `Err(PageError::InvalidUrl)` - The string is not a valid URL
/// * `Err(PageError::MissingHost)` - The URL has no host (e.g. `mailto:`)
///
/// # Examples
///
/// ```
/// use wave_crawler::url::extract_host;
///
/// assert_eq!(extract_host("https://EXAMPLE.com:8080/path").unwrap(), "example.com");
/// assert!(extract_host("not a url").is_err());
/// ```
pub fn extract_host(raw: &str) -> Result<String, PageError> {
    let url = Url::parse(raw).map_err(|source| PageError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_lowercase()),
        _ => Err(PageError::MissingHost {
            url: raw.to_string(),
        }),
    }
}
