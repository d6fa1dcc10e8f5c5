//! Source discovery: fetch the listing page and collect its PDF links.
//!
//! The publishing site is plain server-rendered HTML, so anchors are found
//! with a regex over `href` attributes rather than a DOM parser. Links are
//! resolved against the listing URL, which turns site-relative paths
//! (`/docs/a.pdf`) into absolute URLs on the same origin.

use crate::error::AtasError;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info};

static RE_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

/// Fetch `listing_url` and return every PDF link on it, in markup order.
///
/// Any failure here is fatal to the batch: without the listing there is
/// nothing to process.
pub async fn list_pdf_urls(
    client: &reqwest::Client,
    listing_url: &str,
) -> Result<Vec<Url>, AtasError> {
    let base = Url::parse(listing_url).map_err(|e| AtasError::InvalidListingUrl {
        url: listing_url.to_string(),
        reason: e.to_string(),
    })?;

    info!("Fetching listing page: {}", base);
    let response = client
        .get(base.clone())
        .send()
        .await
        .map_err(|e| AtasError::ListingFetchFailed {
            url: listing_url.to_string(),
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(AtasError::ListingStatus {
            url: listing_url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let html = response
        .text()
        .await
        .map_err(|e| AtasError::ListingFetchFailed {
            url: listing_url.to_string(),
            reason: e.to_string(),
        })?;

    let urls = extract_pdf_links(&html, &base);
    info!("Found {} PDF link(s) on listing page", urls.len());
    Ok(urls)
}

/// Extract absolute PDF URLs from `html`, resolving relative links against `base`.
///
/// Duplicates are kept: the fetcher's name-based skip avoids re-downloading.
pub fn extract_pdf_links(html: &str, base: &Url) -> Vec<Url> {
    RE_HREF
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| decode_entities(m.as_str().trim()))
        .filter_map(|href| match base.join(&href) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!("Ignoring unparseable href {:?}: {}", href, e);
                None
            }
        })
        .filter(is_pdf_url)
        .collect()
}

/// True when the URL is http(s) and its path ends in `.pdf`.
pub fn is_pdf_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && url.path().to_ascii_lowercase().ends_with(".pdf")
}

/// Build the HTTP client shared by discovery and downloads.
pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client, AtasError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(timeout_secs))
        .read_timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("atas2json/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AtasError::Internal(format!("Failed to build HTTP client: {e}")))
}

fn decode_entities(href: &str) -> String {
    href.replace("&amp;", "&")
}
