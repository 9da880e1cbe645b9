use std::collections::HashSet;

use tracing::{debug, warn};

use super::patterns::{
    all_captures, first_capture, is_reserved_header, INDEX_REGION_RE, STUB_RE, TOKEN_RE,
};
use crate::model::{Entity, IndexListing, RequireToken};

/// Parse the root index page into require tokens and entity stubs.
pub fn extract(html: &str, base_url: &str) -> IndexListing {
    let region = scope_region(html);
    IndexListing {
        requires: extract_requires(&region),
        entities: extract_stubs(&region, base_url),
    }
}

/// Narrow the page to the API listing, dropping site chrome around it.
/// Falls back to the whole page when the markers are missing.
fn scope_region(html: &str) -> String {
    match first_capture(&INDEX_REGION_RE, html) {
        Some(region) => region,
        None => {
            warn!("Index page has no 'Scripting API' region, scanning whole page");
            html.to_string()
        }
    }
}

/// Every `<span>` label except the reserved section headers. Not deduplicated.
pub fn extract_requires(region: &str) -> Vec<RequireToken> {
    let tokens: Vec<RequireToken> = all_captures(&TOKEN_RE, region, 1)
        .filter(|label| !is_reserved_header(label))
        .map(RequireToken::new)
        .collect();
    debug!(count = tokens.len(), "Extracted require tokens");
    tokens
}

/// Entity anchors in document order; a repeated detail URL keeps its first stub.
pub fn extract_stubs(region: &str, base_url: &str) -> Vec<Entity> {
    let mut seen = HashSet::new();
    let mut stubs = Vec::new();

    for caps in STUB_RE.captures_iter(region) {
        let link = &caps[1];
        let name = &caps[2];
        let url = format!("{}{}", base_url, link);
        if !seen.insert(url.clone()) {
            continue;
        }
        stubs.push(Entity::stub(name, url));
    }

    debug!(count = stubs.len(), "Extracted entity stubs");
    stubs
}

// ── Tests ──
