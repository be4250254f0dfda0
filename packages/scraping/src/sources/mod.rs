//! Directory site adapters.
//!
//! Each adapter is a thin DOM-extraction routine behind the shared
//! [`SiteScraper`] contract; the retrying/throttling mechanics live in
//! the runner. Adapters are registered by name so jobs can reference
//! them as plain strings.

mod eleven_eighty;
mod gelbe_seiten;
mod wlw;

use std::collections::HashMap;
use std::sync::Arc;

use scraper::{ElementRef, Selector};

use crate::types::LeadRecord;

pub use eleven_eighty::ElevenEightyScraper;
pub use gelbe_seiten::GelbeSeitenScraper;
pub use wlw::WlwScraper;

/// One directory site: URL construction plus result-page parsing.
pub trait SiteScraper: Send + Sync {
    /// Registry name, e.g. `"11880"`.
    fn name(&self) -> &'static str;

    /// Domain used for rate limiting.
    fn domain(&self) -> &'static str;

    /// Whether this site needs a headless render to produce results.
    fn needs_browser(&self) -> bool {
        false
    }

    /// Search-result URLs for a city/industry pair, one per page.
    fn search_urls(&self, city: &str, industry: &str, max_pages: u32) -> Vec<String>;

    /// Parse one search-result page into lead records.
    fn parse_search_results(&self, html: &str, url: &str) -> Vec<LeadRecord>;
}

/// All known site adapters, keyed by registry name.
pub fn registry() -> HashMap<&'static str, Arc<dyn SiteScraper>> {
    let scrapers: Vec<Arc<dyn SiteScraper>> = vec![
        Arc::new(ElevenEightyScraper),
        Arc::new(GelbeSeitenScraper),
        Arc::new(WlwScraper),
    ];

    scrapers.into_iter().map(|s| (s.name(), s)).collect()
}

/// Lowercase path slug used by the German directories: "Müller & Söhne" -> "mueller-soehne".
pub(crate) fn slug(value: &str) -> String {
    value
        .to_lowercase()
        .replace('ä', "ae")
        .replace('ö', "oe")
        .replace('ü', "ue")
        .replace('ß', "ss")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// First matching element's text, trimmed, None when empty.
pub(crate) fn text_of(element: ElementRef<'_>, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    element
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

/// First matching element's attribute, trimmed, None when empty.
pub(crate) fn attr_of(element: ElementRef<'_>, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    element
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Field names present on a freshly parsed record, for provenance.
pub(crate) fn present_fields(record: &LeadRecord) -> Vec<String> {
    let mut fields = vec!["company_name".to_string()];
    let optional = [
        ("website", &record.website),
        ("phone", &record.phone),
        ("email", &record.email),
        ("address", &record.address),
        ("city", &record.city),
        ("postal_code", &record.postal_code),
        ("description", &record.description),
    ];
    for (name, value) in optional {
        if value.is_some() {
            fields.push(name.to_string());
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_all_adapters() {
        let registry = registry();
        assert!(registry.contains_key("11880"));
        assert!(registry.contains_key("gelbeseiten"));
        assert!(registry.contains_key("wlw"));
    }

    #[test]
    fn slug_handles_umlauts_and_spaces() {
        assert_eq!(slug("Müller & Söhne GmbH"), "mueller-soehne-gmbh");
        assert_eq!(slug("Berlin"), "berlin");
    }
}
