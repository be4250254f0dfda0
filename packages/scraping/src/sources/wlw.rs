//! Adapter for the wlw.de (Wer liefert was) B2B directory.

use scraper::{Html, Selector};
use url::form_urlencoded;

use crate::types::LeadRecord;

use super::{attr_of, present_fields, text_of, SiteScraper};

pub struct WlwScraper;

impl SiteScraper for WlwScraper {
    fn name(&self) -> &'static str {
        "wlw"
    }

    fn domain(&self) -> &'static str {
        "www.wlw.de"
    }

    // Supplier cards are rendered client-side.
    fn needs_browser(&self) -> bool {
        true
    }

    fn search_urls(&self, city: &str, industry: &str, max_pages: u32) -> Vec<String> {
        let query: String = form_urlencoded::byte_serialize(industry.as_bytes()).collect();
        let location: String = form_urlencoded::byte_serialize(city.as_bytes()).collect();

        (1..=max_pages.max(1))
            .map(|page| {
                format!(
                    "https://www.wlw.de/de/suche?q={}&location={}&page={}",
                    query, location, page
                )
            })
            .collect()
    }

    fn parse_search_results(&self, html: &str, url: &str) -> Vec<LeadRecord> {
        let document = Html::parse_document(html);
        let Ok(entry_selector) = Selector::parse(".company-item, [data-test='supplier-card']") else {
            return vec![];
        };

        let mut records = Vec::new();
        for entry in document.select(&entry_selector) {
            let Some(name) = text_of(entry, ".company-item__name, h3") else {
                continue;
            };

            let mut record = LeadRecord::new(name);
            record.city = text_of(entry, ".company-item__location, [data-test='supplier-location']");
            record.description = text_of(entry, ".company-item__description, p");
            record.website = attr_of(entry, "a[data-test='website-link']", "href");

            record.add_source(self.name(), url, present_fields(&record));
            records.push(record);
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_urls_are_query_encoded() {
        let scraper = WlwScraper;
        let urls = scraper.search_urls("München", "Metallbau Stahl", 1);
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("q=Metallbau+Stahl"));
        assert!(urls[0].contains("page=1"));
    }

    #[test]
    fn parses_supplier_cards() {
        let html = r#"
            <div class="company-item">
              <h3 class="company-item__name">Stahlbau Meier KG</h3>
              <span class="company-item__location">München</span>
              <p class="company-item__description">Stahl- und Metallbau seit 1952.</p>
            </div>"#;

        let scraper = WlwScraper;
        let records = scraper.parse_search_results(html, "https://www.wlw.de/de/suche?q=x");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].company_name, "Stahlbau Meier KG");
        assert_eq!(records[0].city.as_deref(), Some("München"));
        assert!(records[0].description.is_some());
    }
}
