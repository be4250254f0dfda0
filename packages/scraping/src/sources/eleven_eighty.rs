//! Adapter for the 11880.com business directory.

use scraper::{Html, Selector};

use crate::types::LeadRecord;

use super::{attr_of, present_fields, slug, text_of, SiteScraper};

pub struct ElevenEightyScraper;

impl SiteScraper for ElevenEightyScraper {
    fn name(&self) -> &'static str {
        "11880"
    }

    fn domain(&self) -> &'static str {
        "www.11880.com"
    }

    fn search_urls(&self, city: &str, industry: &str, max_pages: u32) -> Vec<String> {
        (1..=max_pages.max(1))
            .map(|page| {
                format!(
                    "https://www.11880.com/suche/{}/{}?page={}",
                    slug(industry),
                    slug(city),
                    page
                )
            })
            .collect()
    }

    fn parse_search_results(&self, html: &str, url: &str) -> Vec<LeadRecord> {
        let document = Html::parse_document(html);
        let Ok(entry_selector) = Selector::parse("article.result-list-entry, .result-list-entry") else {
            return vec![];
        };

        let mut records = Vec::new();
        for entry in document.select(&entry_selector) {
            let Some(name) = text_of(entry, ".result-list-entry__name, h2") else {
                continue;
            };

            let mut record = LeadRecord::new(name);
            record.address = text_of(entry, ".result-list-entry__address, address");
            record.phone = attr_of(entry, "a[href^='tel:']", "href")
                .map(|href| href.trim_start_matches("tel:").to_string());
            record.website = attr_of(entry, "a.result-list-entry__website, a[data-role='website']", "href");
            record.description = text_of(entry, ".result-list-entry__description");

            // "Musterstraße 1, 10115 Berlin" -> postal code and city
            if let Some(address) = record.address.clone() {
                if let Some((postal_code, city)) = split_postal_city(&address) {
                    record.postal_code = Some(postal_code);
                    record.city = Some(city);
                }
            }

            record.add_source(self.name(), url, present_fields(&record));
            records.push(record);
        }

        records
    }
}

/// Split a German address tail of the form "... 10115 Berlin".
fn split_postal_city(address: &str) -> Option<(String, String)> {
    let tail = address.rsplit(',').next().unwrap_or(address).trim();
    let mut parts = tail.split_whitespace();
    let postal_code = parts.next()?;
    if postal_code.len() != 5 || !postal_code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let city: Vec<&str> = parts.collect();
    if city.is_empty() {
        return None;
    }
    Some((postal_code.to_string(), city.join(" ")))
}
