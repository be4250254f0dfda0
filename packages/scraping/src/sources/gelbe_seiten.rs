//! Adapter for the gelbeseiten.de business directory.

use scraper::{Html, Selector};

use crate::types::LeadRecord;

use super::{attr_of, present_fields, slug, text_of, SiteScraper};

pub struct GelbeSeitenScraper;

impl SiteScraper for GelbeSeitenScraper {
    fn name(&self) -> &'static str {
        "gelbeseiten"
    }

    fn domain(&self) -> &'static str {
        "www.gelbeseiten.de"
    }

    fn search_urls(&self, city: &str, industry: &str, max_pages: u32) -> Vec<String> {
        (1..=max_pages.max(1))
            .map(|page| {
                format!(
                    "https://www.gelbeseiten.de/suche/{}/{}?seite={}",
                    slug(industry),
                    slug(city),
                    page
                )
            })
            .collect()
    }

    fn parse_search_results(&self, html: &str, url: &str) -> Vec<LeadRecord> {
        let document = Html::parse_document(html);
        let Ok(entry_selector) = Selector::parse("article.mod-Treffer, [data-realid]") else {
            return vec![];
        };

        let mut records = Vec::new();
        for entry in document.select(&entry_selector) {
            let Some(name) = text_of(entry, ".mod-Treffer__name, h2") else {
                continue;
            };

            let mut record = LeadRecord::new(name);
            record.address = text_of(entry, ".mod-AdresseKompakt__adresse, address");
            record.phone = text_of(entry, ".mod-TelefonnummerKompakt__phoneNumber")
                .or_else(|| {
                    attr_of(entry, "a[href^='tel:']", "href")
                        .map(|href| href.trim_start_matches("tel:").to_string())
                });
            record.website = attr_of(entry, "a.contains-icon-homepage, a[title='Webseite']", "href");
            record.email = attr_of(entry, "a[href^='mailto:']", "href")
                .map(|href| href.trim_start_matches("mailto:").to_string());

            if let Some(city) = text_of(entry, ".mod-AdresseKompakt__ort") {
                record.city = Some(city);
            }

            record.add_source(self.name(), url, present_fields(&record));
            records.push(record);
        }

        records
    }
}
