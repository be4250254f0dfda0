//! Transient data types produced by scrapers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance entry: which scrape produced which fields of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub name: String,
    pub url: String,
    pub fields: Vec<String>,
    pub scraped_at: DateTime<Utc>,
}

/// A business lead discovered by a scrape.
///
/// Lives only for the duration of one job; it is flattened to a
/// validated field map before anything touches storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadRecord {
    pub company_name: String,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub description: Option<String>,
    pub scraped_at: DateTime<Utc>,
    /// Append-ordered provenance list.
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    /// Site-specific leftovers that have no dedicated column.
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl LeadRecord {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            website: None,
            phone: None,
            email: None,
            address: None,
            city: None,
            postal_code: None,
            description: None,
            scraped_at: Utc::now(),
            sources: Vec::new(),
            extra: HashMap::new(),
        }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Append a provenance source.
    ///
    /// Re-adding a source with the same (name, url) merges its field
    /// list into the existing entry instead of duplicating it.
    pub fn add_source(&mut self, name: &str, url: &str, fields: Vec<String>) {
        if let Some(existing) = self
            .sources
            .iter_mut()
            .find(|s| s.name == name && s.url == url)
        {
            for field in fields {
                if !existing.fields.contains(&field) {
                    existing.fields.push(field);
                }
            }
            return;
        }

        self.sources.push(SourceRef {
            name: name.to_string(),
            url: url.to_string(),
            fields,
            scraped_at: Utc::now(),
        });
    }
}

/// Running counters owned by one `ScraperRunner` instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub requests: u64,
    pub successes: u64,
    pub errors: u64,
    pub results: u64,
}

/// A hit returned by a web search provider.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
    pub score: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_source_merges_same_name_and_url() {
        let mut record = LeadRecord::new("Acme GmbH");
        record.add_source("11880", "https://a/1", vec!["phone".into()]);
        record.add_source("11880", "https://a/1", vec!["phone".into(), "email".into()]);

        assert_eq!(record.sources.len(), 1);
        assert_eq!(record.sources[0].fields, vec!["phone", "email"]);
    }

    #[test]
    fn add_source_keeps_distinct_urls_ordered() {
        let mut record = LeadRecord::new("Acme GmbH");
        record.add_source("11880", "https://a/1", vec![]);
        record.add_source("smart_scraper", "https://acme.example", vec!["email".into()]);

        assert_eq!(record.sources.len(), 2);
        assert_eq!(record.sources[0].name, "11880");
        assert_eq!(record.sources[1].name, "smart_scraper");
    }
}
