//! Heuristic contact extraction shared by the DOM strategies and the
//! site adapters.
//!
//! All functions here are synchronous and take `&str` HTML so that no
//! `scraper::Html` value is ever held across an await point.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};

lazy_static! {
    // RFC 5322 simplified
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").unwrap();

    // German and international formats: +49 30 123456, 030/123456, (030) 12 34 56
    static ref PHONE_REGEX: Regex =
        Regex::new(r"(?:\+\d{1,3}[\s\-./]?)?(?:\(0\d{1,4}\)|0\d{1,4})[\s\-./]?\d[\d\s\-./]{4,12}\d").unwrap();
}

/// Pull contact fields out of a rendered or raw HTML page.
///
/// Returns only the fields that were actually found; an empty map means
/// the page yielded nothing usable.
pub fn extract_contact_fields(html: &str, _url: &str) -> HashMap<String, String> {
    let document = Html::parse_document(html);
    let mut fields = HashMap::new();

    if let Some(email) = find_mailto(&document).or_else(|| find_email_in_text(&document)) {
        fields.insert("email".to_string(), email);
    }

    if let Some(phone) = find_tel(&document).or_else(|| find_phone_in_text(&document)) {
        fields.insert("phone".to_string(), phone);
    }

    if let Some(title) = page_title(&document) {
        fields.insert("company_name".to_string(), title);
    }

    if let Some(description) = meta_description(&document) {
        fields.insert("description".to_string(), description);
    }

    fields
}

/// Visible text of a page, whitespace-collapsed.
pub fn page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let text: String = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&text)
}

/// Convert a page to Markdown, preferring the main content area and
/// stripping navigation chrome.
pub fn to_markdown(html: &str) -> String {
    let main_content = extract_main_content(html);
    htmd::convert(&main_content).unwrap_or_else(|_| page_text(html))
}

fn find_mailto(document: &Html) -> Option<String> {
    let selector = Selector::parse("a[href^='mailto:']").ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(|href| href.trim_start_matches("mailto:"))
        .map(|addr| addr.split('?').next().unwrap_or(addr).trim().to_string())
        .find(|addr| EMAIL_REGEX.is_match(addr))
}

fn find_tel(document: &Html) -> Option<String> {
    let selector = Selector::parse("a[href^='tel:']").ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(|href| href.trim_start_matches("tel:").trim().to_string())
        .find(|number| !number.is_empty())
}

fn find_email_in_text(document: &Html) -> Option<String> {
    let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
    EMAIL_REGEX
        .find(&text)
        .map(|m| m.as_str().to_string())
        // Image filenames sneak through the text extraction
        .filter(|email| !email.ends_with(".png") && !email.ends_with(".jpg"))
}

fn find_phone_in_text(document: &Html) -> Option<String> {
    let text: String = document.root_element().text().collect::<Vec<_>>().join(" ");
    PHONE_REGEX.find(&text).map(|m| collapse_whitespace(m.as_str()))
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn meta_description(document: &Html) -> Option<String> {
    let selector = Selector::parse("meta[name='description']").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Extract the main content area, falling back to the whole body with
/// chrome elements removed.
fn extract_main_content(html: &str) -> String {
    let document = Html::parse_document(html);

    let main_selectors = ["main", "article", "[role='main']", "#content", ".content"];
    for selector_str in main_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(main) = document.select(&selector).next() {
                return main.html();
            }
        }
    }

    let mut result = html.to_string();
    let unwanted = ["nav", "header", "footer", "aside", "script", "style", "noscript", "iframe"];
    for selector_str in unwanted {
        if let Ok(selector) = Selector::parse(selector_str) {
            for element in document.select(&selector) {
                result = result.replace(&element.html(), "");
            }
        }
    }
    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
