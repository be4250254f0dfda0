//! Shared HTTP transport for plain (non-rendered) page fetches.

use std::time::Duration;

use reqwest::Client;

use crate::error::{Result, ScrapeError};
use crate::proxy::ProxyConfig;

/// Browser-like User-Agent to avoid trivial bot detection.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Build an HTTP client, optionally routed through a proxy identity.
pub fn build_client(proxy: Option<&ProxyConfig>) -> Result<Client> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
            .parse()
            .expect("static header value"),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        "de-DE,de;q=0.8,en-US,en;q=0.5".parse().expect("static header value"),
    );

    let mut builder = Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(5));

    if let Some(config) = proxy {
        let mut proxy = reqwest::Proxy::all(&config.url)?;
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            proxy = proxy.basic_auth(user, pass);
        }
        builder = builder.proxy(proxy);
    }

    Ok(builder.build()?)
}

/// Fetch raw HTML from a URL, failing on non-success statuses.
pub async fn fetch_html(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    Ok(response.text().await?)
}

/// Add an https:// scheme when none is present.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_url_adds_scheme() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn build_client_without_proxy() {
        assert!(build_client(None).is_ok());
    }

    #[test]
    fn build_client_with_proxy() {
        let config = ProxyConfig {
            url: "http://proxy.example:8080".to_string(),
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
        };
        assert!(build_client(Some(&config)).is_ok());
    }
}
