use crate::error::{SubsceneError, SubsceneResult};
use crate::types::SubsceneOptions;
use regex::Regex;
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

static NUMERIC_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#([xX][0-9a-fA-F]+|[0-9]+);").expect("Valid numeric reference regex"));

/// Stand-in for `&amp;` while bare ampersands are escaped
const AMP_PLACEHOLDER: &str = "\u{E000}amp;";

/// A downloaded body together with its declared content type
#[derive(Debug, Clone)]
pub struct Download {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// HTTP access to the subtitle site.
///
/// A missing page (non-2xx status or empty body) is `Ok(None)`; only
/// transport failures surface as errors.
pub struct PageFetcher {
    client: Client,
    base_url: Url,
}

impl PageFetcher {
    pub fn new(options: &SubsceneOptions) -> SubsceneResult<Self> {
        let base_url = Url::parse(&options.base_url).map_err(|_| SubsceneError::InvalidUrl {
            url: options.base_url.clone(),
        })?;

        let client = build_client(options)?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch `path` and return its sanitized markup
    pub async fn fetch_page(&self, path: &str) -> SubsceneResult<Option<String>> {
        let url = self.resolve(path)?;
        debug!("Fetching page: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            debug!("Page {} answered {}", url, response.status());
            return Ok(None);
        }

        let html = response.text().await?;
        if html.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(sanitize_html(&html)))
    }

    /// Fetch `path` as raw bytes
    pub async fn fetch_bytes(&self, path: &str) -> SubsceneResult<Option<Download>> {
        let url = self.resolve(path)?;
        debug!("Downloading: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            warn!("Download {} answered {}", url, response.status());
            return Ok(None);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        let bytes = response.bytes().await?.to_vec();

        debug!("Downloaded {} bytes ({})", bytes.len(), content_type);

        Ok(Some(Download {
            content_type,
            bytes,
        }))
    }

    fn resolve(&self, path: &str) -> SubsceneResult<Url> {
        self.base_url
            .join(path)
            .map_err(|_| SubsceneError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
            })
    }
}

/// Build the shared HTTP client from options
pub(crate) fn build_client(options: &SubsceneOptions) -> SubsceneResult<Client> {
    let mut headers = reqwest::header::HeaderMap::new();

    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&options.effective_user_agent()).map_err(|_| {
            SubsceneError::Configuration {
                message: "Invalid user agent".to_string(),
            }
        })?,
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        reqwest::header::HeaderValue::from_static("en-US,en;q=0.5"),
    );

    let mut client_builder = Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(options.timeout_seconds))
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(proxy_url) = &options.proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| SubsceneError::Configuration {
            message: format!("Invalid proxy URL: {}", e),
        })?;
        client_builder = client_builder.proxy(proxy);
    }

    client_builder
        .build()
        .map_err(|e| SubsceneError::Configuration {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Repair the site's markup so it parses as a tree.
///
/// Steps run in a fixed order: script blocks, numeric character
/// references, `&nbsp;` and bare ampersands, broken arrows, doctype.
pub fn sanitize_html(html: &str) -> String {
    let html = strip_scripts(html);
    let html = decode_numeric_references(&html);

    let html = html
        .replace("&nbsp;", "")
        .replace("&amp;", AMP_PLACEHOLDER)
        .replace('&', "&amp;")
        .replace(AMP_PLACEHOLDER, "&amp;");

    html.replace("--->", "---")
        .replace("<---", "---")
        .replace("<--", "--")
        .replace("<!DOCTYPE html>", "")
}

fn strip_scripts(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find("<script") {
        out.push_str(&rest[..start]);
        match rest[start..].find("</script>") {
            Some(end) => rest = &rest[start + end + "</script>".len()..],
            // unterminated block runs to the end of the document
            None => rest = "",
        }
    }
    out.push_str(rest);
    out
}

fn decode_numeric_references(html: &str) -> String {
    NUMERIC_REFERENCE
        .replace_all(html, |caps: &regex::Captures| {
            let digits = &caps[1];
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => digits.parse::<u32>().ok(),
            };
            match code.and_then(char::from_u32) {
                Some(c) => c.to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
