//! Remote tender registry adapter.
//!
//! [`TenderSource`] is the seam between the scheduler/CLI and the external
//! procurement registry. The HTTP implementation fetches the public search
//! page for a registry number and extracts the tender fields from the
//! class-marked markup. Extraction is tolerant by design: a field the page
//! does not expose yields an empty/`None` value, never a fetch failure.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::config::SourceConfig;
use crate::models::SourceTender;

#[async_trait]
pub trait TenderSource: Send + Sync {
    /// Fetch the current state of one tender by its registry number.
    async fn fetch(&self, tender_id: &str) -> Result<SourceTender>;
}

/// HTTP implementation scraping the public registry search page.
pub struct HttpTenderSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTenderSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("tender-watch/0.3")
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl TenderSource for HttpTenderSource {
    async fn fetch(&self, tender_id: &str) -> Result<SourceTender> {
        let url = format!(
            "{}/epz/order/extendedsearch/results.html?searchString={}",
            self.base_url, tender_id
        );
        debug!(%tender_id, %url, "fetching tender page");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch tender {}", tender_id))?
            .error_for_status()
            .with_context(|| format!("Registry returned an error for tender {}", tender_id))?;

        let html = response.text().await?;
        Ok(extract_tender(tender_id, &html))
    }
}

// Block-level markers used by the registry page. Each extractor pulls the
// first occurrence and strips nested tags.
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| marker_re("registry-entry__header-mid-title"));
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| marker_re("registry-entry__body-value"));
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| marker_re("price-block__value"));
static CUSTOMER_RE: LazyLock<Regex> = LazyLock::new(|| marker_re("registry-entry__body-href"));
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| marker_re("data-block__value"));
static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| marker_re("registry-entry__header-mid__title"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

fn marker_re(class: &str) -> Regex {
    Regex::new(&format!(r#"(?s)class="{}"[^>]*>(.*?)</"#, class)).expect("marker regex")
}

/// Extract tender fields from the page markup. Missing blocks produce
/// empty/`None` fields.
pub fn extract_tender(tender_id: &str, html: &str) -> SourceTender {
    let dates: Vec<DateTime<Utc>> = DATE_RE
        .captures_iter(html)
        .filter_map(|c| parse_date(&clean(c.get(1).map(|m| m.as_str()).unwrap_or(""))))
        .collect();

    SourceTender {
        tender_id: tender_id.to_string(),
        title: first_text(&TITLE_RE, html).unwrap_or_default(),
        description: first_text(&DESCRIPTION_RE, html).unwrap_or_default(),
        price: first_text(&PRICE_RE, html).and_then(|t| parse_price(&t)),
        customer: first_text(&CUSTOMER_RE, html),
        publication_date: dates.first().copied(),
        deadline: dates.get(1).copied(),
        status: first_text(&STATUS_RE, html)
            .map(|t| normalize_status(&t).to_string())
            .unwrap_or_default(),
    }
}

/// Map the registry page's free-form status wording onto a lifecycle token.
///
/// The page prints human-readable phrases ("Bidding in progress",
/// "Commission review"), not the catalogue's snake_case tokens. Matching is
/// substring-based and ordered: "bidding" must win over the "in progress"
/// marker inside the same phrase. An unrecognized non-empty status maps to
/// `published` so freshly scraped tenders stay on the monitoring jobs'
/// radar; a missing status block stays empty.
pub fn normalize_status(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();
    let markers: &[(&str, &str)] = &[
        ("draft", "draft"),
        ("bidding", "bidding"),
        ("submission", "bidding"),
        ("evaluation", "evaluation"),
        ("review", "evaluation"),
        ("commission", "evaluation"),
        ("awarded", "awarded"),
        ("signed", "signed"),
        ("execution", "in_progress"),
        ("in progress", "in_progress"),
        ("completed", "completed"),
        ("terminated", "terminated"),
        ("cancelled", "terminated"),
        ("suspended", "suspended"),
        ("published", "published"),
    ];

    for (marker, token) in markers {
        if lower.contains(marker) {
            return token;
        }
    }
    "published"
}

fn first_text(re: &Regex, html: &str) -> Option<String> {
    let captured = re.captures(html)?.get(1)?.as_str();
    let text = clean(captured);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn clean(fragment: &str) -> String {
    TAG_RE
        .replace_all(fragment, " ")
        .replace("&nbsp;", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a price like `1 234 567,89 ₽` into a float.
fn parse_price(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    digits.replace(',', ".").parse::<f64>().ok()
}

/// Parse a `DD.MM.YYYY` registry date into midnight UTC.
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(text, "%d.%m.%Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
