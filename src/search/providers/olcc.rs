// src/search/providers/olcc.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use regex::Regex;
use reqwest::{header, Client};
use std::time::Duration;

use crate::search::normalize_text;
use crate::search::types::{FoundItem, SearchProvider};

pub const DEFAULT_BASE_URL: &str = "http://www.oregonliquorsearch.com";
const SEARCH_PATH: &str = "/servlet/FrontController";
const AGE_GATE_PATH: &str = "/servlet/WelcomeController";

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:102.0) Gecko/20100101 Firefox/102.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/119.0",
];

static RE_PRODUCT_DESC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)id\s*=\s*"product-desc"[^>]*>.*?<h2[^>]*>(.*?)</h2>"#).unwrap()
});
static RE_PRODUCT_DETAILS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<table[^>]*id\s*=\s*"product-details"[^>]*>(.*?)</table>"#).unwrap()
});
static RE_LABEL_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<th[^>]*>(.*?)</th>\s*<td[^>]*>(.*?)</td>").unwrap());
static RE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr([^>]*)>(.*?)</tr>").unwrap());
static RE_CELL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<td([^>]*)>(.*?)</td>").unwrap());
static RE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)class\s*=\s*"([^"]*)""#).unwrap());

/// Everything the product header and details table tell us.
/// Only name, code and bottle price end up in a `FoundItem`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductInfo {
    pub item_code: String,
    pub name: String,
    pub bottle_price: String,
    pub case_price: String,
    pub size: String,
    pub proof: String,
    pub category: String,
}

fn has_class(attrs: &str, wanted: &[&str]) -> bool {
    RE_CLASS
        .captures(attrs)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().split_whitespace().any(|cls| wanted.contains(&cls)))
        .unwrap_or(false)
}

/// "Item 99900733075(7330B): MICHTER'S STRAIGHT RYE" -> ("7330B", "MICHTER'S STRAIGHT RYE").
/// Without parentheses the whole item token is the code.
fn split_product_header(header: &str) -> Option<(String, String)> {
    let (left, name) = header.split_once(':')?;
    let full_code = left.split_whitespace().nth(1)?;
    let code = match (full_code.find('('), full_code.find(')')) {
        (Some(i), Some(j)) if j > i + 1 => &full_code[i + 1..j],
        _ => full_code,
    };
    Some((code.to_string(), name.trim().to_string()))
}

pub fn extract_product_info(html: &str) -> ProductInfo {
    let mut product = ProductInfo::default();

    if let Some(m) = RE_PRODUCT_DESC.captures(html).and_then(|c| c.get(1)) {
        if let Some((code, name)) = split_product_header(&normalize_text(m.as_str())) {
            product.item_code = code;
            product.name = name;
        }
    }

    if let Some(table) = RE_PRODUCT_DETAILS.captures(html).and_then(|c| c.get(1)) {
        for cap in RE_LABEL_VALUE.captures_iter(table.as_str()) {
            let value = normalize_text(&cap[2]);
            match normalize_text(&cap[1]).as_str() {
                "Bottle Price:" => product.bottle_price = value,
                "Case Price:" => product.case_price = value,
                "Size:" => product.size = value,
                "Proof:" => product.proof = value,
                "Category:" => product.category = value,
                _ => {}
            }
        }
    }

    product
}

/// Result rows (`tr.row`, `tr.alt-row`) with stock > 0, one item per store.
pub fn extract_results(html: &str, product: &ProductInfo, now: DateTime<Local>) -> Vec<FoundItem> {
    let mut results = Vec::new();
    for row in RE_ROW.captures_iter(html) {
        if !has_class(&row[1], &["row", "alt-row"]) {
            continue;
        }
        let cells: Vec<(String, String)> = RE_CELL
            .captures_iter(&row[2])
            .map(|c| (c[1].to_string(), normalize_text(&c[2])))
            .collect();

        let out_of_stock = cells
            .iter()
            .find(|(attrs, _)| has_class(attrs, &["qty"]))
            .is_some_and(|(_, qty)| qty == "0");
        if out_of_stock {
            continue;
        }

        let store = cells.get(2).map(|(_, text)| text.as_str()).unwrap_or_default();
        if store.is_empty() {
            continue;
        }
        results.push(FoundItem {
            name: product.name.clone(),
            code: product.item_code.clone(),
            store: store.to_string(),
            found_at: now,
            price: product.bottle_price.clone(),
        });
    }
    results
}

pub fn parse_search_page(html: &str, now: DateTime<Local>) -> Vec<FoundItem> {
    let product = extract_product_info(html);
    extract_results(html, &product, now)
}

/// OLCC liquor search client. Keeps a cookie jar so the age gate sticks
/// for the following search request.
pub struct OlccSearcher {
    client: Client,
    base_url: String,
    user_agent: Option<String>,
}

impl OlccSearcher {
    /// Empty `user_agent` rotates through browser agents per search.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .context("building OLCC http client")?;
        let ua = user_agent.trim();
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: (!ua.is_empty()).then(|| ua.to_string()),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn pick_user_agent(&self) -> String {
        match &self.user_agent {
            Some(ua) => ua.clone(),
            None => {
                let ua = USER_AGENTS
                    .choose(&mut rand::rng())
                    .copied()
                    .unwrap_or(USER_AGENTS[0]);
                tracing::debug!(user_agent = ua, "rotating user agent");
                ua.to_string()
            }
        }
    }

    async fn verify_age(&self, ua: &str) -> Result<()> {
        // Landing page hands out the session cookie.
        self.client
            .get(format!("{}/", self.base_url))
            .header(header::USER_AGENT, ua)
            .send()
            .await
            .context("fetching landing page")?;

        let age_url = format!("{}{AGE_GATE_PATH}", self.base_url);
        let resp = self
            .client
            .post(&age_url)
            .header(header::USER_AGENT, ua)
            .header(header::REFERER, &age_url)
            .form(&[("ageCheck", "true"), ("action", "search")])
            .send()
            .await
            .context("submitting age verification")?;
        if !resp.status().is_success() {
            bail!("age verification failed with status: {}", resp.status());
        }
        Ok(())
    }
}

#[async_trait]
impl SearchProvider for OlccSearcher {
    async fn search(&self, term: &str, location: &str, radius: u32) -> Result<Vec<FoundItem>> {
        let ua = self.pick_user_agent();
        self.verify_age(&ua).await.context("age verification")?;

        let search_url = format!("{}{SEARCH_PATH}", self.base_url);
        let radius = radius.to_string();
        let form = [
            ("view", "global"),
            ("action", "search"),
            ("radiusSearchParam", radius.as_str()),
            ("productSearchParam", term),
            ("locationSearchParam", location),
            ("btnSearch", "Search"),
        ];
        tracing::debug!(term, location, radius = %radius, "posting OLCC search form");

        let resp = self
            .client
            .post(&search_url)
            .header(header::USER_AGENT, &ua)
            .header(header::REFERER, &search_url)
            .form(&form)
            .send()
            .await
            .context("search request")?;
        if !resp.status().is_success() {
            bail!("search failed with status: {}", resp.status());
        }
        let html = resp.text().await.context("reading search response body")?;

        Ok(parse_search_page(&html, Local::now()))
    }

    fn name(&self) -> &'static str {
        "OLCC"
    }
}
