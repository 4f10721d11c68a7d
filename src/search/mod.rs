// src/search/mod.rs
pub mod providers;
pub mod types;

pub use types::{FoundItem, SearchProvider};

/// Strip tags, decode entities, collapse whitespace. Used on scraped cells.
pub fn normalize_text(s: &str) -> String {
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();

    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(s, " ");
    let out = html_escape::decode_html_entities(&out).replace('\u{00A0}', " ");

    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}
