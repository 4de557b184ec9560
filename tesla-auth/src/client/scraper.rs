//! Hidden `<input>` extraction from the hosted login page.
//!
//! The page is not under our control and is not always well formed, so this
//! is pattern matching over tags rather than HTML parsing.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

/// Hidden field name to value, in document order.
pub type HiddenFields = IndexMap<String, String>;

static HIDDEN_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<input\s[^>]*\btype\s*=\s*"hidden"[^>]*>"#).expect("valid regex")
});

static NAME_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\sname\s*=\s*"([^"]+)""#).expect("valid regex"));

static VALUE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\svalue\s*=\s*"([^"]*)""#).expect("valid regex"));

pub trait HiddenFieldScraper: Send + Sync {
    fn scrape(&self, html: &str) -> HiddenFields;
}

/// Default scraper.
///
/// The login page carries two overlapping field sets (the login form and a
/// secondary widget); the login form comes first, so on duplicate names the
/// first occurrence wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexScraper;

impl HiddenFieldScraper for RegexScraper {
    fn scrape(&self, html: &str) -> HiddenFields {
        let mut fields = HiddenFields::new();

        for tag in HIDDEN_INPUT.find_iter(html) {
            let tag = tag.as_str();
            let Some(name) = NAME_ATTR.captures(tag).map(|c| c[1].to_string()) else {
                tracing::trace!(tag, "Skipping hidden input without a name");
                continue;
            };
            let value = VALUE_ATTR
                .captures(tag)
                .map(|c| c[1].to_string())
                .unwrap_or_default();

            tracing::trace!(name = %name, "Hidden field");
            fields.entry(name).or_insert(value);
        }

        fields
    }
}
