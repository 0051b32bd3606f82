//! PII redaction for confidential mode.
//!
//! Replaces personally identifying substrings in generated analysis text
//! with fixed placeholder tokens:
//!
//! | Pattern | Placeholder |
//! |---------|-------------|
//! | Russian phone numbers (`+7`/`8` prefixed) | [`PHONE_PLACEHOLDER`] |
//! | Email addresses | [`EMAIL_PLACEHOLDER`] |
//! | 10–12 digit tax-ID-like sequences | [`TAX_ID_PLACEHOLDER`] |
//!
//! Patterns are applied in that order: phone numbers first, so an
//! 11-digit `8`-prefixed number is recognized as a phone and not as a
//! tax ID.

use regex::Regex;
use std::sync::LazyLock;

pub const PHONE_PLACEHOLDER: &str = "[PHONE REMOVED]";
pub const EMAIL_PLACEHOLDER: &str = "[EMAIL REMOVED]";
pub const TAX_ID_PLACEHOLDER: &str = "[TAX ID REMOVED]";

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+7|8)[\s\-]?\(?\d{3}\)?[\s\-]?\d{3}[\s\-]?\d{2}[\s\-]?\d{2}")
        .expect("phone regex")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("email regex")
});

static TAX_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{10,12}\b").expect("tax id regex"));

/// Replace all PII-shaped substrings in `text` with placeholder tokens.
pub fn redact_pii(text: &str) -> String {
    let text = PHONE_RE.replace_all(text, PHONE_PLACEHOLDER);
    let text = EMAIL_RE.replace_all(&text, EMAIL_PLACEHOLDER);
    let text = TAX_ID_RE.replace_all(&text, TAX_ID_PLACEHOLDER);
    text.into_owned()
}
