//! Text normalization and comparison helpers shared by the validator,
//! analyzer and reporter.
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use std::collections::HashSet;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'()]+"#).expect("static url regex"));

/// Strip control characters, collapse whitespace, unify Arabic/Persian
/// letter forms and map Arabic-Indic and Persian digits to ASCII.
pub fn clean_text(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|c| match c {
            'ي' => 'ی',
            'ك' => 'ک',
            '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
            '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
            c if c.is_control() => ' ',
            c => c,
        })
        // zero-width non-joiner is meaningful in Persian words; other format chars are not
        .filter(|c| !matches!(c, '\u{200B}' | '\u{FEFF}' | '\u{200E}' | '\u{200F}'))
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rough script-based language guess: `fa`, `ar`, `en` or `unknown`.
pub fn detect_language(text: &str) -> &'static str {
    let total = text.chars().count();
    if total == 0 {
        return "unknown";
    }
    let threshold = total as f64 * 0.3;
    let count = |pred: fn(char) -> bool| text.chars().filter(|c| pred(*c)).count() as f64;

    if count(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) > threshold {
        return "fa";
    }
    if count(|c| ('\u{0627}'..='\u{064A}').contains(&c)) > threshold {
        return "ar";
    }
    if count(|c| c.is_ascii_alphabetic()) > threshold {
        return "en";
    }
    "unknown"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Similarity {
    Cosine,
    Jaccard,
}

fn word_set(text: &str) -> HashSet<String> {
    clean_text(&text.to_lowercase())
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Word-set similarity in [0, 1].
pub fn similarity(a: &str, b: &str, method: Similarity) -> f64 {
    let wa = word_set(a);
    let wb = word_set(b);
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let shared = wa.intersection(&wb).count() as f64;
    match method {
        // binary vectors: dot = |A∩B|, norms = sqrt(|A|), sqrt(|B|)
        Similarity::Cosine => shared / ((wa.len() as f64).sqrt() * (wb.len() as f64).sqrt()),
        Similarity::Jaccard => shared / wa.union(&wb).count() as f64,
    }
}

pub fn extract_urls(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', '!', '?', ';']).to_string())
        .collect()
}

pub fn is_valid_url(s: &str) -> bool {
    match Url::parse(s.trim()) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Lowercased host without a leading `www.`.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_owned).unwrap_or(host))
}

/// Cut `text` to at most `max_chars` characters, preferring a word boundary.
pub fn truncate_text(text: &str, max_chars: usize, suffix: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(suffix.chars().count());
    let head: String = text.chars().take(keep).collect();
    let cut = match head.rfind(' ') {
        Some(idx) if idx > 0 => &head[..idx],
        _ => head.as_str(),
    };
    format!("{}{}", cut, suffix)
}

/// `0.8567` -> `85.7`
pub fn percentage(value: f64) -> f64 {
    (value * 1000.0).round() / 10.0
}
