//! Input validation applied before a claim is queued for checking.
use crate::config::Validation;
use crate::model::ClaimType;
use crate::text;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("claim is empty")]
    Empty,
    #[error("claim too short: minimum length is {min} characters")]
    TooShort { min: usize },
    #[error("claim too long: maximum length is {max} characters")]
    TooLong { max: usize },
    #[error("prohibited content detected")]
    Prohibited,
}

impl ValidationError {
    /// Reply text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::Empty => "❗️ متن ادعا خالی است. لطفاً متن خبر یا ادعا را ارسال کنید.".into(),
            ValidationError::TooShort { min } => {
                format!("❗️ متن ادعا خیلی کوتاه است. حداقل {} کاراکتر لازم است.", min)
            }
            ValidationError::TooLong { max } => {
                format!("❗️ متن ادعا خیلی طولانی است. حداکثر {} کاراکتر مجاز است.", max)
            }
            ValidationError::Prohibited => "⛔️ این محتوا قابل بررسی نیست.".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedClaim {
    pub text: String,
    pub language: String,
    pub claim_type: ClaimType,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Validator {
    min_len: usize,
    max_len: usize,
    prohibited: Vec<Regex>,
}

impl Validator {
    /// Patterns were checked by `config::validate`; invalid ones are skipped here.
    pub fn new(cfg: &Validation) -> Self {
        let prohibited = cfg
            .prohibited_patterns
            .iter()
            .filter_map(|p| RegexBuilder::new(p).case_insensitive(true).build().ok())
            .collect();
        Self {
            min_len: cfg.min_claim_length,
            max_len: cfg.max_claim_length,
            prohibited,
        }
    }

    pub fn validate(&self, raw: &str, claim_type: ClaimType) -> Result<ValidatedClaim, ValidationError> {
        let cleaned = text::clean_text(raw);
        if cleaned.is_empty() {
            return Err(ValidationError::Empty);
        }
        let len = cleaned.chars().count();
        if len < self.min_len {
            return Err(ValidationError::TooShort { min: self.min_len });
        }
        if len > self.max_len {
            return Err(ValidationError::TooLong { max: self.max_len });
        }
        if self.prohibited.iter().any(|re| re.is_match(&cleaned)) {
            return Err(ValidationError::Prohibited);
        }

        let urls = text::extract_urls(&cleaned);
        let claim_type = match claim_type {
            ClaimType::Text if urls.len() == 1 && urls[0] == cleaned => ClaimType::Link,
            other => other,
        };
        Ok(ValidatedClaim {
            language: text::detect_language(&cleaned).to_string(),
            text: cleaned,
            claim_type,
            urls,
        })
    }

    /// Comments attached to a fact check: 10 to 500 characters.
    pub fn validate_comment(&self, raw: &str) -> Option<String> {
        let cleaned = text::clean_text(raw);
        let len = cleaned.chars().count();
        (10..=500).contains(&len).then_some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new(&Validation::default())
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        let v = validator();
        assert_eq!(v.validate("", ClaimType::Text), Err(ValidationError::Empty));
        assert_eq!(v.validate("   \n\t", ClaimType::Text), Err(ValidationError::Empty));
    }

    #[test]
    fn enforces_length_bounds_in_chars() {
        let v = validator();
        assert_eq!(
            v.validate("too short", ClaimType::Text),
            Err(ValidationError::TooShort { min: 10 })
        );
        // ten Persian letters are ten chars even though they are 20 bytes
        assert!(v.validate("بببببببببب", ClaimType::Text).is_ok());
        let long = "a".repeat(1001);
        assert_eq!(
            v.validate(&long, ClaimType::Text),
            Err(ValidationError::TooLong { max: 1000 })
        );
    }

    #[test]
    fn prohibited_patterns_are_case_insensitive() {
        let v = validator();
        assert_eq!(
            v.validate("Leaked PRIVATE   Information about someone", ClaimType::Text),
            Err(ValidationError::Prohibited)
        );
    }

    #[test]
    fn single_url_text_becomes_link_claim() {
        let v = validator();
        let ok = v
            .validate("https://example.com/news/1", ClaimType::Text)
            .unwrap();
        assert_eq!(ok.claim_type, ClaimType::Link);
        assert_eq!(ok.urls, vec!["https://example.com/news/1"]);

        let ok = v
            .validate("read this https://example.com/news/1 please", ClaimType::Text)
            .unwrap();
        assert_eq!(ok.claim_type, ClaimType::Text);

        let ok = v
            .validate("https://example.com/news/1", ClaimType::Image)
            .unwrap();
        assert_eq!(ok.claim_type, ClaimType::Image);
    }

    #[test]
    fn validated_claim_carries_language() {
        let v = validator();
        let ok = v
            .validate("تهران پرجمعیت‌ترین شهر ایران است", ClaimType::Text)
            .unwrap();
        assert_eq!(ok.language, "fa");
    }

    #[test]
    fn comment_bounds() {
        let v = validator();
        assert!(v.validate_comment("short").is_none());
        assert_eq!(
            v.validate_comment("  this result looks right  ").as_deref(),
            Some("this result looks right")
        );
        assert!(v.validate_comment(&"x".repeat(501)).is_none());
    }
}
