//! Inline keyboards and the compact JSON payload carried by their buttons.
use crate::model::{FeedbackType, ReportType};
use anyhow::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Telegram limits `callback_data` to 64 bytes.
pub const MAX_CALLBACK_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    #[serde(rename = "menu:main")]
    MenuMain,
    #[serde(rename = "menu:text")]
    MenuText,
    #[serde(rename = "menu:image")]
    MenuImage,
    #[serde(rename = "menu:video")]
    MenuVideo,
    #[serde(rename = "menu:voice")]
    MenuVoice,
    #[serde(rename = "menu:document")]
    MenuDocument,
    #[serde(rename = "menu:link")]
    MenuLink,
    #[serde(rename = "menu:settings")]
    MenuSettings,
    #[serde(rename = "menu:help")]
    MenuHelp,
    #[serde(rename = "details")]
    Details,
    #[serde(rename = "share")]
    Share,
    #[serde(rename = "feedback")]
    Feedback,
    #[serde(rename = "comment")]
    Comment,
    #[serde(rename = "report")]
    Report,
    #[serde(rename = "report_type")]
    ReportType,
    #[serde(rename = "recheck")]
    Recheck,
    #[serde(rename = "cancel")]
    Cancel,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallbackData {
    #[serde(rename = "a")]
    pub action: Action,
    /// Fact check id for result actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub vote: Option<FeedbackType>,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub report_type: Option<ReportType>,
}

impl CallbackData {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            id: None,
            vote: None,
            report_type: None,
        }
    }

    pub fn for_fact_check(action: Action, id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::new(action)
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

fn button(text: &str, data: CallbackData) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, data.encode())
}

fn menu(text: &str, action: Action) -> InlineKeyboardButton {
    button(text, CallbackData::new(action))
}

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            menu("📝 ارسال متن", Action::MenuText),
            menu("🖼 ارسال تصویر", Action::MenuImage),
        ],
        vec![
            menu("🎥 ارسال ویدیو", Action::MenuVideo),
            menu("🎤 ارسال صدا", Action::MenuVoice),
        ],
        vec![
            menu("📄 ارسال سند", Action::MenuDocument),
            menu("🔗 ارسال لینک", Action::MenuLink),
        ],
        vec![
            menu("⚙️ تنظیمات", Action::MenuSettings),
            menu("❓ راهنما", Action::MenuHelp),
        ],
    ])
}

pub fn result(fact_check_id: i64) -> InlineKeyboardMarkup {
    let fc = |action| CallbackData::for_fact_check(action, fact_check_id);
    let vote = |v| CallbackData {
        vote: Some(v),
        ..fc(Action::Feedback)
    };
    InlineKeyboardMarkup::new(vec![
        vec![
            button("📊 جزئیات بیشتر", fc(Action::Details)),
            button("📤 اشتراک‌گذاری", fc(Action::Share)),
        ],
        vec![
            button("👍 موافقم", vote(FeedbackType::Agree)),
            button("👎 مخالفم", vote(FeedbackType::Disagree)),
        ],
        vec![
            button("✍️ ثبت نظر", fc(Action::Comment)),
            button("⚠️ گزارش مشکل", fc(Action::Report)),
        ],
        vec![
            button("🔄 بررسی مجدد", fc(Action::Recheck)),
            menu("🏠 منوی اصلی", Action::MenuMain),
        ],
    ])
}

pub fn report_types(fact_check_id: i64) -> InlineKeyboardMarkup {
    let t = |report_type: ReportType| {
        button(
            report_type.label(),
            CallbackData {
                report_type: Some(report_type),
                ..CallbackData::for_fact_check(Action::ReportType, fact_check_id)
            },
        )
    };
    InlineKeyboardMarkup::new(vec![
        vec![t(ReportType::Incorrect), t(ReportType::Misleading)],
        vec![t(ReportType::Inappropriate), t(ReportType::Spam)],
        vec![t(ReportType::Other)],
        vec![button(
            "↩️ بازگشت",
            CallbackData::for_fact_check(Action::Details, fact_check_id),
        )],
    ])
}

/// Back to the result details, or cancel the pending prompt.
pub fn back_or_cancel(fact_check_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button(
            "↩️ بازگشت",
            CallbackData::for_fact_check(Action::Details, fact_check_id),
        ),
        button(
            "❌ انصراف",
            CallbackData::for_fact_check(Action::Cancel, fact_check_id),
        ),
    ]])
}

pub fn share_url(share_text: &str, bot_username: &str) -> Result<Url> {
    let bot_link = format!("https://t.me/{}", bot_username.trim_start_matches('@'));
    let url = Url::parse_with_params(
        "https://t.me/share/url",
        &[("url", bot_link.as_str()), ("text", share_text)],
    )?;
    Ok(url)
}

pub fn share(fact_check_id: i64, url: Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::url("📤 اشتراک در تلگرام", url)],
        vec![button(
            "↩️ بازگشت",
            CallbackData::for_fact_check(Action::Details, fact_check_id),
        )],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_payloads(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn encoding_is_compact() {
        let data = CallbackData::for_fact_check(Action::Details, 42);
        assert_eq!(data.encode(), r#"{"a":"details","id":42}"#);
        assert_eq!(
            CallbackData::new(Action::MenuHelp).encode(),
            r#"{"a":"menu:help"}"#
        );
    }

    #[test]
    fn decode_round_trip_and_garbage() {
        let data = CallbackData {
            vote: Some(FeedbackType::Disagree),
            ..CallbackData::for_fact_check(Action::Feedback, 7)
        };
        assert_eq!(data.encode(), r#"{"a":"feedback","id":7,"v":"disagree"}"#);
        assert_eq!(CallbackData::decode(&data.encode()), Some(data));
        assert_eq!(CallbackData::decode("not json"), None);
        assert_eq!(CallbackData::decode(r#"{"a":"unknown"}"#), None);
    }

    #[test]
    fn payloads_fit_telegram_limit_even_for_large_ids() {
        let id = i64::MAX;
        for markup in [result(id), report_types(id), back_or_cancel(id), main_menu()] {
            for payload in callback_payloads(&markup) {
                assert!(
                    payload.len() <= MAX_CALLBACK_BYTES,
                    "{} is {} bytes",
                    payload,
                    payload.len()
                );
            }
        }
    }

    #[test]
    fn result_keyboard_layout() {
        let payloads = callback_payloads(&result(5));
        assert_eq!(payloads.len(), 8);
        assert!(payloads.contains(&r#"{"a":"feedback","id":5,"v":"agree"}"#.to_string()));
        assert!(payloads.contains(&r#"{"a":"recheck","id":5}"#.to_string()));
    }

    #[test]
    fn share_link_encodes_text() {
        let url = share_url("نتیجه & more", "@factchecker_bot").unwrap();
        assert_eq!(url.host_str(), Some("t.me"));
        assert_eq!(url.path(), "/share/url");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("url".into(), "https://t.me/factchecker_bot".into()));
        assert_eq!(pairs[1], ("text".into(), "نتیجه & more".into()));
    }
}
