//! Renders fact-check results for Telegram, JSON and plain text.
use crate::analyzer::AnalysisResult;
use crate::db::FeedbackCounts;
use crate::model::{Evidence, EvidenceKind, FactCheck, SourceRef, UserStats, VerificationStatus};
use crate::text;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Telegram rejects messages longer than this.
pub const TELEGRAM_MAX_CHARS: usize = 4096;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NO_EVIDENCE: &str = "شواهد کافی برای بررسی این ادعا یافت نشد";
const NO_SOURCES: &str = "منابع معتبر مرتبط یافت نشد";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Telegram,
    Json,
    Text,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "telegram" => Ok(Format::Telegram),
            "json" => Ok(Format::Json),
            "text" => Ok(Format::Text),
            other => Err(format!("unsupported format type: {}", other)),
        }
    }
}

/// Borrowed view over either a fresh analysis or a stored fact check.
#[derive(Debug, Clone, Copy)]
pub struct ReportView<'a> {
    pub claim_text: &'a str,
    pub verification_status: VerificationStatus,
    pub credibility_score: f64,
    pub summary: &'a str,
    pub evidence: &'a [Evidence],
    pub sources: &'a [SourceRef],
    pub analyzed_at: DateTime<Utc>,
}

impl<'a> From<&'a AnalysisResult> for ReportView<'a> {
    fn from(r: &'a AnalysisResult) -> Self {
        Self {
            claim_text: &r.claim_text,
            verification_status: r.verification_status,
            credibility_score: r.credibility_score,
            summary: &r.summary,
            evidence: &r.evidence,
            sources: &r.sources,
            analyzed_at: r.analyzed_at,
        }
    }
}

impl<'a> From<&'a FactCheck> for ReportView<'a> {
    fn from(f: &'a FactCheck) -> Self {
        Self {
            claim_text: &f.claim_text,
            verification_status: f.verification_status,
            credibility_score: f.credibility_score,
            summary: &f.summary,
            evidence: &f.evidence,
            sources: &f.sources,
            analyzed_at: f.created_at,
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    claim: &'a str,
    verification_status: VerificationStatus,
    credibility_score: f64,
    summary: &'a str,
    evidence: &'a [Evidence],
    sources: &'a [SourceRef],
    analyzed_at: String,
}

pub fn render(view: &ReportView<'_>, format: Format) -> Result<String> {
    Ok(match format {
        Format::Telegram => telegram(view),
        Format::Json => serde_json::to_string_pretty(&JsonReport {
            claim: view.claim_text,
            verification_status: view.verification_status,
            credibility_score: view.credibility_score,
            summary: view.summary,
            evidence: view.evidence,
            sources: view.sources,
            analyzed_at: view.analyzed_at.to_rfc3339(),
        })?,
        Format::Text => plain_text(view),
    })
}

fn telegram(view: &ReportView<'_>) -> String {
    let status = view.verification_status;
    let mut summary = view.summary.to_string();
    if let Some(first) = view.evidence.first() {
        summary.push('\n');
        summary.push_str(&first.content);
    }

    let report = [
        "🔍 فکت‌چک ادعا:".to_string(),
        format!("\"{}\"", view.claim_text),
        String::new(),
        format!("{} نتیجه بررسی: {}", status.emoji(), status.label()),
        format!("📊 درجه صحت: {}%", text::percentage(view.credibility_score)),
        String::new(),
        "⚡️ خلاصه سریع:".to_string(),
        summary,
        String::new(),
        "🔎 دلایل:".to_string(),
        format_evidence(view.evidence),
        String::new(),
        "📚 منابع معتبر:".to_string(),
        format_sources(view.sources),
        String::new(),
        format!("🔄 آخرین به‌روزرسانی: {}", view.analyzed_at.format(DATE_FORMAT)),
    ]
    .join("\n");

    text::truncate_text(&report, TELEGRAM_MAX_CHARS, "...")
}

fn plain_text(view: &ReportView<'_>) -> String {
    [
        "Fact Check Report".to_string(),
        "================".to_string(),
        format!("Claim: {}", view.claim_text),
        format!("Status: {}", view.verification_status),
        format!("Credibility: {}%", text::percentage(view.credibility_score)),
        String::new(),
        "Evidence:".to_string(),
        format_evidence(view.evidence),
        String::new(),
        "Sources:".to_string(),
        format_sources(view.sources),
        String::new(),
        format!("Analysis Date: {}", view.analyzed_at.format(DATE_FORMAT)),
    ]
    .join("\n")
}

fn format_evidence(evidence: &[Evidence]) -> String {
    if evidence.is_empty() {
        return NO_EVIDENCE.to_string();
    }
    evidence
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let n = i + 1;
            let label = e.verification_status.map(|s| s.label()).unwrap_or("");
            match e.kind {
                EvidenceKind::FactCheck => format!(
                    "{}. {}: {} ({})",
                    n,
                    e.publisher.as_deref().unwrap_or("فکت‌چکر"),
                    e.content,
                    label
                ),
                EvidenceKind::SimilarClaim => {
                    format!("{}. ادعای مشابه: {} ({})", n, e.content, label)
                }
                EvidenceKind::Source => format!(
                    "{}. {} (اعتبار منبع: {}%)",
                    n,
                    e.content,
                    text::percentage(e.credibility_score)
                ),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_sources(sources: &[SourceRef]) -> String {
    if sources.is_empty() {
        return NO_SOURCES.to_string();
    }
    sources
        .iter()
        .map(|s| match &s.url {
            Some(url) => format!("• {}\n  {}", s.title, url),
            None => format!("• {}", s.title),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text placed in the Telegram share link.
pub fn share_text(view: &ReportView<'_>, bot_username: &str) -> String {
    let status = view.verification_status;
    format!(
        "🔍 نتیجه راستی‌آزمایی\n\n\
         ادعا: {}\n\n\
         {} نتیجه: {}\n\
         📊 درصد اطمینان: {}%\n\n\
         📝 خلاصه تحلیل:\n{}\n\n\
         🤖 بررسی شده توسط ربات فکت‌چکر @{}",
        text::truncate_text(view.claim_text, 300, "..."),
        status.emoji(),
        status.label(),
        text::percentage(view.credibility_score),
        view.summary,
        bot_username.trim_start_matches('@'),
    )
}

/// Expanded view for the "details" button: every evidence item with links
/// plus the community feedback tally.
pub fn detailed_text(view: &ReportView<'_>, feedback: FeedbackCounts) -> String {
    let status = view.verification_status;
    let mut lines = vec![
        "📋 جزئیات بررسی".to_string(),
        String::new(),
        format!("ادعا: {}", view.claim_text),
        format!("{} نتیجه: {}", status.emoji(), status.label()),
        format!("📊 درجه صحت: {}%", text::percentage(view.credibility_score)),
        String::new(),
        "🔎 شواهد:".to_string(),
    ];
    if view.evidence.is_empty() {
        lines.push(NO_EVIDENCE.to_string());
    }
    for e in view.evidence {
        let mut line = format!("• {}", e.content);
        if let Some(s) = e.verification_status {
            line.push_str(&format!("\n  نتیجه: {}", s.label()));
        }
        if let Some(p) = &e.publisher {
            line.push_str(&format!("\n  ناشر: {}", p));
        }
        if let Some(url) = &e.url {
            line.push_str(&format!("\n  {}", url));
        }
        lines.push(line);
    }
    lines.push(String::new());
    lines.push("📚 منابع:".to_string());
    lines.push(format_sources(view.sources));
    lines.push(String::new());
    lines.push(format!(
        "👥 بازخورد کاربران: 👍 {} | 👎 {}",
        feedback.agree, feedback.disagree
    ));
    lines.push(format!(
        "🔄 آخرین به‌روزرسانی: {}",
        view.analyzed_at.format(DATE_FORMAT)
    ));
    text::truncate_text(&lines.join("\n"), TELEGRAM_MAX_CHARS, "...")
}

pub fn stats_text(stats: &UserStats) -> String {
    let last = stats
        .last_activity
        .map(|t| t.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "📊 آمار بررسی‌های شما:\n\n\
         🔸 تعداد کل بررسی‌ها: {}\n\
         🔸 تأیید شده: {}\n\
         🔸 رد شده: {}\n\
         🔸 نامشخص: {}\n\n\
         📅 تاریخ عضویت: {}\n\
         ⌛️ آخرین فعالیت: {}",
        stats.total_checks,
        stats.verified_count,
        stats.false_count,
        stats.unknown_count,
        stats.join_date.format("%Y-%m-%d"),
        last,
    )
}

pub fn failure_text() -> &'static str {
    "❌ متأسفانه بررسی این ادعا با خطا مواجه شد. لطفاً بعداً دوباره تلاش کنید."
}
