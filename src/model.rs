use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generates `as_str`/`parse` for enums stored as TEXT columns.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimType {
    Text,
    Image,
    Video,
    Voice,
    Document,
    Link,
}

text_enum!(ClaimType {
    Text => "TEXT",
    Image => "IMAGE",
    Video => "VIDEO",
    Voice => "VOICE",
    Document => "DOCUMENT",
    Link => "LINK",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

text_enum!(ClaimStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Verified,
    False,
    PartiallyTrue,
    Unverified,
    Misleading,
}

text_enum!(VerificationStatus {
    Verified => "VERIFIED",
    False => "FALSE",
    PartiallyTrue => "PARTIALLY_TRUE",
    Unverified => "UNVERIFIED",
    Misleading => "MISLEADING",
});

impl VerificationStatus {
    pub const ALL: [VerificationStatus; 5] = [
        VerificationStatus::Verified,
        VerificationStatus::False,
        VerificationStatus::PartiallyTrue,
        VerificationStatus::Unverified,
        VerificationStatus::Misleading,
    ];

    pub fn emoji(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "✅",
            VerificationStatus::False => "❌",
            VerificationStatus::PartiallyTrue => "⚠️",
            VerificationStatus::Unverified => "❓",
            VerificationStatus::Misleading => "⚠️",
        }
    }

    /// Persian label shown to users.
    pub fn label(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "تأیید شده",
            VerificationStatus::False => "نادرست",
            VerificationStatus::PartiallyTrue => "نسبتاً درست",
            VerificationStatus::Unverified => "غیرقابل تأیید",
            VerificationStatus::Misleading => "گمراه‌کننده",
        }
    }

    /// Weight of this verdict when folding reviews into a credibility score.
    pub fn credibility_weight(&self) -> f64 {
        match self {
            VerificationStatus::Verified => 1.0,
            VerificationStatus::PartiallyTrue => 0.5,
            VerificationStatus::False => 0.0,
            VerificationStatus::Unverified => 0.5,
            VerificationStatus::Misleading => 0.25,
        }
    }

    /// Verdicts strong enough to be cited as evidence for a new claim.
    pub fn is_decisive(&self) -> bool {
        matches!(self, VerificationStatus::Verified | VerificationStatus::False)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    News,
    Academic,
    Government,
    FactCheck,
}

text_enum!(SourceType {
    News => "NEWS",
    Academic => "ACADEMIC",
    Government => "GOVERNMENT",
    FactCheck => "FACT_CHECK",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Agree,
    Disagree,
}

text_enum!(FeedbackType {
    Agree => "AGREE",
    Disagree => "DISAGREE",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Incorrect,
    Inappropriate,
    Misleading,
    Spam,
    Other,
}

text_enum!(ReportType {
    Incorrect => "INCORRECT",
    Inappropriate => "INAPPROPRIATE",
    Misleading => "MISLEADING",
    Spam => "SPAM",
    Other => "OTHER",
});

impl ReportType {
    pub fn label(&self) -> &'static str {
        match self {
            ReportType::Incorrect => "❌ اطلاعات نادرست",
            ReportType::Inappropriate => "⚠️ محتوای نامناسب",
            ReportType::Misleading => "🔗 منابع نامعتبر",
            ReportType::Spam => "🚫 هرزنامه",
            ReportType::Other => "🔄 سایر موارد",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportStatus {
    Pending,
    Reviewing,
    Resolved,
    Rejected,
}

text_enum!(ReportStatus {
    Pending => "PENDING",
    Reviewing => "REVIEWING",
    Resolved => "RESOLVED",
    Rejected => "REJECTED",
});

/// What the bot expects the next text message from a user to be.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PendingInputKind {
    Comment,
    Report,
}

text_enum!(PendingInputKind {
    Comment => "COMMENT",
    Report => "REPORT",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub language_code: String,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    pub claim_text: String,
    pub claim_type: ClaimType,
    pub language: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceKind {
    FactCheck,
    SimilarClaim,
    Source,
}

/// One supporting item shown under "reasons" in a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
    pub credibility_score: f64,
}

/// A source listed in a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub credibility_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactCheck {
    pub id: i64,
    pub claim_id: i64,
    pub claim_text: String,
    pub verification_status: VerificationStatus,
    pub credibility_score: f64,
    pub summary: String,
    pub evidence: Vec<Evidence>,
    pub sources: Vec<SourceRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub domain: String,
    pub source_type: SourceType,
    pub base_credibility: f64,
    pub is_active: bool,
}

/// A previously completed claim used for similarity matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorCheck {
    pub claim_id: i64,
    pub claim_text: String,
    pub fact_check_id: i64,
    pub verification_status: VerificationStatus,
    pub credibility_score: f64,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserStats {
    pub total_checks: i64,
    pub verified_count: i64,
    pub false_count: i64,
    pub unknown_count: i64,
    pub join_date: DateTime<Utc>,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckJob {
    pub id: i64,
    pub claim_id: i64,
    pub attempt: i32,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingInput {
    pub kind: PendingInputKind,
    pub fact_check_id: i64,
    /// Set for `Report`: the report the description belongs to.
    pub report_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enums_round_trip_through_storage_strings() {
        for s in VerificationStatus::ALL {
            assert_eq!(VerificationStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ClaimType::parse("LINK"), Some(ClaimType::Link));
        assert_eq!(ClaimStatus::parse("processing"), None);
        assert_eq!(ReportType::Spam.to_string(), "SPAM");
    }

    #[test]
    fn verification_status_serializes_like_storage() {
        let json = serde_json::to_string(&VerificationStatus::PartiallyTrue).unwrap();
        assert_eq!(json, "\"PARTIALLY_TRUE\"");
    }

    #[test]
    fn decisive_verdicts() {
        assert!(VerificationStatus::Verified.is_decisive());
        assert!(VerificationStatus::False.is_decisive());
        assert!(!VerificationStatus::Misleading.is_decisive());
    }
}
