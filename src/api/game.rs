use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::*;

pub type Tokens = u64;
pub type QuestionId = String;
pub type BetId = String;
pub type UserId = String;
pub type SuggestionId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOption {
    pub label: String,
    #[serde(default, alias = "tokens", deserialize_with = "lenient_tokens")]
    pub votes: Tokens,
    #[serde(default = "default_odds", deserialize_with = "lenient_odds")]
    pub odds: Decimal,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "_id", alias = "id")]
    pub id: QuestionId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Unresolved,
    Resolved(&'a str),
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: BetId,
    #[serde(default)]
    pub user: UserId,
    #[serde(alias = "questionId")]
    pub question: QuestionId,
    pub option: String,
    pub amount: Tokens,
    #[serde(
        default = "default_odds",
        alias = "multiplier",
        deserialize_with = "lenient_odds"
    )]
    pub odds: Decimal,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub won: bool,
    #[serde(default)]
    pub winnings: Tokens,
    #[serde(default, alias = "timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub tokens: Tokens,
    #[serde(default)]
    pub winnings: Tokens,
    #[serde(default)]
    pub role: Role,
}
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggester {
    pub username: String,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(rename = "_id", alias = "id")]
    pub id: SuggestionId,
    pub question_text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub multipliers: Vec<Decimal>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub status: SuggestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_by: Option<Suggester>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeaderboardEntry {
    pub username: String,
    #[serde(default)]
    pub tokens: Tokens,
    #[serde(default)]
    pub winnings: Tokens,
}
