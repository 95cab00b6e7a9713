use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::*;

// Requests
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct QuestionRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub tags: Vec<String>,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub correct_option: String,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetRequest {
    pub question_id: QuestionId,
    pub option: String,
    pub amount: Tokens,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub question_text: String,
    pub options: Vec<String>,
    pub multipliers: Vec<Decimal>,
    #[serde(default)]
    pub tags: Vec<String>,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ApproveSuggestionRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub tags: Vec<String>,
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SuggestionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SuggestionStatus>,
}
