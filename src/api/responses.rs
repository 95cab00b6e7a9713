use serde::{Deserialize, Serialize};

use super::*;

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBetResponse {
    pub bet: Bet,
    pub tokens: Tokens,
}
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct MessageResponse {
    pub message: String,
}
