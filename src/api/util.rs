use std::str::FromStr;

use log::trace;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{MessageResponse, Tokens};

pub fn default_odds() -> Decimal {
    dec!(1.5)
}
pub fn lenient_tokens<'de, D>(deserializer: D) -> Result<Tokens, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let tokens = match &value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as Tokens)
        }),
        Value::String(s) => s.trim().parse::<Tokens>().ok(),
        _ => None,
    };
    if tokens.is_none() && !value.is_null() {
        trace!("Treating wager counter {} as 0", value);
    }
    Ok(tokens.unwrap_or(0))
}
pub fn lenient_odds<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let odds = match &value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
    .filter(|odds| odds.is_sign_positive() && !odds.is_zero());
    if odds.is_none() && !value.is_null() {
        trace!("Treating odds {} as {}", value, default_odds());
    }
    Ok(odds.unwrap_or_else(default_odds))
}
pub fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<MessageResponse>(body)
        .ok()
        .map(|response| response.message)
        .filter(|message| !message.trim().is_empty())
}
