use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use anyhow::bail;

use super::*;

impl Question {
    pub fn resolution(&self) -> Resolution<'_> {
        match (self.is_resolved, self.correct_option.as_deref()) {
            (true, Some(correct)) => Resolution::Resolved(correct),
            _ => Resolution::Unresolved,
        }
    }
    pub fn option(&self, label: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|option| option.label == label)
    }
    pub fn pool(&self) -> Tokens {
        self.options.iter().map(|option| option.votes).sum()
    }
}
impl Display for Resolution<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unresolved => write!(f, "Open"),
            Self::Resolved(correct) => write!(f, "Resolved({})", correct),
        }
    }
}
impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::User => "user",
            Self::Admin => "admin",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            e => bail!("Couldn't deserialize to Role: {}", e),
        }
    }
}
impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}
impl Display for SuggestionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for SuggestionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            e => bail!("Couldn't deserialize to SuggestionStatus: {}", e),
        }
    }
}
