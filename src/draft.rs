use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{debug, trace};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::api::{PlaceBetRequest, Question, QuestionId, Resolution, Tokens};
use crate::odds;

pub const INVALID_AMOUNT: &str = "Enter a valid amount!";

// Attempt numbers are unique across drafts, so an outcome can never be
// mistaken for a later attempt on a reopened card.
static NEXT_ATTEMPT: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftTimings {
    pub notice: Duration,
    pub placed: Duration,
}
impl Default for DraftTimings {
    fn default() -> Self {
        Self {
            notice: Duration::from_secs(2),
            placed: Duration::from_secs(2),
        }
    }
}
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub option: String,
    pub multiplier: Decimal,
    pub amount: Tokens,
    pub potential_win: Decimal,
}
impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} @ x{} | stake {} | win {} tokens",
            self.option, self.multiplier, self.amount, self.potential_win
        )
    }
}
#[derive(Debug, Clone, PartialEq)]
pub enum DraftState {
    Collapsed,
    Expanded,
    OptionSelected { option: String },
    AwaitingConfirmation { summary: Summary },
    Submitting { summary: Summary },
    Placed { summary: Summary, until: Instant },
    Failed { option: String, reason: String },
}
impl Display for DraftState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Collapsed => "Collapsed",
            Self::Expanded => "Expanded",
            Self::OptionSelected { .. } => "OptionSelected",
            Self::AwaitingConfirmation { .. } => "AwaitingConfirmation",
            Self::Submitting { .. } => "Submitting",
            Self::Placed { .. } => "Placed",
            Self::Failed { .. } => "Failed",
        };
        write!(f, "{}", output)
    }
}
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub until: Instant,
}
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DraftError {
    #[error("Open the question first")]
    Collapsed,
    #[error("Choose an option first")]
    NoOption,
    #[error("There is no option \"{0}\"")]
    UnknownOption(String),
    #[error("Enter a valid amount!")]
    InvalidAmount,
    #[error("This question has already been resolved")]
    Resolved,
    #[error("Your bet is still being placed")]
    InFlight,
    #[error("Confirm the bet first")]
    NotConfirmed,
}

#[derive(Debug, Clone)]
pub struct BetDraft {
    question: QuestionId,
    state: DraftState,
    amount: String,
    notice: Option<Notice>,
    attempt: u64,
    timings: DraftTimings,
}

impl BetDraft {
    pub fn open(question: QuestionId, timings: DraftTimings) -> Self {
        Self {
            question,
            state: DraftState::Expanded,
            amount: String::new(),
            notice: None,
            attempt: 0,
            timings,
        }
    }
    pub fn question(&self) -> &QuestionId {
        &self.question
    }
    pub fn state(&self) -> &DraftState {
        &self.state
    }
    pub fn amount(&self) -> &str {
        &self.amount
    }
    pub fn attempt(&self) -> u64 {
        self.attempt
    }
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|notice| notice.text.as_str())
    }
    pub fn selected_option(&self) -> Option<&str> {
        match &self.state {
            DraftState::OptionSelected { option } | DraftState::Failed { option, .. } => {
                Some(option)
            }
            DraftState::AwaitingConfirmation { summary } | DraftState::Submitting { summary } => {
                Some(&summary.option)
            }
            DraftState::Collapsed | DraftState::Expanded | DraftState::Placed { .. } => None,
        }
    }
    pub fn confirmation_pending(&self) -> bool {
        matches!(self.state, DraftState::AwaitingConfirmation { .. })
    }
    pub fn is_submitting(&self) -> bool {
        matches!(self.state, DraftState::Submitting { .. })
    }
    pub fn placed(&self) -> bool {
        matches!(self.state, DraftState::Placed { .. })
    }
    pub fn summary(&self) -> Option<&Summary> {
        match &self.state {
            DraftState::AwaitingConfirmation { summary }
            | DraftState::Submitting { summary }
            | DraftState::Placed { summary, .. } => Some(summary),
            _ => None,
        }
    }
    pub fn error(&self) -> Option<&str> {
        match &self.state {
            DraftState::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
    pub fn preview(&self, question: &Question) -> Option<Decimal> {
        let option = self.selected_option()?;
        let amount = self.amount.parse::<Tokens>().ok()?;
        let multiplier = odds::multiplier_of(&question.options, option)?;
        Some(odds::potential_win(amount, multiplier))
    }

    pub fn select_option(&mut self, question: &Question, label: &str) -> Result<(), DraftError> {
        match self.state {
            DraftState::Collapsed => return Err(DraftError::Collapsed),
            DraftState::Submitting { .. } => return Err(DraftError::InFlight),
            _ => {}
        }
        if let Resolution::Resolved(_) = question.resolution() {
            return Err(DraftError::Resolved);
        }
        if question.option(label).is_none() {
            return Err(DraftError::UnknownOption(label.to_string()));
        }
        trace!("Draft {} selected option {}", self.question, label);
        self.state = DraftState::OptionSelected {
            option: label.to_string(),
        };
        Ok(())
    }
    pub fn enter_amount(&mut self, raw: &str) -> Result<&str, DraftError> {
        let option = match &self.state {
            DraftState::Collapsed => return Err(DraftError::Collapsed),
            DraftState::Submitting { .. } => return Err(DraftError::InFlight),
            DraftState::Expanded | DraftState::Placed { .. } => return Err(DraftError::NoOption),
            DraftState::OptionSelected { option } | DraftState::Failed { option, .. } => {
                option.clone()
            }
            DraftState::AwaitingConfirmation { summary } => summary.option.clone(),
        };
        self.amount = raw.chars().filter(char::is_ascii_digit).collect();
        self.state = DraftState::OptionSelected { option };
        Ok(&self.amount)
    }
    pub fn request_confirmation(
        &mut self,
        question: &Question,
        now: Instant,
    ) -> Result<Summary, DraftError> {
        let option = match &self.state {
            DraftState::Collapsed => return Err(DraftError::Collapsed),
            DraftState::Submitting { .. } => return Err(DraftError::InFlight),
            DraftState::Expanded => {
                self.flag(DraftError::NoOption.to_string(), now);
                return Err(DraftError::NoOption);
            }
            DraftState::Placed { .. } => return Err(DraftError::NoOption),
            DraftState::OptionSelected { option } | DraftState::Failed { option, .. } => {
                option.clone()
            }
            DraftState::AwaitingConfirmation { summary } => summary.option.clone(),
        };
        if let Resolution::Resolved(_) = question.resolution() {
            return Err(DraftError::Resolved);
        }
        let amount = match self.amount.parse::<Tokens>() {
            Ok(amount) if amount > 0 => amount,
            _ => {
                debug!(
                    "Rejected amount \"{}\" on question {}",
                    self.amount, self.question
                );
                self.flag(INVALID_AMOUNT.to_string(), now);
                return Err(DraftError::InvalidAmount);
            }
        };
        let multiplier = odds::multiplier_of(&question.options, &option)
            .ok_or_else(|| DraftError::UnknownOption(option.clone()))?;
        let summary = Summary {
            potential_win: odds::potential_win(amount, multiplier),
            option,
            multiplier,
            amount,
        };
        self.notice = None;
        self.state = DraftState::AwaitingConfirmation {
            summary: summary.clone(),
        };
        Ok(summary)
    }
    pub fn begin_submission(&mut self) -> Result<(PlaceBetRequest, u64), DraftError> {
        let summary = match &self.state {
            DraftState::AwaitingConfirmation { summary } => summary.clone(),
            DraftState::Submitting { .. } => return Err(DraftError::InFlight),
            DraftState::Collapsed => return Err(DraftError::Collapsed),
            _ => return Err(DraftError::NotConfirmed),
        };
        self.attempt = NEXT_ATTEMPT.fetch_add(1, Ordering::Relaxed);
        let request = PlaceBetRequest {
            question_id: self.question.clone(),
            option: summary.option.clone(),
            amount: summary.amount,
        };
        self.state = DraftState::Submitting { summary };
        Ok((request, self.attempt))
    }
    // Returns false when the outcome belongs to an attempt this draft no
    // longer waits for.
    pub fn submission_succeeded(&mut self, attempt: u64, now: Instant) -> bool {
        let summary = match &self.state {
            DraftState::Submitting { summary } if attempt == self.attempt => summary.clone(),
            _ => return false,
        };
        let until = now + self.timings.placed;
        self.notice = Some(Notice {
            text: format!(
                "Bet placed on \"{}\"! (-{} tokens, +{} win)",
                summary.option, summary.amount, summary.potential_win
            ),
            until,
        });
        self.state = DraftState::Placed { summary, until };
        true
    }
    pub fn submission_failed(&mut self, attempt: u64, reason: String) -> bool {
        let option = match &self.state {
            DraftState::Submitting { summary } if attempt == self.attempt => {
                summary.option.clone()
            }
            _ => return false,
        };
        debug!("Bet on question {} failed: {}", self.question, reason);
        self.state = DraftState::Failed { option, reason };
        true
    }
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;
        if matches!(&self.notice, Some(notice) if notice.until <= now) {
            self.notice = None;
            changed = true;
        }
        if matches!(&self.state, DraftState::Placed { until, .. } if *until <= now) {
            self.state = DraftState::Expanded;
            self.amount.clear();
            changed = true;
        }
        changed
    }
    pub fn next_deadline(&self) -> Option<Instant> {
        let placed = match &self.state {
            DraftState::Placed { until, .. } => Some(*until),
            _ => None,
        };
        let notice = self.notice.as_ref().map(|notice| notice.until);
        match (placed, notice) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
    pub fn collapse(&mut self) {
        self.state = DraftState::Collapsed;
        self.amount.clear();
        self.notice = None;
        self.attempt = 0;
    }

    fn flag(&mut self, text: String, now: Instant) {
        self.notice = Some(Notice {
            text,
            until: now + self.timings.notice,
        });
    }
}
