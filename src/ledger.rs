use std::collections::HashMap;

use campus_royale::api::*;
use campus_royale::forms::{check_question, check_suggestion, clean_suggestion, FormError};
use campus_royale::odds;
use chrono::Utc;
use log::{debug, info, trace};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secp256k1::hashes::{sha256, Hash};
use secp256k1::rand::distributions::Alphanumeric;
use secp256k1::rand::{self, Rng};
use thiserror::Error;

const ID_LEN: usize = 24;
const TOKEN_LEN: usize = 30;
const SALT_LEN: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("No token, authorization denied")]
    MissingToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Access denied. Admin privileges required.")]
    AdminOnly,
    #[error("User already exists")]
    UserExists,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Question not found")]
    QuestionNotFound,
    #[error("Suggestion not found")]
    SuggestionNotFound,
    #[error("Invalid option")]
    UnknownOption,
    #[error("Option \"{0}\" already has bets and can't be removed")]
    OptionHasBets(String),
    #[error("Question is already resolved")]
    AlreadyResolved,
    #[error("Question is not resolved")]
    NotResolved,
    #[error("Insufficient tokens")]
    InsufficientTokens,
    #[error("Bet amount must be positive")]
    InvalidAmount,
    #[error("Suggestion has already been reviewed")]
    AlreadyReviewed,
    #[error(transparent)]
    Invalid(#[from] FormError),
}

#[derive(Debug)]
struct Account {
    profile: UserProfile,
    salt: String,
    password: sha256::Hash,
}

#[derive(Debug)]
pub struct Ledger {
    users: HashMap<UserId, Account>,
    sessions: HashMap<String, UserId>,
    questions: Vec<Question>,
    bets: Vec<Bet>,
    suggestions: Vec<Suggestion>,
    admins: Vec<String>,
    initial_tokens: Tokens,
}

impl Ledger {
    pub fn new(admins: Vec<String>, initial_tokens: Tokens) -> Self {
        Self {
            users: HashMap::new(),
            sessions: HashMap::new(),
            questions: vec![],
            bets: vec![],
            suggestions: vec![],
            admins,
            initial_tokens,
        }
    }

    // Auth
    pub fn register(&mut self, request: RegisterRequest) -> Result<AuthResponse, LedgerError> {
        let (username, email) = (request.username.trim(), request.email.trim());
        if username.is_empty() || email.is_empty() || request.password.is_empty() {
            return Err(FormError::MissingFields.into());
        }
        if self.users.values().any(|account| {
            account.profile.username == username || account.profile.email == email
        }) {
            return Err(LedgerError::UserExists);
        }
        let role = if self.admins.iter().any(|admin| admin == username) {
            Role::Admin
        } else {
            Role::User
        };
        let salt = random_string(SALT_LEN);
        let profile = UserProfile {
            id: random_string(ID_LEN),
            username: username.to_string(),
            email: email.to_string(),
            tokens: self.initial_tokens,
            winnings: 0,
            role,
        };
        info!("Registered {} as {}", profile.username, profile.role);
        self.users.insert(
            profile.id.clone(),
            Account {
                password: digest(&salt, &request.password),
                salt,
                profile: profile.clone(),
            },
        );
        Ok(AuthResponse {
            token: self.open_session(&profile.id),
            user: profile,
        })
    }
    pub fn login(&mut self, request: LoginRequest) -> Result<AuthResponse, LedgerError> {
        let email = request.email.trim();
        let profile = self
            .users
            .values()
            .find(|account| account.profile.email == email)
            .filter(|account| digest(&account.salt, &request.password) == account.password)
            .map(|account| account.profile.clone())
            .ok_or(LedgerError::InvalidCredentials)?;
        debug!("{} logged in", profile.username);
        Ok(AuthResponse {
            token: self.open_session(&profile.id),
            user: profile,
        })
    }
    pub fn authenticate(&self, token: Option<&str>) -> Result<UserProfile, LedgerError> {
        let token = token.ok_or(LedgerError::MissingToken)?;
        self.sessions
            .get(token)
            .and_then(|user| self.users.get(user))
            .map(|account| account.profile.clone())
            .ok_or(LedgerError::InvalidToken)
    }

    // Questions
    pub fn questions(&self) -> Vec<Question> {
        self.questions.clone()
    }
    pub fn create_question(
        &mut self,
        user: &UserProfile,
        request: QuestionRequest,
    ) -> Result<Question, LedgerError> {
        require_admin(user)?;
        check_question(&request)?;
        let question = Question {
            id: random_string(ID_LEN),
            title: request.title.trim().to_string(),
            description: request.description,
            options: request
                .options
                .into_iter()
                .map(|option| QuestionOption {
                    label: option.label.trim().to_string(),
                    votes: 0,
                    odds: option.odds,
                })
                .collect(),
            is_resolved: false,
            correct_option: None,
            tags: request.tags,
        };
        debug!("Created question {}: {}", question.id, question.title);
        self.questions.push(question.clone());
        Ok(question)
    }
    pub fn update_question(
        &mut self,
        user: &UserProfile,
        id: &QuestionId,
        request: QuestionRequest,
    ) -> Result<Question, LedgerError> {
        require_admin(user)?;
        check_question(&request)?;
        let index = self.question_index(id)?;
        let labels: Vec<&str> = request
            .options
            .iter()
            .map(|option| option.label.trim())
            .collect();
        if let Some(bet) = self
            .bets
            .iter()
            .find(|bet| &bet.question == id && !labels.contains(&bet.option.as_str()))
        {
            return Err(LedgerError::OptionHasBets(bet.option.clone()));
        }
        let question = &mut self.questions[index];
        let options = request
            .options
            .into_iter()
            .map(|option| {
                let label = option.label.trim().to_string();
                QuestionOption {
                    votes: question.option(&label).map(|o| o.votes).unwrap_or(0),
                    label,
                    odds: option.odds,
                }
            })
            .collect();
        question.title = request.title.trim().to_string();
        question.description = request.description;
        question.options = options;
        question.tags = request.tags;
        debug!("Updated question {}", id);
        Ok(question.clone())
    }
    pub fn delete_question(&mut self, user: &UserProfile, id: &QuestionId) -> Result<(), LedgerError> {
        require_admin(user)?;
        let index = self.question_index(id)?;
        let question = self.questions.remove(index);
        if !question.is_resolved {
            let (refunded, kept): (Vec<Bet>, Vec<Bet>) = std::mem::take(&mut self.bets)
                .into_iter()
                .partition(|bet| &bet.question == id);
            self.bets = kept;
            for bet in refunded {
                if let Some(account) = self.users.get_mut(&bet.user) {
                    account.profile.tokens += bet.amount;
                    trace!("Refunded {} tokens to {}", bet.amount, account.profile.username);
                }
            }
        }
        debug!("Deleted question {}", id);
        Ok(())
    }
    pub fn resolve_question(
        &mut self,
        user: &UserProfile,
        id: &QuestionId,
        correct_option: &str,
    ) -> Result<Question, LedgerError> {
        require_admin(user)?;
        let index = self.question_index(id)?;
        let question = &mut self.questions[index];
        if question.is_resolved {
            return Err(LedgerError::AlreadyResolved);
        }
        if question.option(correct_option).is_none() {
            return Err(LedgerError::UnknownOption);
        }
        question.is_resolved = true;
        question.correct_option = Some(correct_option.to_string());
        let question = question.clone();
        for bet in self.bets.iter_mut().filter(|bet| &bet.question == id) {
            bet.resolved = true;
            bet.won = bet.option == correct_option;
            bet.winnings = if bet.won { payout(bet.amount, bet.odds) } else { 0 };
            if let Some(account) = self.users.get_mut(&bet.user) {
                account.profile.tokens += bet.winnings;
                account.profile.winnings += bet.winnings;
            }
        }
        info!("Resolved question {} with {}", id, correct_option);
        Ok(question)
    }
    pub fn unresolve_question(
        &mut self,
        user: &UserProfile,
        id: &QuestionId,
    ) -> Result<Question, LedgerError> {
        require_admin(user)?;
        let index = self.question_index(id)?;
        let question = &mut self.questions[index];
        if !question.is_resolved {
            return Err(LedgerError::NotResolved);
        }
        question.is_resolved = false;
        question.correct_option = None;
        let question = question.clone();
        for bet in self.bets.iter_mut().filter(|bet| &bet.question == id) {
            if let Some(account) = self.users.get_mut(&bet.user) {
                account.profile.tokens = account.profile.tokens.saturating_sub(bet.winnings);
                account.profile.winnings = account.profile.winnings.saturating_sub(bet.winnings);
            }
            bet.resolved = false;
            bet.won = false;
            bet.winnings = 0;
        }
        info!("Unresolved question {}", id);
        Ok(question)
    }

    // Bets
    // The bet is locked at the pool multiplier before its own stake joins
    // the pool.
    pub fn place_bet(
        &mut self,
        user: &UserProfile,
        request: PlaceBetRequest,
    ) -> Result<PlaceBetResponse, LedgerError> {
        if request.amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let index = self.question_index(&request.question_id)?;
        let question = &mut self.questions[index];
        if question.is_resolved {
            return Err(LedgerError::AlreadyResolved);
        }
        let odds = odds::multiplier_of(&question.options, &request.option)
            .ok_or(LedgerError::UnknownOption)?;
        let account = self
            .users
            .get_mut(&user.id)
            .ok_or(LedgerError::InvalidToken)?;
        if account.profile.tokens < request.amount {
            return Err(LedgerError::InsufficientTokens);
        }
        account.profile.tokens -= request.amount;
        if let Some(option) = question
            .options
            .iter_mut()
            .find(|option| option.label == request.option)
        {
            option.votes = option.votes.saturating_add(request.amount);
        }
        let bet = Bet {
            id: random_string(ID_LEN),
            user: user.id.clone(),
            question: request.question_id,
            option: request.option,
            amount: request.amount,
            odds,
            resolved: false,
            won: false,
            winnings: 0,
            created_at: Some(Utc::now()),
        };
        debug!(
            "{} bet {} on {} at x{}",
            account.profile.username, bet.amount, bet.option, bet.odds
        );
        self.bets.push(bet.clone());
        Ok(PlaceBetResponse {
            bet,
            tokens: account.profile.tokens,
        })
    }
    pub fn my_bets(&self, user: &UserProfile) -> Vec<Bet> {
        self.bets
            .iter()
            .filter(|bet| bet.user == user.id)
            .cloned()
            .collect()
    }
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .users
            .values()
            .map(|account| LeaderboardEntry {
                username: account.profile.username.clone(),
                tokens: account.profile.tokens,
                winnings: account.profile.winnings,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.tokens
                .cmp(&a.tokens)
                .then(b.winnings.cmp(&a.winnings))
                .then(a.username.cmp(&b.username))
        });
        entries
    }

    // Suggestions
    pub fn submit_suggestion(
        &mut self,
        user: &UserProfile,
        request: SuggestionRequest,
    ) -> Result<Suggestion, LedgerError> {
        let request = clean_suggestion(request);
        check_suggestion(&request)?;
        let suggestion = Suggestion {
            id: random_string(ID_LEN),
            question_text: request.question_text,
            options: request.options,
            multipliers: request.multipliers,
            tags: request.tags,
            status: SuggestionStatus::Pending,
            suggested_by: Some(Suggester {
                username: user.username.clone(),
            }),
            created_at: Some(Utc::now()),
        };
        debug!("{} suggested {}", user.username, suggestion.question_text);
        self.suggestions.push(suggestion.clone());
        Ok(suggestion)
    }
    pub fn suggestions(
        &self,
        user: &UserProfile,
        filter: SuggestionFilter,
    ) -> Result<Vec<Suggestion>, LedgerError> {
        require_admin(user)?;
        Ok(self
            .suggestions
            .iter()
            .filter(|suggestion| filter.status.map_or(true, |status| suggestion.status == status))
            .cloned()
            .collect())
    }
    pub fn approve_suggestion(
        &mut self,
        user: &UserProfile,
        id: &SuggestionId,
        request: ApproveSuggestionRequest,
    ) -> Result<Suggestion, LedgerError> {
        require_admin(user)?;
        self.pending_suggestion(id)?;
        let question = self.create_question(
            user,
            QuestionRequest {
                title: request.title,
                description: request.description,
                options: request.options,
                tags: request.tags,
            },
        )?;
        let suggestion = self.pending_suggestion(id)?;
        suggestion.status = SuggestionStatus::Approved;
        info!("Approved suggestion {} as question {}", id, question.id);
        Ok(suggestion.clone())
    }
    pub fn reject_suggestion(
        &mut self,
        user: &UserProfile,
        id: &SuggestionId,
    ) -> Result<Suggestion, LedgerError> {
        require_admin(user)?;
        let suggestion = self.pending_suggestion(id)?;
        suggestion.status = SuggestionStatus::Rejected;
        debug!("Rejected suggestion {}", id);
        Ok(suggestion.clone())
    }

    fn open_session(&mut self, user: &UserId) -> String {
        let token = random_string(TOKEN_LEN);
        trace!("Opened session for {}", user);
        self.sessions.insert(token.clone(), user.clone());
        token
    }
    fn question_index(&self, id: &QuestionId) -> Result<usize, LedgerError> {
        self.questions
            .iter()
            .position(|question| &question.id == id)
            .ok_or(LedgerError::QuestionNotFound)
    }
    fn pending_suggestion(&mut self, id: &SuggestionId) -> Result<&mut Suggestion, LedgerError> {
        let suggestion = self
            .suggestions
            .iter_mut()
            .find(|suggestion| &suggestion.id == id)
            .ok_or(LedgerError::SuggestionNotFound)?;
        match suggestion.status {
            SuggestionStatus::Pending => Ok(suggestion),
            _ => Err(LedgerError::AlreadyReviewed),
        }
    }
}

fn require_admin(user: &UserProfile) -> Result<(), LedgerError> {
    match user.role {
        Role::Admin => Ok(()),
        Role::User => Err(LedgerError::AdminOnly),
    }
}
fn payout(amount: Tokens, odds: Decimal) -> Tokens {
    (Decimal::from(amount) * odds)
        .floor()
        .to_u64()
        .unwrap_or(Tokens::MAX)
}
fn digest(salt: &str, password: &str) -> sha256::Hash {
    sha256::Hash::hash(format!("{}{}", salt, password).as_bytes())
}
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
