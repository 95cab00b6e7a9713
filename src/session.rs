use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::api::{Bet, Role, Tokens, UserProfile};

pub type SharedSession = Arc<RwLock<Session>>;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    SignedIn(UserProfile),
    ProfileLoaded(UserProfile),
    BalanceReplaced(Tokens),
    BetRecorded(Bet),
    BetsLoaded(Vec<Bet>),
    SignedOut,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    user: Option<UserProfile>,
    bets: Vec<Bet>,
}

impl Session {
    pub fn shared() -> SharedSession {
        Arc::new(RwLock::new(Self::default()))
    }
    pub fn apply(&mut self, action: SessionAction) {
        match action {
            SessionAction::SignedIn(profile) => {
                info!("Signed in as {}", profile.username);
                self.user = Some(profile);
                self.bets.clear();
            }
            SessionAction::ProfileLoaded(profile) => match &self.user {
                Some(user) if user.id != profile.id => {
                    warn!(
                        "Ignoring profile of {} while signed in as {}",
                        profile.username, user.username
                    );
                }
                _ => self.user = Some(profile),
            },
            SessionAction::BalanceReplaced(tokens) => match &mut self.user {
                Some(user) => {
                    debug!("Balance of {}: {} -> {}", user.username, user.tokens, tokens);
                    user.tokens = tokens;
                }
                None => debug!("Dropping balance update, nobody is signed in"),
            },
            SessionAction::BetRecorded(bet) => {
                if self.user.is_some() {
                    self.bets.push(bet);
                } else {
                    debug!("Dropping bet {}, nobody is signed in", bet.id);
                }
            }
            SessionAction::BetsLoaded(bets) => {
                if self.user.is_some() {
                    self.bets = bets;
                }
            }
            SessionAction::SignedOut => {
                if let Some(user) = self.user.take() {
                    info!("Signed out {}", user.username);
                }
                self.bets.clear();
            }
        }
    }
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }
    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
    pub fn tokens(&self) -> Tokens {
        self.user.as_ref().map(|user| user.tokens).unwrap_or(0)
    }
    pub fn winnings(&self) -> Tokens {
        self.user.as_ref().map(|user| user.winnings).unwrap_or(0)
    }
    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }
    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|user| user.role)
    }
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_role(self.role())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Bet,
    Suggest,
    ManageQuestions,
    ReviewSuggestions,
}
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("Please log in first")]
    SignedOut,
    #[error("Access denied. Admin privileges required.")]
    AdminOnly,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    role: Option<Role>,
}
impl Capabilities {
    pub fn for_role(role: Option<Role>) -> Self {
        Self { role }
    }
    pub fn allows(&self, capability: Capability) -> bool {
        self.require(capability).is_ok()
    }
    pub fn can_bet(&self) -> bool {
        self.allows(Capability::Bet)
    }
    pub fn can_suggest(&self) -> bool {
        self.allows(Capability::Suggest)
    }
    pub fn can_manage_questions(&self) -> bool {
        self.allows(Capability::ManageQuestions)
    }
    pub fn can_review_suggestions(&self) -> bool {
        self.allows(Capability::ReviewSuggestions)
    }
    pub fn require(&self, capability: Capability) -> Result<(), AccessDenied> {
        match (self.role, capability) {
            (None, _) => Err(AccessDenied::SignedOut),
            (Some(_), Capability::Bet | Capability::Suggest) => Ok(()),
            (Some(Role::Admin), _) => Ok(()),
            (Some(Role::User), _) => Err(AccessDenied::AdminOnly),
        }
    }
}
