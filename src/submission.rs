use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;

use crate::api::{Bet, PlaceBetRequest, PlaceBetResponse, Question};
use crate::board::BetBoard;
use crate::client::{Client, ClientError};
use crate::draft::DraftError;
use crate::session::{SessionAction, SharedSession};

#[async_trait]
pub trait BetPlacement {
    async fn place_bet(&self, request: &PlaceBetRequest) -> Result<PlaceBetResponse, ClientError>;
    async fn my_bets(&self) -> Result<Vec<Bet>, ClientError>;
}
#[async_trait]
impl BetPlacement for Client {
    async fn place_bet(&self, request: &PlaceBetRequest) -> Result<PlaceBetResponse, ClientError> {
        Client::place_bet(self, request).await
    }
    async fn my_bets(&self) -> Result<Vec<Bet>, ClientError> {
        Client::my_bets(self).await
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SubmissionError {
    #[error("Not enough tokens!")]
    InsufficientTokens,
    #[error("Please log in first")]
    SignedOut,
    #[error("Session expired, please log in again")]
    SessionExpired,
    #[error("{0}")]
    Rejected(String),
}
impl From<ClientError> for SubmissionError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Unauthorized => Self::SessionExpired,
            e => Self::Rejected(e.to_string()),
        }
    }
}
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlaceError {
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

pub struct BetSubmitter {
    api: Arc<dyn BetPlacement + Send + Sync>,
    session: SharedSession,
}
impl BetSubmitter {
    pub fn new(api: Arc<dyn BetPlacement + Send + Sync>, session: SharedSession) -> Self {
        Self { api, session }
    }
    pub fn session(&self) -> &SharedSession {
        &self.session
    }
    pub async fn submit(&self, request: &PlaceBetRequest) -> Result<Bet, SubmissionError> {
        {
            let session = self.session.read().await;
            if !session.is_signed_in() {
                return Err(SubmissionError::SignedOut);
            }
            if request.amount > session.tokens() {
                debug!(
                    "Refusing bet of {} with a balance of {}",
                    request.amount,
                    session.tokens()
                );
                return Err(SubmissionError::InsufficientTokens);
            }
        }
        match self.api.place_bet(request).await {
            Ok(PlaceBetResponse { bet, tokens }) => {
                info!(
                    "Placed {} tokens on {} (question {}), balance now {}",
                    bet.amount, bet.option, bet.question, tokens
                );
                let mut session = self.session.write().await;
                session.apply(SessionAction::BalanceReplaced(tokens));
                session.apply(SessionAction::BetRecorded(bet.clone()));
                Ok(bet)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }
    pub async fn place(&self, board: &mut BetBoard, question: &Question) -> Result<Bet, PlaceError> {
        let ticket = board.begin(&question.id)?;
        let outcome = self.submit(&ticket.request).await;
        let reported = match &outcome {
            Ok(_) => Ok(()),
            Err(e) => Err(e.to_string()),
        };
        if !board.finish(&ticket, reported, Instant::now()) {
            debug!("Question {} changed while its bet was in flight", question.id);
        }
        Ok(outcome?)
    }
    pub async fn refresh_bets(&self) -> Result<usize, SubmissionError> {
        match self.api.my_bets().await {
            Ok(bets) => {
                let count = bets.len();
                self.session
                    .write()
                    .await
                    .apply(SessionAction::BetsLoaded(bets));
                Ok(count)
            }
            Err(e) => {
                let e = self.fail(e).await;
                warn!("Keeping cached bets: {}", e);
                Err(e)
            }
        }
    }

    async fn fail(&self, e: ClientError) -> SubmissionError {
        let e = SubmissionError::from(e);
        if e == SubmissionError::SessionExpired {
            self.session.write().await.apply(SessionAction::SignedOut);
        }
        e
    }
}
