use std::sync::Arc;

use log::{debug, trace, warn};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::api::*;
use crate::credentials::{CredentialStore, Credentials};

pub type Credentialed = Arc<dyn CredentialStore + Send + Sync>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Session expired, please log in again")]
    Unauthorized,
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Couldn't access stored credentials: {0}")]
    Storage(String),
}
impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub struct Client {
    url: String,
    client: reqwest::Client,
    credentials: Credentialed,
}
impl Client {
    pub fn new(url: String, credentials: Credentialed) -> Self {
        let client = reqwest::Client::new();
        let url = url.trim_end_matches('/').to_string();
        Self {
            url,
            client,
            credentials,
        }
    }
    pub fn credentials(&self) -> &Credentialed {
        &self.credentials
    }

    // Auth
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let fallback = "Registration failed";
        let response = self
            .post("/register", request, StatusCode::CREATED, fallback)
            .await?;
        let auth = decode::<AuthResponse>(response, fallback).await?;
        self.store(&auth).await?;
        Ok(auth)
    }
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let fallback = "Login failed";
        let response = self
            .post("/login", request, StatusCode::OK, fallback)
            .await?;
        let auth = decode::<AuthResponse>(response, fallback).await?;
        self.store(&auth).await?;
        Ok(auth)
    }
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.credentials
            .clear()
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))
    }
    pub async fn profile(&self) -> Result<UserProfile, ClientError> {
        let fallback = "Failed to load profile";
        let response = self.get("/profile", fallback).await?;
        let profile = decode::<UserProfile>(response, fallback).await?;
        // keep the stored copy in step with the backend
        if let Ok(Some(credentials)) = self.credentials.load().await {
            let credentials = Credentials {
                token: credentials.token,
                user: Some(profile.clone()),
            };
            if let Err(e) = self.credentials.save(&credentials).await {
                warn!("Couldn't store refreshed profile: {}", e);
            }
        }
        Ok(profile)
    }

    // Questions
    pub async fn get_questions(&self) -> Result<Vec<Question>, ClientError> {
        let fallback = "Failed to load questions";
        let response = self.get("/questions", fallback).await?;
        decode(response, fallback).await
    }
    pub async fn create_question(&self, request: &QuestionRequest) -> Result<Question, ClientError> {
        let fallback = "Failed to add question";
        let response = self
            .post("/questions", request, StatusCode::CREATED, fallback)
            .await?;
        decode(response, fallback).await
    }
    pub async fn update_question(
        &self,
        question: &QuestionId,
        request: &QuestionRequest,
    ) -> Result<Question, ClientError> {
        let fallback = "Failed to update question";
        let builder = self.client.put(self.path(&format!("/questions/{}", question)));
        let response = self
            .send(builder.json(request), StatusCode::OK, fallback)
            .await?;
        decode(response, fallback).await
    }
    pub async fn delete_question(&self, question: &QuestionId) -> Result<(), ClientError> {
        let fallback = "Failed to delete question";
        let builder = self
            .client
            .delete(self.path(&format!("/questions/{}", question)));
        self.send(builder, StatusCode::OK, fallback).await?;
        Ok(())
    }
    pub async fn resolve_question(
        &self,
        question: &QuestionId,
        correct_option: &str,
    ) -> Result<(), ClientError> {
        let request = ResolveRequest {
            correct_option: correct_option.to_string(),
        };
        self.post(
            &format!("/questions/{}/resolve", question),
            &request,
            StatusCode::OK,
            "Failed to resolve question",
        )
        .await?;
        Ok(())
    }
    pub async fn unresolve_question(&self, question: &QuestionId) -> Result<(), ClientError> {
        let builder = self
            .client
            .post(self.path(&format!("/questions/{}/unresolve", question)));
        self.send(builder, StatusCode::OK, "Failed to unresolve question")
            .await?;
        Ok(())
    }

    // Bets
    pub async fn place_bet(
        &self,
        request: &PlaceBetRequest,
    ) -> Result<PlaceBetResponse, ClientError> {
        let fallback = "Failed to place bet";
        debug!(
            "Placing {} tokens on {} of question {}",
            request.amount, request.option, request.question_id
        );
        let response = self
            .post("/place-bet", request, StatusCode::CREATED, fallback)
            .await?;
        decode(response, fallback).await
    }
    pub async fn my_bets(&self) -> Result<Vec<Bet>, ClientError> {
        let fallback = "Failed to load bets";
        let response = self.get("/my-bets", fallback).await?;
        decode(response, fallback).await
    }
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ClientError> {
        let fallback = "Failed to load leaderboard";
        let response = self.get("/leaderboard", fallback).await?;
        decode(response, fallback).await
    }

    // Suggestions
    pub async fn submit_suggestion(
        &self,
        request: &SuggestionRequest,
    ) -> Result<Suggestion, ClientError> {
        let fallback = "Failed to submit suggestion";
        let response = self
            .post("/suggestions", request, StatusCode::CREATED, fallback)
            .await?;
        decode(response, fallback).await
    }
    pub async fn get_suggestions(
        &self,
        status: Option<SuggestionStatus>,
    ) -> Result<Vec<Suggestion>, ClientError> {
        let fallback = "Failed to load suggestions";
        let builder = self
            .client
            .get(self.path("/suggestions"))
            .query(&SuggestionFilter { status });
        let response = self.send(builder, StatusCode::OK, fallback).await?;
        decode(response, fallback).await
    }
    pub async fn approve_suggestion(
        &self,
        suggestion: &SuggestionId,
        request: &ApproveSuggestionRequest,
    ) -> Result<Suggestion, ClientError> {
        let fallback = "Failed to approve suggestion";
        let builder = self
            .client
            .put(self.path(&format!("/suggestions/{}/approve", suggestion)))
            .json(request);
        let response = self.send(builder, StatusCode::OK, fallback).await?;
        decode(response, fallback).await
    }
    pub async fn reject_suggestion(
        &self,
        suggestion: &SuggestionId,
    ) -> Result<Suggestion, ClientError> {
        let fallback = "Failed to reject suggestion";
        let builder = self
            .client
            .put(self.path(&format!("/suggestions/{}/reject", suggestion)));
        let response = self.send(builder, StatusCode::OK, fallback).await?;
        decode(response, fallback).await
    }

    fn path(&self, path: &str) -> String {
        self.url.clone() + path
    }
    async fn post(
        &self,
        path: &str,
        request: &impl Serialize,
        expected_code: StatusCode,
        fallback: &'static str,
    ) -> Result<Response, ClientError> {
        let builder = self.client.post(self.path(path)).json(request);
        self.send(builder, expected_code, fallback).await
    }
    async fn get(&self, path: &str, fallback: &'static str) -> Result<Response, ClientError> {
        let builder = self.client.get(self.path(path));
        self.send(builder, StatusCode::OK, fallback).await
    }
    async fn send(
        &self,
        builder: RequestBuilder,
        expected_code: StatusCode,
        fallback: &'static str,
    ) -> Result<Response, ClientError> {
        let token = match self.credentials.load().await {
            Ok(credentials) => credentials.map(|credentials| credentials.token),
            Err(e) => {
                warn!("Sending request without credentials: {}", e);
                None
            }
        };
        let authenticated = token.is_some();
        let builder = match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        let response = builder.send().await.map_err(|source| ClientError::Transport {
            message: fallback.to_string(),
            source,
        })?;
        self.bail_if_err(response, expected_code, authenticated, fallback)
            .await
    }
    // Any success code is accepted, `expected_code` only matters for logging.
    // A 401 on an authenticated request ends the session.
    async fn bail_if_err(
        &self,
        response: Response,
        expected_code: StatusCode,
        authenticated: bool,
        fallback: &'static str,
    ) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            if status != expected_code {
                trace!("Expected {} from {}, got {}", expected_code, response.url(), status);
            }
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED && authenticated {
            debug!("Credentials rejected by {}", response.url());
            if let Err(e) = self.credentials.clear().await {
                warn!("Couldn't clear rejected credentials: {}", e);
            }
            return Err(ClientError::Unauthorized);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| fallback.to_string());
        debug!("{}: {}", status, message);
        Err(ClientError::Rejected { status, message })
    }
    async fn store(&self, auth: &AuthResponse) -> Result<(), ClientError> {
        let credentials = Credentials {
            token: auth.token.clone(),
            user: Some(auth.user.clone()),
        };
        self.credentials
            .save(&credentials)
            .await
            .map_err(|e| ClientError::Storage(e.to_string()))
    }
}

async fn decode<T: DeserializeOwned>(
    response: Response,
    fallback: &'static str,
) -> Result<T, ClientError> {
    response
        .json::<T>()
        .await
        .map_err(|source| ClientError::Transport {
            message: fallback.to_string(),
            source,
        })
}
