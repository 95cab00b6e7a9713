use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Json, Path, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::Router;
use axum_macros::debug_handler;
use campus_royale::api::*;
use campus_royale::settings::Settings;
use clap::Parser;
use env_logger::{Builder, WriteStyle};
use log::{debug, error, info, LevelFilter};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::ledger::{Ledger, LedgerError};

mod ledger;

type SharedLedger = Arc<RwLock<Ledger>>;
type ApiError = (StatusCode, Json<MessageResponse>);

fn map_ledger_err(e: LedgerError) -> ApiError {
    let code = match e {
        LedgerError::MissingToken | LedgerError::InvalidToken => StatusCode::UNAUTHORIZED,
        LedgerError::AdminOnly => StatusCode::FORBIDDEN,
        LedgerError::QuestionNotFound | LedgerError::SuggestionNotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    debug!("Error: {}", e);
    let message = e.to_string();
    (code, Json(MessageResponse { message }))
}
fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

// Auth
#[debug_handler]
async fn register(
    State(state): State<SharedLedger>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let mut ledger = state.write().await;
    let auth = ledger.register(request).map_err(map_ledger_err)?;
    Ok((StatusCode::CREATED, Json(auth)))
}
async fn login(
    State(state): State<SharedLedger>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let mut ledger = state.write().await;
    let auth = ledger.login(request).map_err(map_ledger_err)?;
    Ok(Json(auth))
}
async fn profile(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
) -> Result<Json<UserProfile>, ApiError> {
    let ledger = state.read().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    Ok(Json(user))
}

// Questions
async fn get_questions(State(state): State<SharedLedger>) -> Json<Vec<Question>> {
    let ledger = state.read().await;
    Json(ledger.questions())
}
#[debug_handler]
async fn create_question(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Json(request): Json<QuestionRequest>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let mut ledger = state.write().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    let question = ledger
        .create_question(&user, request)
        .map_err(map_ledger_err)?;
    Ok((StatusCode::CREATED, Json(question)))
}
async fn update_question(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Path(id): Path<QuestionId>,
    Json(request): Json<QuestionRequest>,
) -> Result<Json<Question>, ApiError> {
    let mut ledger = state.write().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    let question = ledger
        .update_question(&user, &id, request)
        .map_err(map_ledger_err)?;
    Ok(Json(question))
}
async fn delete_question(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Path(id): Path<QuestionId>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut ledger = state.write().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    ledger.delete_question(&user, &id).map_err(map_ledger_err)?;
    Ok(Json(MessageResponse {
        message: "Question deleted".to_string(),
    }))
}
async fn resolve_question(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Path(id): Path<QuestionId>,
    Json(request): Json<ResolveRequest>,
) -> Result<Json<Question>, ApiError> {
    let mut ledger = state.write().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    let question = ledger
        .resolve_question(&user, &id, &request.correct_option)
        .map_err(map_ledger_err)?;
    Ok(Json(question))
}
async fn unresolve_question(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Path(id): Path<QuestionId>,
) -> Result<Json<Question>, ApiError> {
    let mut ledger = state.write().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    let question = ledger
        .unresolve_question(&user, &id)
        .map_err(map_ledger_err)?;
    Ok(Json(question))
}

// Bets
#[debug_handler]
async fn place_bet(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Json(request): Json<PlaceBetRequest>,
) -> Result<(StatusCode, Json<PlaceBetResponse>), ApiError> {
    let mut ledger = state.write().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    let response = ledger.place_bet(&user, request).map_err(map_ledger_err)?;
    Ok((StatusCode::CREATED, Json(response)))
}
async fn my_bets(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
) -> Result<Json<Vec<Bet>>, ApiError> {
    let ledger = state.read().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    Ok(Json(ledger.my_bets(&user)))
}
async fn leaderboard(State(state): State<SharedLedger>) -> Json<Vec<LeaderboardEntry>> {
    let ledger = state.read().await;
    Json(ledger.leaderboard())
}

// Suggestions
async fn submit_suggestion(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Json(request): Json<SuggestionRequest>,
) -> Result<(StatusCode, Json<Suggestion>), ApiError> {
    let mut ledger = state.write().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    let suggestion = ledger
        .submit_suggestion(&user, request)
        .map_err(map_ledger_err)?;
    Ok((StatusCode::CREATED, Json(suggestion)))
}
async fn get_suggestions(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Query(filter): Query<SuggestionFilter>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let ledger = state.read().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    let suggestions = ledger.suggestions(&user, filter).map_err(map_ledger_err)?;
    Ok(Json(suggestions))
}
#[debug_handler]
async fn approve_suggestion(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Path(id): Path<SuggestionId>,
    Json(request): Json<ApproveSuggestionRequest>,
) -> Result<Json<Suggestion>, ApiError> {
    let mut ledger = state.write().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    let suggestion = ledger
        .approve_suggestion(&user, &id, request)
        .map_err(map_ledger_err)?;
    Ok(Json(suggestion))
}
async fn reject_suggestion(
    State(state): State<SharedLedger>,
    headers: HeaderMap,
    Path(id): Path<SuggestionId>,
) -> Result<Json<Suggestion>, ApiError> {
    let mut ledger = state.write().await;
    let user = ledger
        .authenticate(bearer(&headers))
        .map_err(map_ledger_err)?;
    let suggestion = ledger
        .reject_suggestion(&user, &id)
        .map_err(map_ledger_err)?;
    Ok(Json(suggestion))
}

#[derive(Parser)]
struct Args {
    /// Usernames that register as admins
    #[arg(short, long)]
    admin: Vec<String>,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    initial_tokens: Option<Tokens>,
    /// Settings file, without extension
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    Builder::default()
        .filter_level(LevelFilter::Debug)
        .write_style(WriteStyle::Always)
        .parse_default_env()
        .init();
    let cli = Args::parse();
    let mut settings = match &cli.config {
        Some(file) => Settings::load_from(file)?,
        None => Settings::load()?,
    };
    settings.admins.extend(cli.admin);
    let ledger = Ledger::new(
        settings.admins,
        cli.initial_tokens.unwrap_or(settings.initial_tokens),
    );
    let (_port, handle) = run_server(Some(cli.port.unwrap_or(settings.port)), ledger).await?;
    handle.await?;
    Ok(())
}

async fn run_server(port: Option<u16>, ledger: Ledger) -> Result<(u16, JoinHandle<()>)> {
    let state = Arc::new(RwLock::new(ledger));
    let api = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile))
        .route("/questions", get(get_questions).post(create_question))
        .route(
            "/questions/:id",
            put(update_question).delete(delete_question),
        )
        .route("/questions/:id/resolve", post(resolve_question))
        .route("/questions/:id/unresolve", post(unresolve_question))
        .route("/place-bet", post(place_bet))
        .route("/my-bets", get(my_bets))
        .route("/leaderboard", get(leaderboard))
        .route("/suggestions", get(get_suggestions).post(submit_suggestion))
        .route("/suggestions/:id/approve", put(approve_suggestion))
        .route("/suggestions/:id/reject", put(reject_suggestion));
    let app = Router::new().nest("/api", api).with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port.unwrap_or(0)));
    let server = axum::Server::try_bind(&addr)?.serve(app.into_make_service());
    let port = server.local_addr().port();
    info!("Listening on {}", server.local_addr());
    let handle = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Server stopped: {}", e);
        }
    });
    Ok((port, handle))
}

#[cfg(test)]
mod test {
    use std::time::Instant;

    use campus_royale::board::BetBoard;
    use campus_royale::client::{Client, ClientError};
    use campus_royale::credentials::{CredentialStore, Credentials, MemoryCredentialStore};
    use campus_royale::draft::DraftState;
    use campus_royale::forms::{approval_from, QuestionForm, SuggestionForm};
    use campus_royale::session::{Session, SessionAction};
    use campus_royale::submission::BetSubmitter;
    use rust_decimal_macros::dec;

    use super::*;

    async fn start() -> String {
        let ledger = Ledger::new(vec!["root".to_string()], 1000);
        let (port, _) = run_server(None, ledger).await.unwrap();
        format!("http://127.0.0.1:{}/api", port)
    }
    async fn signed_up(url: &str, name: &str) -> (Client, UserProfile) {
        let client = Client::new(url.to_string(), Arc::new(MemoryCredentialStore::default()));
        let auth = client
            .register(&RegisterRequest {
                username: name.to_string(),
                email: format!("{}@campus.edu", name),
                password: "secret".to_string(),
            })
            .await
            .unwrap();
        (client, auth.user)
    }
    fn fest_form() -> QuestionForm {
        QuestionForm {
            title: "Will the campus fest be postponed?".to_string(),
            description: "Decided by the student council".to_string(),
            options: vec![
                ("Yes".to_string(), dec!(1.5)),
                ("No".to_string(), dec!(1.5)),
            ],
            tags: vec!["Event".to_string()],
        }
    }

    #[tokio::test]
    async fn bet_lifecycle() {
        let url = start().await;
        let (root, admin) = signed_up(&url, "root").await;
        let (alice, profile) = signed_up(&url, "alice").await;
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(profile.tokens, 1000);

        let request = fest_form().validate(None).unwrap();
        let error = alice.create_question(&request).await.unwrap_err();
        assert_eq!(error.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(error.to_string(), "Access denied. Admin privileges required.");
        let fest = root.create_question(&request).await.unwrap();

        // Drive a bet through the draft, as the cli does
        let session = Session::shared();
        session
            .write()
            .await
            .apply(SessionAction::SignedIn(profile));
        let alice = Arc::new(alice);
        let submitter = BetSubmitter::new(alice.clone(), session.clone());
        let questions = alice.get_questions().await.unwrap();
        let question = questions.iter().find(|q| q.id == fest.id).unwrap();
        let mut board = BetBoard::default();
        board.expand(&question.id);
        board.select_option(question, "No").unwrap();
        board.enter_amount(&question.id, "100").unwrap();
        let summary = board.request_confirmation(question, Instant::now()).unwrap();
        assert_eq!(summary.multiplier, dec!(1.5));
        let bet = submitter.place(&mut board, question).await.unwrap();
        assert!(matches!(board.state(&question.id), DraftState::Placed { .. }));
        assert_eq!(bet.odds, dec!(1.5));
        assert_eq!(session.read().await.tokens(), 900);

        let error = alice
            .place_bet(&PlaceBetRequest {
                question_id: fest.id.clone(),
                option: "Maybe".to_string(),
                amount: 1,
            })
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Invalid option");

        root.resolve_question(&fest.id, "No").await.unwrap();
        let refreshed = alice.profile().await.unwrap();
        assert_eq!(refreshed.tokens, 1050);
        assert_eq!(refreshed.winnings, 150);
        assert_eq!(submitter.refresh_bets().await, Ok(1));
        assert!(session.read().await.bets()[0].won);

        let board = alice.leaderboard().await.unwrap();
        assert_eq!(board[0].username, "alice");
        assert_eq!(board[1].username, "root");

        root.unresolve_question(&fest.id).await.unwrap();
        assert_eq!(alice.profile().await.unwrap().tokens, 900);
        let mut form = QuestionForm::from_question(&fest);
        form.title = "Will the fest be postponed again?".to_string();
        let questions = root.get_questions().await.unwrap();
        let updated = root
            .update_question(&fest.id, &form.validate(questions.first()).unwrap())
            .await
            .unwrap();
        assert_eq!(updated.option("No").unwrap().votes, 100);
        root.delete_question(&fest.id).await.unwrap();
        assert_eq!(alice.profile().await.unwrap().tokens, 1000);
        assert!(root.get_questions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_token_clears_credentials() {
        let url = start().await;
        let store = Arc::new(MemoryCredentialStore::default());
        store
            .save(&Credentials {
                token: "expired".to_string(),
                user: None,
            })
            .await
            .unwrap();
        let client = Client::new(url.clone(), store.clone());
        assert!(matches!(
            client.my_bets().await,
            Err(ClientError::Unauthorized)
        ));
        assert_eq!(store.load().await.unwrap(), None);

        // Without a token a 401 is an ordinary rejection
        let error = client.my_bets().await.unwrap_err();
        assert_eq!(error.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(error.to_string(), "No token, authorization denied");
    }

    #[tokio::test]
    async fn login_and_logout() {
        let url = start().await;
        let (alice, _) = signed_up(&url, "alice").await;
        alice.logout().await.unwrap();
        assert_eq!(alice.credentials().load().await.unwrap(), None);

        let error = alice
            .login(&LoginRequest {
                email: "alice@campus.edu".to_string(),
                password: "wrong!".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Invalid credentials");
        let auth = alice
            .login(&LoginRequest {
                email: "alice@campus.edu".to_string(),
                password: "secret".to_string(),
            })
            .await
            .unwrap();
        let stored = alice.credentials().load().await.unwrap().unwrap();
        assert_eq!(stored.token, auth.token);
        assert_eq!(alice.profile().await.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn suggestion_review() {
        let url = start().await;
        let (root, _) = signed_up(&url, "root").await;
        let (alice, _) = signed_up(&url, "alice").await;
        let form = SuggestionForm {
            question_text: "Will the library open on Sunday?".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            multipliers: vec![dec!(2.5)],
            tags: vec!["Placement".to_string()],
        };
        let first = alice.submit_suggestion(&form.validate().unwrap()).await.unwrap();
        let second = alice.submit_suggestion(&form.validate().unwrap()).await.unwrap();
        assert_eq!(first.status, SuggestionStatus::Pending);
        let error = alice.get_suggestions(None).await.unwrap_err();
        assert_eq!(error.status(), Some(StatusCode::FORBIDDEN));

        root.approve_suggestion(&first.id, &approval_from(&first))
            .await
            .unwrap();
        root.reject_suggestion(&second.id).await.unwrap();
        let pending = root
            .get_suggestions(Some(SuggestionStatus::Pending))
            .await
            .unwrap();
        assert!(pending.is_empty());
        let approved = root
            .get_suggestions(Some(SuggestionStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(root.get_suggestions(None).await.unwrap().len(), 2);

        let questions = alice.get_questions().await.unwrap();
        assert_eq!(questions[0].description, "Suggested by alice");
        assert_eq!(questions[0].options[0].odds, dec!(2.5));
        let error = root.reject_suggestion(&first.id).await.unwrap_err();
        assert_eq!(error.to_string(), "Suggestion has already been reviewed");
    }
}
