use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use campus_royale::api::*;
use campus_royale::board::BetBoard;
use campus_royale::client::{Client, ClientError};
use campus_royale::credentials::{CredentialStore, FileCredentialStore};
use campus_royale::draft::{BetDraft, DraftState};
use campus_royale::forms::{
    approval_from, LoginForm, QuestionForm, RegisterForm, SuggestionForm, SUGGESTED_TAGS,
};
use campus_royale::odds;
use campus_royale::session::{Capability, Session, SessionAction, SharedSession};
use campus_royale::settings::Settings;
use campus_royale::submission::{BetSubmitter, PlaceError, SubmissionError};
use clap::{Parser, Subcommand};
use env_logger::{Builder, WriteStyle};
use log::{debug, LevelFilter};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::sleep_until;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Backend base url, e.g. http://localhost:5000/api
    #[arg(short, long)]
    url: Option<String>,
    /// Settings file, without extension
    #[arg(short, long)]
    config: Option<String>,
}
#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        /// Defaults to the password
        #[arg(long)]
        confirm_password: Option<String>,
    },
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    Logout,
    Profile,
    Questions,
    /// Places a single bet
    Place {
        #[arg(short, long)]
        question: QuestionId,
        #[arg(short, long)]
        option: String,
        #[arg(short, long)]
        amount: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Interactive betting session
    Play,
    MyBets,
    Leaderboard,
    Suggest {
        #[arg(short, long)]
        text: String,
        /// `Label` or `Label=multiplier`
        #[arg(short, long)]
        option: Vec<String>,
        #[arg(long)]
        tag: Vec<String>,
    },
    Suggestions {
        #[arg(short, long)]
        status: Option<SuggestionStatus>,
    },
    Approve {
        #[arg(short, long)]
        id: SuggestionId,
        #[arg(short, long)]
        title: Option<String>,
    },
    Reject {
        #[arg(short, long)]
        id: SuggestionId,
    },
    CreateQuestion {
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// `Label` or `Label=odds`
        #[arg(short, long)]
        option: Vec<String>,
        #[arg(long)]
        tag: Vec<String>,
    },
    UpdateQuestion {
        #[arg(short, long)]
        id: QuestionId,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Replaces all options when given
        #[arg(short, long)]
        option: Vec<String>,
        /// Replaces all tags when given
        #[arg(long)]
        tag: Vec<String>,
    },
    DeleteQuestion {
        #[arg(short, long)]
        id: QuestionId,
    },
    Resolve {
        #[arg(short, long)]
        id: QuestionId,
        #[arg(short, long)]
        option: String,
    },
    Unresolve {
        #[arg(short, long)]
        id: QuestionId,
    },
}

struct App {
    client: Arc<Client>,
    session: SharedSession,
    submitter: BetSubmitter,
    settings: Settings,
}

#[tokio::main]
async fn main() -> Result<()> {
    Builder::default()
        .filter_level(LevelFilter::Info)
        .write_style(WriteStyle::Always)
        .parse_default_env()
        .init();
    let cli = Args::parse();
    let mut settings = match &cli.config {
        Some(file) => Settings::load_from(file)?,
        None => Settings::load()?,
    };
    if let Some(url) = cli.url {
        settings.api_url = url;
    }
    let store = Arc::new(FileCredentialStore::new(&settings.credentials_dir));
    let client = Arc::new(Client::new(settings.api_url.clone(), store.clone()));
    let session = Session::shared();
    if let Some(user) = store.load().await?.and_then(|credentials| credentials.user) {
        session.write().await.apply(SessionAction::SignedIn(user));
    }
    let app = App {
        submitter: BetSubmitter::new(client.clone(), session.clone()),
        client,
        session,
        settings,
    };

    app.run(cli.command).await
}

fn session_expired(e: &anyhow::Error) -> bool {
    matches!(e.downcast_ref::<ClientError>(), Some(ClientError::Unauthorized))
        || matches!(
            e.downcast_ref::<SubmissionError>(),
            Some(SubmissionError::SessionExpired)
        )
        || matches!(
            e.downcast_ref::<PlaceError>(),
            Some(PlaceError::Submission(SubmissionError::SessionExpired))
        )
}

impl App {
    async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Register {
                username,
                email,
                password,
                confirm_password,
            } => {
                let form = RegisterForm {
                    username,
                    email,
                    confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                    password,
                };
                let auth = self.client.register(&form.validate()?).await?;
                println!(
                    "Welcome {}! You start with {} tokens.",
                    auth.user.username, auth.user.tokens
                );
            }
            Commands::Login { email, password } => {
                let form = LoginForm { email, password };
                let auth = self.client.login(&form.validate()?).await?;
                println!("Logged in as {} ({})", auth.user.username, auth.user.role);
            }
            Commands::Logout => {
                self.client.logout().await?;
                self.session.write().await.apply(SessionAction::SignedOut);
                println!("Logged out");
            }
            Commands::Profile => {
                self.require(Capability::Bet).await?;
                let profile = self.refresh_profile().await?;
                println!("{:#?}", profile);
            }
            Commands::Questions => {
                let questions = self.client.get_questions().await?;
                for (i, question) in questions.iter().enumerate() {
                    print_question(i, question, None);
                }
            }
            Commands::Place {
                question,
                option,
                amount,
                yes,
            } => {
                self.require(Capability::Bet).await?;
                self.refresh_profile().await?;
                let questions = self.client.get_questions().await?;
                let question = find_question(&questions, &question)?;
                let mut board = BetBoard::new(self.settings.timings());
                board.expand(&question.id);
                board.select_option(question, &option)?;
                board.enter_amount(&question.id, &amount)?;
                let summary = board.request_confirmation(question, std::time::Instant::now())?;
                println!("{}", summary);
                if !yes && !confirm("Place this bet? [y/N] ").await? {
                    println!("Cancelled");
                    return Ok(());
                }
                self.submitter.place(&mut board, question).await?;
                print_notice(board.draft(&question.id));
                println!("Balance: {} tokens", self.session.read().await.tokens());
            }
            Commands::Play => {
                self.require(Capability::Bet).await?;
                self.play().await?;
            }
            Commands::MyBets => {
                self.require(Capability::Bet).await?;
                self.submitter.refresh_bets().await?;
                let session = self.session.read().await;
                for bet in session.bets() {
                    print_bet(bet);
                }
            }
            Commands::Leaderboard => {
                let entries = self.client.leaderboard().await?;
                for (i, entry) in entries.iter().enumerate() {
                    println!(
                        "{:>3}. {:<20} {:>8} tokens {:>8} won",
                        i + 1,
                        entry.username,
                        entry.tokens,
                        entry.winnings
                    );
                }
            }
            Commands::Suggest { text, option, tag } => {
                self.require(Capability::Suggest).await?;
                let (options, multipliers) = option
                    .iter()
                    .map(|entry| parse_option(entry))
                    .collect::<Result<Vec<_>>>()?
                    .into_iter()
                    .unzip();
                let form = SuggestionForm {
                    question_text: text,
                    options,
                    multipliers,
                    tags: tag,
                };
                let suggestion = self.client.submit_suggestion(&form.validate()?).await?;
                println!("Suggestion {} submitted for review", suggestion.id);
                let unknown: Vec<&String> = suggestion
                    .tags
                    .iter()
                    .filter(|tag| !SUGGESTED_TAGS.contains(&tag.as_str()))
                    .collect();
                if !unknown.is_empty() {
                    debug!("Custom tags: {:?}", unknown);
                }
            }
            Commands::Suggestions { status } => {
                self.require(Capability::ReviewSuggestions).await?;
                let suggestions = self.client.get_suggestions(status).await?;
                for suggestion in suggestions {
                    print_suggestion(&suggestion);
                }
            }
            Commands::Approve { id, title } => {
                self.require(Capability::ReviewSuggestions).await?;
                let suggestions = self.client.get_suggestions(None).await?;
                let suggestion = suggestions
                    .iter()
                    .find(|suggestion| suggestion.id == id)
                    .ok_or_else(|| anyhow!("Suggestion not found"))?;
                let mut approval = approval_from(suggestion);
                if let Some(title) = title {
                    approval.title = title;
                }
                self.client.approve_suggestion(&id, &approval).await?;
                println!("Suggestion approved and question created!");
            }
            Commands::Reject { id } => {
                self.require(Capability::ReviewSuggestions).await?;
                self.client.reject_suggestion(&id).await?;
                println!("Suggestion rejected");
            }
            Commands::CreateQuestion {
                title,
                description,
                option,
                tag,
            } => {
                self.require(Capability::ManageQuestions).await?;
                let form = QuestionForm {
                    title,
                    description,
                    options: option
                        .iter()
                        .map(|entry| parse_option(entry))
                        .collect::<Result<_>>()?,
                    tags: tag,
                };
                let question = self.client.create_question(&form.validate(None)?).await?;
                println!("Question added! ({})", question.id);
            }
            Commands::UpdateQuestion {
                id,
                title,
                description,
                option,
                tag,
            } => {
                self.require(Capability::ManageQuestions).await?;
                let questions = self.client.get_questions().await?;
                let existing = find_question(&questions, &id)?;
                let mut form = QuestionForm::from_question(existing);
                if let Some(title) = title {
                    form.title = title;
                }
                if let Some(description) = description {
                    form.description = description;
                }
                if !option.is_empty() {
                    form.options = option
                        .iter()
                        .map(|entry| parse_option(entry))
                        .collect::<Result<_>>()?;
                }
                if !tag.is_empty() {
                    form.tags = tag;
                }
                let request = form.validate(Some(existing))?;
                self.client.update_question(&id, &request).await?;
                println!("Question updated");
            }
            Commands::DeleteQuestion { id } => {
                self.require(Capability::ManageQuestions).await?;
                self.client.delete_question(&id).await?;
                println!("Question deleted");
            }
            Commands::Resolve { id, option } => {
                self.require(Capability::ManageQuestions).await?;
                self.client.resolve_question(&id, &option).await?;
                println!("Question resolved with \"{}\"", option);
            }
            Commands::Unresolve { id } => {
                self.require(Capability::ManageQuestions).await?;
                self.client.unresolve_question(&id).await?;
                println!("Question reopened");
            }
        }
        Ok(())
    }

    async fn require(&self, capability: Capability) -> Result<()> {
        let capabilities = self.session.read().await.capabilities();
        Ok(capabilities.require(capability)?)
    }
    async fn refresh_profile(&self) -> Result<UserProfile> {
        let profile = self.client.profile().await?;
        self.session
            .write()
            .await
            .apply(SessionAction::ProfileLoaded(profile.clone()));
        Ok(profile)
    }

    async fn play(&self) -> Result<()> {
        let mut questions = self.client.get_questions().await?;
        let mut board = BetBoard::new(self.settings.timings());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", PLAY_HELP);
        print_balance(&self.session).await;
        for (i, question) in questions.iter().enumerate() {
            print_question(i, question, None);
        }
        loop {
            let deadline = board.next_deadline();
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let words: Vec<&str> = line.split_whitespace().collect();
                    match words.as_slice() {
                        [] => continue,
                        ["quit"] | ["q"] => break,
                        ["help"] => println!("{}", PLAY_HELP),
                        ["list"] | ["ls"] => {
                            questions = self.client.get_questions().await?;
                            for (i, question) in questions.iter().enumerate() {
                                print_question(i, question, board.draft(&question.id));
                            }
                        }
                        ["balance"] => print_balance(&self.session).await,
                        ["bets"] => {
                            self.submitter.refresh_bets().await?;
                            for bet in self.session.read().await.bets() {
                                print_bet(bet);
                            }
                        }
                        [command, index, rest @ ..] => {
                            let Some((i, question)) = index
                                .parse::<usize>()
                                .ok()
                                .and_then(|i| questions.get(i).map(|q| (i, q)))
                            else {
                                println!("No question {}", index);
                                continue;
                            };
                            let outcome = match (*command, rest) {
                                ("open", []) => {
                                    board.toggle(&question.id);
                                    Ok(())
                                }
                                ("pick", label) if !label.is_empty() => board
                                    .select_option(question, &label.join(" "))
                                    .map_err(anyhow::Error::from),
                                ("amount", [raw]) => board
                                    .enter_amount(&question.id, raw)
                                    .map(|_| ())
                                    .map_err(anyhow::Error::from),
                                ("confirm", []) => board
                                    .request_confirmation(question, std::time::Instant::now())
                                    .map(|summary| println!("{}  (place {} to submit)", summary, i))
                                    .map_err(anyhow::Error::from),
                                ("place", []) => self
                                    .submitter
                                    .place(&mut board, question)
                                    .await
                                    .map(|_| ())
                                    .map_err(anyhow::Error::from),
                                _ => {
                                    println!("{}", PLAY_HELP);
                                    continue;
                                }
                            };
                            if let Err(e) = outcome {
                                if session_expired(&e) {
                                    return Err(e);
                                }
                                println!("{}", e);
                            }
                            print_question(i, question, board.draft(&question.id));
                            if *command == "place" {
                                print_balance(&self.session).await;
                            }
                        }
                        _ => println!("{}", PLAY_HELP),
                    }
                }
                _ = wait_for(deadline) => {
                    let now = std::time::Instant::now();
                    let open: Vec<QuestionId> = board.open_questions().cloned().collect();
                    let before: Vec<(DraftState, Option<String>)> = open
                        .iter()
                        .map(|id| {
                            let draft = board.draft(id);
                            (board.state(id), draft.and_then(|d| d.notice().map(str::to_string)))
                        })
                        .collect();
                    if board.tick(now) {
                        for (id, (state, notice)) in open.iter().zip(before) {
                            let draft = board.draft(id);
                            let after = draft.and_then(|d| d.notice().map(str::to_string));
                            if board.state(id) != state || after != notice {
                                if let Some((i, question)) =
                                    questions.iter().enumerate().find(|(_, q)| &q.id == id)
                                {
                                    print_question(i, question, draft);
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

const PLAY_HELP: &str = "\
commands: list | balance | bets | quit
          open <n>            open or close question n
          pick <n> <option>   choose an option
          amount <n> <tokens> enter the stake
          confirm <n>         review the bet
          place <n>           submit the reviewed bet";

async fn wait_for(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
async fn confirm(prompt: &str) -> Result<bool> {
    println!("{}", prompt);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
fn find_question<'a>(questions: &'a [Question], id: &str) -> Result<&'a Question> {
    questions
        .iter()
        .find(|question| question.id == id)
        .ok_or_else(|| anyhow!("Question not found"))
}
// `Label` or `Label=1.8`
fn parse_option(entry: &str) -> Result<(String, Decimal)> {
    match entry.rsplit_once('=') {
        Some((label, odds)) => {
            let odds = Decimal::from_str(odds.trim())
                .map_err(|e| anyhow!("Invalid odds \"{}\" for {}: {}", odds, label, e))?;
            Ok((label.trim().to_string(), odds))
        }
        None if entry.trim().is_empty() => bail!("Empty option"),
        None => Ok((entry.trim().to_string(), default_odds())),
    }
}

async fn print_balance(session: &SharedSession) {
    let session = session.read().await;
    println!(
        "Balance: {} tokens | Winnings: {}",
        session.tokens(),
        session.winnings()
    );
}
fn print_question(index: usize, question: &Question, draft: Option<&BetDraft>) {
    println!(
        "[{}] {} ({}) | pool {} | {}",
        index,
        question.title,
        question.resolution(),
        question.pool(),
        question.id
    );
    if !question.description.is_empty() {
        println!("    {}", question.description);
    }
    if !question.tags.is_empty() {
        println!("    tags: {}", question.tags.join(", "));
    }
    let selected = draft.and_then(BetDraft::selected_option);
    for priced in odds::price_options(&question.options) {
        let marker = if selected == Some(priced.option.label.as_str()) {
            ">"
        } else {
            " "
        };
        println!(
            "  {} {:<24} x{:<5} {:>3}% | author odds x{}",
            marker, priced.option.label, priced.multiplier, priced.chance, priced.option.odds
        );
    }
    let Some(draft) = draft else { return };
    match draft.state() {
        DraftState::Collapsed | DraftState::Expanded => {}
        DraftState::OptionSelected { option } => {
            let preview = draft
                .preview(question)
                .map(|win| format!(" | win {}", win))
                .unwrap_or_default();
            println!("    {} | stake \"{}\"{}", option, draft.amount(), preview);
        }
        DraftState::AwaitingConfirmation { summary } => println!("    confirm: {}", summary),
        DraftState::Submitting { summary } => println!("    placing: {}", summary),
        DraftState::Placed { summary, .. } => println!("    placed: {}", summary),
        DraftState::Failed { option, reason } => {
            println!("    {} | stake \"{}\" | {}", option, draft.amount(), reason)
        }
    }
    print_notice(Some(draft));
}
fn print_notice(draft: Option<&BetDraft>) {
    if let Some(notice) = draft.and_then(BetDraft::notice) {
        println!("    {}", notice);
    }
}
fn print_bet(bet: &Bet) {
    let status = match (bet.resolved, bet.won) {
        (false, _) => "open".to_string(),
        (true, true) => format!("won {}", bet.winnings),
        (true, false) => "lost".to_string(),
    };
    let win = odds::potential_win(bet.amount, bet.odds);
    println!(
        "{} | {} on {} @ x{} | win {} | {}",
        bet.question, bet.amount, bet.option, bet.odds, win, status
    );
}
fn print_suggestion(suggestion: &Suggestion) {
    let by = suggestion
        .suggested_by
        .as_ref()
        .map(|suggester| suggester.username.as_str())
        .unwrap_or("unknown");
    println!(
        "{} [{}] {} (by {})",
        suggestion.id, suggestion.status, suggestion.question_text, by
    );
    for (i, option) in suggestion.options.iter().enumerate() {
        let multiplier = suggestion
            .multipliers
            .get(i)
            .copied()
            .unwrap_or_else(default_odds);
        println!("    {} x{}", option, multiplier);
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn option_parsing() {
        assert_eq!(
            parse_option("Team Alpha=1.8").unwrap(),
            ("Team Alpha".to_string(), dec!(1.8))
        );
        assert_eq!(parse_option(" Yes ").unwrap(), ("Yes".to_string(), dec!(1.5)));
        assert!(parse_option("No=lots").is_err());
        assert!(parse_option("  ").is_err());
    }

    #[test]
    fn expired_sessions_are_recognized() {
        assert!(session_expired(&ClientError::Unauthorized.into()));
        assert!(session_expired(
            &PlaceError::Submission(SubmissionError::SessionExpired).into()
        ));
        assert!(!session_expired(
            &SubmissionError::Rejected("Insufficient tokens".to_string()).into()
        ));
    }
}
