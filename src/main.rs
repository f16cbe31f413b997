//! Terminal runner driving a timed competition attempt end to end.

use std::sync::Arc;

use anyhow::Context;
use futures::future::BoxFuture;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use olympiad_attempt_engine::{
    config::AppConfig,
    dao::{
        drafts::{DraftStore, FileDraftStore},
        http::{HttpBackendConfig, HttpQuizBackend},
    },
    dto::validation::AnswerFormat,
    services::{attempt_service::AttemptFlow, confirm::Confirm, countdown::Countdown},
    state::{
        EngineEvent, SharedAttempt,
        attempt::SaveStatus,
        state_machine::{AttemptPhase, SubmitReason},
    },
};

/// Stdin line reader shared between the command loop and the confirmation
/// prompt.
type SharedLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let quiz_id: i64 = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("QUIZ_ID").ok())
        .and_then(|value| value.parse().ok())
        .context("usage: olympiad-attempt-engine <quiz-id>")?;

    let mut http_config =
        HttpBackendConfig::new(config.base_url()).with_timeout(config.http_timeout());
    if let Ok(token) = std::env::var("QUIZ_API_TOKEN")
        && !token.is_empty()
    {
        http_config = http_config.with_auth_token(token);
    }
    let backend = Arc::new(HttpQuizBackend::new(http_config).context("building API client")?);
    let drafts: Arc<dyn DraftStore> = Arc::new(FileDraftStore::open(config.draft_path()));

    let lines: SharedLines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let confirm = Arc::new(LineConfirm {
        lines: lines.clone(),
    });

    let flow = Arc::new(
        AttemptFlow::start(
            backend,
            drafts,
            confirm,
            quiz_id,
            config.autosave_window(),
        )
        .await
        .context("loading the attempt")?,
    );
    let state = flow.state().clone();

    let _countdown = Countdown::spawn(state.clone()).map(|(countdown, expired_rx)| {
        let expiry_flow = flow.clone();
        tokio::spawn(async move {
            if expired_rx.await.is_ok() {
                expiry_flow.handle_expiry().await;
            }
        });
        countdown
    });

    let mut events = state.events().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(_)) => continue,
            }
        }
    });

    println!("Commands: /next /prev /goto N /submit /quit; anything else is your answer.");
    render(&state).await;

    loop {
        if let AttemptPhase::Submitted { .. } = state.phase().await {
            break;
        }

        let line = {
            let mut guard = lines.lock().await;
            guard.next_line().await.context("reading stdin")?
        };
        let Some(line) = line else { break };
        let input = line.trim().to_string();
        if input.is_empty() {
            continue;
        }

        let result = match input.as_str() {
            "/quit" => break,
            "/next" => flow.next().await.map(|_| ()),
            "/prev" => flow.previous().await.map(|_| ()),
            "/submit" => flow.submit().await.map(|_| ()),
            command if command.starts_with("/goto") => {
                match command
                    .trim_start_matches("/goto")
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                {
                    Some(target) => flow.jump_to(target).await.map(|_| ()),
                    None => {
                        println!("usage: /goto <question number>");
                        continue;
                    }
                }
            }
            command if command.starts_with('/') => {
                println!("unknown command `{command}`");
                continue;
            }
            answer => flow.set_answer(answer).await,
        };

        match result {
            Ok(()) => match state.phase().await {
                AttemptPhase::Submitted { reason } => {
                    print_submitted(reason);
                    break;
                }
                AttemptPhase::Answering { .. } => render(&state).await,
            },
            Err(err) => println!("! {err}"),
        }
    }

    Ok(())
}

/// Print the current slot, its answer state, and the attempt progress.
async fn render(state: &SharedAttempt) {
    let Some(slot_index) = state.current_slot().await else {
        return;
    };
    let attempt = state.attempt();
    let Some(slot) = attempt.slot(slot_index) else {
        return;
    };
    let sheet = state.sheet().read().await;

    println!();
    println!(
        "Question {}/{} [{} {}]",
        slot_index + 1,
        attempt.len(),
        slot.mark,
        if slot.mark == 1 { "mark" } else { "marks" }
    );
    println!("{}", slot.prompt);
    if let Some(url) = &slot.image_url {
        println!("(diagram: {url})");
    }
    match slot.format {
        AnswerFormat::Single => println!("Your answer must be an integer from 0-999."),
        AnswerFormat::Multiple => {
            println!("Your answer must be integers from 0-999, use \",\" to separate them.")
        }
    }

    if let Some(entry) = sheet.entry(slot_index) {
        if !entry.answer.is_empty() {
            let indicator = match entry.save {
                SaveStatus::Saved => "saved",
                SaveStatus::Pending => "not saved",
            };
            println!("Current answer: {} ({indicator})", entry.answer);
        }
        if let Some(err) = &entry.error {
            println!("! {err}");
        }
    }
    println!("Answered: {}/{}", sheet.answered_count(), attempt.len());
}

fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::Tick { remaining_secs } => {
            // A full clock line every minute, then a second-by-second tail.
            if *remaining_secs <= 10 || remaining_secs % 60 == 0 {
                println!("Time left: {}", format_clock(*remaining_secs));
            }
        }
        EngineEvent::Expired => {
            println!("Time is up! Press Enter to finish.");
        }
        EngineEvent::SaveState {
            status: SaveStatus::Saved,
            ..
        } => {
            println!("✓ Answer saved");
        }
        EngineEvent::Notice { message } => {
            println!("! {message}");
        }
        _ => {}
    }
}

fn print_submitted(reason: SubmitReason) {
    match reason {
        SubmitReason::Confirmed => println!("Attempt submitted. Good luck!"),
        SubmitReason::TimeExpired => println!("Time expired; your attempt has been submitted."),
    }
}

fn format_clock(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Confirmation prompt reading its answer from the shared stdin reader.
struct LineConfirm {
    lines: SharedLines,
}

impl Confirm for LineConfirm {
    fn confirm(&self, prompt: &str) -> BoxFuture<'static, bool> {
        let lines = self.lines.clone();
        let prompt = prompt.to_string();
        Box::pin(async move {
            println!("{prompt} [y/N]");
            let mut guard = lines.lock().await;
            match guard.next_line().await {
                Ok(Some(line)) => {
                    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
                }
                _ => false,
            }
        })
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
