//! Recital practice console.
//!
//! Headless harness around the `recital-core` engine: fetches a script
//! (HTTP API or the built-in canned set), stores finished scores in SQLite,
//! and simulates the recognizer from stdin — every plain line you type is
//! treated as recognized speech, while `:`-prefixed lines are commands.

mod console;
mod script_client;
mod settings;
mod storage;

use std::sync::Arc;

use recital_core::{
    EngineConfig, MicStatus, RecitalEngine, RecognizerProvider, ScoreSink, ScriptProvider,
    ScriptRequest,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use console::ConsoleRecognizer;
use script_client::{CannedScriptProvider, HttpScriptProvider};
use settings::{default_data_dir, default_settings_path, load_settings, save_settings};
use storage::LocalStore;

const HELP: &str = "commands:
  :start            begin the attempt (then type what you'd be saying)
  :pause / :resume  suspend and continue listening
  :skip             give up on the current word
  :restart          fresh attempt on the same script
  :new <topic> [duration]   fetch a new script (e.g. :new Travel 5-minute)
  :scores           your top 5 scores
  :recent           your latest attempts
  :status           where you are in the script
  :quit             leave";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings_path = default_settings_path();
    let settings = load_settings(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = save_settings(&settings_path, &settings) {
            warn!(error = %e, "could not write default settings file");
        }
    }
    info!(?settings_path, "settings loaded");

    let db_path = settings
        .db_path
        .clone()
        .unwrap_or_else(|| default_data_dir().join("scores.sqlite"));
    let store = Arc::new(LocalStore::open(&db_path)?);

    let scripts: Arc<dyn ScriptProvider> = match settings.api_base_url.as_deref() {
        Some(base_url) => {
            info!(%base_url, "using HTTP script provider");
            Arc::new(HttpScriptProvider::new(base_url)?)
        }
        None => {
            info!("no API configured — using canned scripts");
            Arc::new(CannedScriptProvider)
        }
    };

    let recognizer = Arc::new(ConsoleRecognizer::new());

    let mut config = EngineConfig::default();
    config.recognizer.language = settings.language.clone();
    let engine = Arc::new(RecitalEngine::new(
        config,
        scripts,
        Arc::clone(&recognizer) as Arc<dyn RecognizerProvider>,
        Arc::clone(&store) as Arc<dyn ScoreSink>,
    ));

    let mut request = ScriptRequest {
        topic: settings.default_topic.clone(),
        duration_id: settings.default_duration.clone(),
    };
    prepare_and_show(&engine, &request).await;

    spawn_event_printers(Arc::clone(&engine), Arc::clone(&store));

    println!("{HELP}");

    let (line_tx, mut line_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    std::thread::spawn(move || {
        use std::io::BufRead;
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    while let Some(line) = line_rx.recv().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix(':') {
            if !handle_command(&engine, &store, &recognizer, &mut request, command).await {
                break;
            }
        } else if !recognizer.push_line(&line) {
            println!("(not listening — :start or :resume first)");
        }
    }

    engine.abandon_for_new_script();
    Ok(())
}

/// Returns `false` when the user asked to quit.
async fn handle_command(
    engine: &Arc<RecitalEngine>,
    store: &Arc<LocalStore>,
    recognizer: &Arc<ConsoleRecognizer>,
    request: &mut ScriptRequest,
    command: &str,
) -> bool {
    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or_default() {
        "start" => report(engine.start_session()),
        "pause" => report(engine.pause()),
        "resume" => report(engine.resume()),
        "skip" => report(engine.skip_current_word()),
        "restart" => report(engine.restart_attempt()),
        "new" => {
            if let Some(topic) = parts.next() {
                request.topic = topic.to_string();
            }
            if let Some(duration) = parts.next() {
                request.duration_id = duration.to_string();
            }
            engine.abandon_for_new_script();
            prepare_and_show(engine, request).await;
        }
        "scores" => match store.top_scores(5) {
            Ok(scores) => print_scores(&scores),
            Err(e) => warn!(error = %e, "score query failed"),
        },
        "recent" => match store.recent_scores(10) {
            Ok(scores) => print_scores(&scores),
            Err(e) => warn!(error = %e, "score query failed"),
        },
        "status" => print_status(engine, recognizer),
        "quit" | "exit" => return false,
        other => println!("unknown command :{other}\n{HELP}"),
    }
    true
}

fn print_scores(scores: &[storage::StoredScore]) {
    if scores.is_empty() {
        println!("no scores yet");
        return;
    }
    for (rank, score) in scores.iter().enumerate() {
        println!(
            "  #{} {:<14} {:<9} {:>3}  ({}% accuracy, {}/{} words, {}s)",
            rank + 1,
            score.topic,
            score.duration_id,
            score.score,
            score.accuracy,
            score.words_matched,
            score.total_words,
            score.time_taken,
        );
    }
}

fn report(result: recital_core::error::Result<()>) {
    if let Err(e) = result {
        println!("({e})");
    }
}

/// Runs the (possibly HTTP-backed) fetch on the blocking pool so a slow
/// generator never stalls the event printers.
async fn prepare_and_show(engine: &Arc<RecitalEngine>, request: &ScriptRequest) {
    let fetch_engine = Arc::clone(engine);
    let fetch_request = request.clone();
    let prepared = tokio::task::spawn_blocking(move || fetch_engine.prepare(fetch_request))
        .await
        .unwrap_or_else(|e| Err(recital_core::RecitalError::ScriptFetch(e.to_string())));
    match prepared {
        Ok(plan) => {
            let snapshot = engine.snapshot();
            println!(
                "\n── {} · {} · {} words · aim for {}s ──",
                request.topic, request.duration_id, snapshot.total_words, plan.expected_seconds
            );
            println!("{}\n", plan.text);
            if !plan.vocabulary.is_empty() {
                println!("vocabulary worth knowing:");
                for hint in &plan.vocabulary {
                    println!("  {} — {}", hint.word, hint.meaning);
                }
                println!();
            }
            println!("type :start when ready");
        }
        Err(e) => println!("could not fetch a script: {e}"),
    }
}

fn print_status(engine: &Arc<RecitalEngine>, recognizer: &Arc<ConsoleRecognizer>) {
    let snapshot = engine.snapshot();
    println!(
        "phase {:?} · mic {} · word {}/{} · {} matched · {} skipped · {}s / {}s",
        snapshot.phase,
        if recognizer.is_listening() { "open" } else { "closed" },
        snapshot.cursor,
        snapshot.total_words,
        snapshot.matched_count,
        snapshot.skipped_count,
        snapshot.elapsed_seconds,
        snapshot.expected_seconds,
    );
}

fn spawn_event_printers(engine: Arc<RecitalEngine>, store: Arc<LocalStore>) {
    let mut status_rx = engine.subscribe_status();
    tokio::spawn(async move {
        while let Ok(event) = status_rx.recv().await {
            match (event.status, event.detail) {
                (MicStatus::Error, Some(detail)) => println!("⚠ {detail}"),
                (MicStatus::Error, None) => println!("⚠ microphone error"),
                (MicStatus::Listening, _) => println!("● listening"),
                (MicStatus::Idle, _) => {}
            }
        }
    });

    let mut progress_rx = engine.subscribe_progress();
    tokio::spawn(async move {
        let mut last_cursor = 0usize;
        while let Ok(event) = progress_rx.recv().await {
            if event.cursor != last_cursor {
                last_cursor = event.cursor;
                let to_go = event.total_words.saturating_sub(event.cursor);
                println!("  {}/{} ({} to go)", event.cursor, event.total_words, to_go);
            }
        }
    });

    let mut outcome_rx = engine.subscribe_outcome();
    tokio::spawn(async move {
        while let Ok(event) = outcome_rx.recv().await {
            let result = event.result;
            println!("\n═══ attempt complete ═══");
            println!("score      {}", result.final_score);
            println!("  time     {}/30", result.time_component);
            println!("  accuracy {}/50 ({}%)", result.accuracy_component, result.accuracy_percent);
            println!("  fluency  {}/20", result.fluency_component);
            match store.top_scores(5) {
                Ok(scores) if !scores.is_empty() => {
                    println!("top scores:");
                    for (rank, score) in scores.iter().enumerate() {
                        println!("  #{} {} — {}", rank + 1, score.topic, score.score);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "score query failed"),
            }
            println!(":restart to try again, :new for a fresh script");
        }
    });
}
