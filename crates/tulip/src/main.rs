//! A simple program demonstrates how to use `tulip` as a library.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::pin::pin;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tulip::{Session, SessionBuilder};
use tulip_core::TranscriptSource;
use tulip_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return;
    };
    let mut config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        config = config.with_model(model);
    }
    if let Ok(model) = env::var("OPENAI_EMBEDDING_MODEL") {
        config = config.with_embedding_model(model);
    }
    let provider = OpenAIProvider::new(config.build());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let session = SessionBuilder::with_providers(provider.clone(), provider)
        .on_transcript(move |transcript, source| {
            event_tx.send((transcript.to_owned(), source)).ok();
        })
        .build()
        .await;
    let session = match session {
        Ok(session) => session,
        Err(err) => {
            eprintln!("failed to set up the tool library: {err}");
            return;
        }
    };

    let query: Vec<String> = env::args().skip(1).collect();
    if !query.is_empty() {
        run_query(&session, &query.join(" "), &mut event_rx).await;
        return;
    }

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        run_query(&session, line, &mut event_rx).await;
    }
}

async fn run_query(
    session: &Session,
    query: &str,
    event_rx: &mut mpsc::UnboundedReceiver<(String, TranscriptSource)>,
) {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(progress_style);
    progress_bar.set_message("🤔 Thinking...");

    let mut response = pin!(session.query(query));
    let result = loop {
        select! {
            biased;
            result = &mut response => break result,
            Some((transcript, source)) = event_rx.recv() => {
                print_transcript(&progress_bar, &transcript, source);
            }
            _ = sleep(Duration::from_millis(100)) => {
                progress_bar.inc(1);
            }
        }
    };
    let mut pending = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        pending.push(event);
    }
    // The final answer is printed below.
    if result.is_ok()
        && matches!(pending.last(), Some((_, TranscriptSource::Assistant)))
    {
        pending.pop();
    }
    for (transcript, source) in pending {
        print_transcript(&progress_bar, &transcript, source);
    }
    progress_bar.finish_and_clear();

    match result {
        Ok(response) => {
            println!(
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                response.answer().bright_white()
            );
        }
        Err(err) => {
            error!("query failed: {err}");
            println!("{}❌ {err}", BAR_CHAR.bright_red());
        }
    }
}

fn print_transcript(
    progress_bar: &ProgressBar,
    transcript: &str,
    source: TranscriptSource,
) {
    let line = match source {
        TranscriptSource::Assistant if !transcript.is_empty() => {
            format!("{}{}", BAR_CHAR.bright_black(), transcript.dimmed())
        }
        TranscriptSource::Tool => {
            format!("{}🔧 {}", BAR_CHAR.bright_yellow(), transcript.dimmed())
        }
        _ => return,
    };
    progress_bar.suspend(|| println!("{line}"));
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
