//! Apprentice application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Build the console client
//! 3. Open a training session (direct topic or knowledge gap)
//! 4. Run the interactive loop on stdin until `:quit`, EOF, Ctrl-C or a read error
//! 5. Drain pending knowledge writes before exiting, however the loop ended

mod cli;
mod repl;

use std::future::Future;
use std::io::Write;

use apprentice_client::{ConsoleClient, GapDirectory, TrainingFinalizer};
use apprentice_core::config::ApprenticeConfig;
use apprentice_core::error::ApprenticeError;
use apprentice_core::types::{AgentId, GapId, TopicBinding};
use apprentice_session::{
    BootstrapOutcome, Collaborators, OpenedSession, SessionBootstrap, SessionCloser,
    SessionError, SessionSettings, Step, TrainingSession, TurnReport, WriteFailure,
};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::cli::{CliArgs, Command};
use crate::repl::{
    parse_input, render_failures, render_finalized, render_gaps, render_report, render_status,
    Input, HELP,
};

/// Run `future` unless Ctrl-C arrives first.
async fn interruptible<T>(future: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        value = future => Some(value),
        _ = tokio::signal::ctrl_c() => None,
    }
}

fn prompt() {
    print!("> ");
    // A failed flush only delays the prompt.
    let _ = std::io::stdout().flush();
}

/// Print the outcome of a turn and remember writes that need resubmitting.
fn show_turn(result: Result<TurnReport, SessionError>, failed: &mut Vec<WriteFailure>) {
    match result {
        Ok(mut report) => {
            print!("{}", render_report(&report));
            failed.append(&mut report.failed_writes);
        }
        Err(e) => println!("[{}]", e),
    }
}

async fn list_gaps(client: &ConsoleClient, agent_id: &AgentId) -> Result<(), ApprenticeError> {
    let gaps = client.open_gaps(agent_id).await?;
    tracing::info!(agent_id = %agent_id, count = gaps.len(), "Open gaps listed");
    print!("{}", render_gaps(&gaps));
    Ok(())
}

/// Read operator lines from `input` and drive the session until `:quit`,
/// end of input or Ctrl-C.
///
/// A read error ends the loop and is returned; the caller still drains the
/// session.
async fn converse<R>(
    session: &mut TrainingSession,
    closer: &SessionCloser,
    finalizer: &dyn TrainingFinalizer,
    input: R,
    failed: &mut Vec<WriteFailure>,
) -> Result<(), ApprenticeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        prompt();
        let line = match interruptible(lines.next_line()).await {
            Some(Ok(Some(line))) => line,
            Some(Ok(None)) => return Ok(()),
            Some(Err(e)) => {
                tracing::error!(error = %e, "Failed to read operator input; ending session");
                return Err(e.into());
            }
            None => {
                closer.close();
                return Ok(());
            }
        };

        match parse_input(&line) {
            Input::Empty => {}
            Input::Quit => return Ok(()),
            Input::Help => println!("{}", HELP),
            Input::Status => print!("{}", render_status(session)),
            Input::Unknown(command) => println!("[unknown command {}; type :help]", command),
            Input::Teach(text) => match interruptible(session.submit(&text)).await {
                Some(result) => show_turn(result, failed),
                None => {
                    closer.close();
                    return Ok(());
                }
            },
            Input::Retry => match interruptible(session.retry_analysis()).await {
                Some(result) => show_turn(result, failed),
                None => {
                    closer.close();
                    return Ok(());
                }
            },
            Input::Finalize => match interruptible(session.finalize(finalizer)).await {
                Some(Ok(finalized)) => print!("{}", render_finalized(&finalized)),
                Some(Err(e)) => println!("[{}]", e),
                None => {
                    closer.close();
                    return Ok(());
                }
            },
            Input::RetryWrites => {
                if failed.is_empty() {
                    println!("[nothing to resubmit]");
                }
                for failure in std::mem::take(failed) {
                    match session.retry_write(failure).await {
                        Ok(status) => println!("[resubmitted: {:?}]", status),
                        Err(e) => println!("[{}]", e),
                    }
                }
            }
            Input::Bind(binding) => {
                match session.bind_topic(binding).await {
                    Ok(statuses) => println!(
                        "[topic bound; {} saved increment(s) queued]",
                        statuses.len()
                    ),
                    Err(e) => {
                        println!("[{}]", e);
                        continue;
                    }
                }
                if session.step() == Step::Clarifying {
                    match interruptible(session.retry_analysis()).await {
                        Some(result) => show_turn(result, failed),
                        None => {
                            closer.close();
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Run the interactive loop, then drain pending writes however it ended.
async fn run_conversation<R>(
    mut session: TrainingSession,
    closer: SessionCloser,
    finalizer: &dyn TrainingFinalizer,
    input: R,
) -> Result<(), ApprenticeError>
where
    R: AsyncBufRead + Unpin,
{
    let mut failed: Vec<WriteFailure> = Vec::new();
    let result = converse(&mut session, &closer, finalizer, input, &mut failed).await;

    let remaining = session.shutdown().await;
    if !remaining.is_empty() {
        print!("{}", render_failures(&remaining));
        tracing::warn!(count = remaining.len(), "Session ended with unsaved knowledge");
    }
    println!("Goodbye.");
    result
}

async fn run_session(
    bootstrap: SessionBootstrap,
    collaborators: Collaborators,
) -> Result<(), ApprenticeError> {
    let OpenedSession {
        session,
        closer,
        opening,
        outcome,
    } = bootstrap.open(&collaborators).await;

    if let BootstrapOutcome::Unresolved { gap_id, reason } = &outcome {
        println!("[gap {} not resolved: {}]", gap_id, reason);
    }
    println!("{}\n", opening);
    println!("{}\n", HELP);

    run_conversation(
        session,
        closer,
        collaborators.finalizer.as_ref(),
        BufReader::new(tokio::io::stdin()),
    )
    .await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so its log level can apply.
    let config_file = args.resolve_config_path();
    let (mut config, config_error) = if config_file.exists() {
        match ApprenticeConfig::load(&config_file) {
            Ok(config) => (config, None),
            Err(e) => (ApprenticeConfig::default(), Some(e)),
        }
    } else {
        (ApprenticeConfig::default(), None)
    };

    // Tracing. RUST_LOG wins over the configured level.
    let log_level = args.resolve_log_level(&config);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Apprentice v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = config_error {
        tracing::warn!(path = %config_file.display(), error = %e, "Failed to load config. Using defaults.");
    }

    config.console.base_url = args.resolve_console_url(&config);
    config.validate()?;

    let client = ConsoleClient::from_config(&config.console)?;
    tracing::info!(base_url = %client.base_url(), "Console client ready");

    let agent_id = args.resolve_agent(&config).ok_or_else(|| {
        ApprenticeError::Config("no agent given: pass --agent or set console.agent_id".to_string())
    })?;

    let bootstrap = match args.command {
        Command::Gaps => {
            list_gaps(&client, &agent_id).await?;
            return Ok(());
        }
        Command::Teach {
            topic_id,
            topic_name,
        } => {
            let topic_name = topic_name.unwrap_or_else(|| topic_id.clone());
            SessionBootstrap::direct(agent_id, TopicBinding::new(topic_id, topic_name))
        }
        Command::Gap { gap_id } => SessionBootstrap::from_gap(agent_id, GapId::new(gap_id)),
    };

    let settings = SessionSettings::from_config(&config);
    run_session(
        bootstrap.with_settings(settings),
        Collaborators::from_console(client),
    )
    .await?;

    Ok(())
}
