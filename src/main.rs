use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use high_iq::adaptive::AdaptiveConfig;
use high_iq::bank::QuestionBankClient;
use high_iq::config::Config;
use high_iq::error::SessionError;
use high_iq::history::{FileBackend, HistoryStore};
use high_iq::proxy::CachingProxy;
use high_iq::session::{SessionEngine, SessionPhase};

/// Feedback window between judging an answer and the next question.
const FEEDBACK_WINDOW: Duration = Duration::from_millis(1500);

#[derive(Parser)]
#[command(name = "high-iq", version, about = "Adaptive IQ testing with offline-first caching")]
struct Cli {
    /// Identity key to store results under (defaults to anonymous).
    #[arg(long, global = true)]
    identity: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Take an adaptive test interactively.
    Run,
    /// List stored test results for the identity.
    History,
    /// Show one stored test result in full.
    Show {
        /// Result identifier as printed by `history`.
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "High IQ starting");

    let history = HistoryStore::new(Arc::new(FileBackend::new(&config.storage.ledger_path)));

    match cli.command {
        Command::Run => run_test(&config, history, cli.identity).await,
        Command::History => {
            for result in history.list(cli.identity.as_deref()).await {
                println!(
                    "{}  {}  IQ {:>3}  {}/{} correct",
                    result.id,
                    chrono::DateTime::from_timestamp_millis(result.timestamp_ms)
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "unknown time".to_string()),
                    result.final_iq_score,
                    result.correct_answers,
                    result.total_questions,
                );
            }
            Ok(())
        }
        Command::Show { id } => {
            match history.get_by_id(&id, cli.identity.as_deref()).await {
                Some(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(())
                }
                None => {
                    eprintln!("No result with id {}", id);
                    std::process::exit(1);
                }
            }
        }
    }
}

/// Drive one interactive test session on the terminal.
async fn run_test(
    config: &Config,
    history: HistoryStore,
    identity: Option<String>,
) -> anyhow::Result<()> {
    let proxy = CachingProxy::spawn(
        config.proxy.clone(),
        &config.request,
        config.bank.base_url.clone(),
    )?;
    // Single-instance host: no previous version to wait for.
    proxy.skip_waiting().await?;

    let bank = QuestionBankClient::new(proxy.clone(), &config.bank, config.request.clone());
    let mut engine = SessionEngine::new(bank, history, proxy.connectivity(), identity);
    engine.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let question = match engine.load_question().await {
            Ok(q) => q,
            Err(e) => {
                report_session_error(&e);
                tokio::time::sleep(Duration::from_secs(2)).await;
                continue;
            }
        };

        let number = engine.session().map(|s| s.question_index + 1).unwrap_or(1);
        println!(
            "\nQuestion {}/{} (difficulty {:.1})",
            number,
            AdaptiveConfig::MAX_QUESTIONS,
            question.difficulty
        );
        println!("{}", question.question_text);
        for (i, answer) in question.answers.iter().enumerate() {
            println!("  [{}] {}", i + 1, answer.answer_text);
        }
        println!("Enter an answer number, or 'f' to finish early:");

        let was_correct = loop {
            let line = match lines.next_line().await? {
                Some(line) => line,
                None => {
                    engine.abandon();
                    return Ok(());
                }
            };

            match line.trim() {
                "f" => match engine.finish_early() {
                    Ok(()) => break None,
                    Err(e) => {
                        report_session_error(&e);
                        continue;
                    }
                },
                input => {
                    let chosen = match input.parse::<usize>() {
                        Ok(n) if n >= 1 => n - 1,
                        _ => {
                            println!("Please enter an answer number.");
                            continue;
                        }
                    };
                    match engine.submit_answer(chosen).await {
                        Ok(correct) => break Some(correct),
                        Err(e) => {
                            report_session_error(&e);
                            continue;
                        }
                    }
                }
            }
        };

        if let Some(correct) = was_correct {
            println!("{}", if correct { "Correct!" } else { "Not quite." });
            tokio::time::sleep(FEEDBACK_WINDOW).await;
            if engine.advance()? == SessionPhase::Complete {
                break;
            }
        } else {
            // Finished early; answering is done.
            break;
        }
    }

    // Scoring is retryable: a transient failure here must not cost the
    // user their answers.
    let result = loop {
        match engine.finalize().await {
            Ok(result) => break result,
            Err(e) => {
                report_session_error(&e);
                error!(error = %e, "Finalization failed, retrying in 2s");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    println!("\nTest complete!");
    println!("IQ score: {}", result.final_iq_score);
    println!(
        "Correct answers: {}/{}",
        result.correct_answers, result.total_questions
    );
    println!("Average difficulty: {:.1}", result.average_difficulty);
    println!("{}", result.result_summary);
    println!("Saved as {}", result.id);

    Ok(())
}

/// Render a session error the way the user needs to see it: a
/// connectivity problem reads differently from a backend hiccup.
fn report_session_error(e: &SessionError) {
    match e {
        SessionError::Offline => {
            println!("You're offline. Reconnect to continue; your progress is kept.")
        }
        SessionError::TooFewQuestions { answered, required } => {
            println!(
                "Answer at least {} questions before finishing ({} so far).",
                required, answered
            )
        }
        SessionError::InvalidChoice { available, .. } => {
            println!("Pick an answer between 1 and {}.", available)
        }
        other => println!("Request failed ({}). Please retry.", other),
    }
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        high_iq::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        high_iq::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
