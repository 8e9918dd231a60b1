use std::time::Duration;

use clap::Subcommand;
use factday_core::{GuessInput, Phase, Rejection, SessionEngine};
use serde_json::json;

use super::{print_events, print_json, CliResult};

#[derive(Subcommand)]
pub enum PlayAction {
    /// Print the current session as JSON
    Status,
    /// Load today's challenge
    Load,
    /// Reveal a fact by index
    Reveal {
        /// Zero-based fact index
        index: usize,
    },
    /// Submit a guess
    Guess {
        /// Guess text
        text: String,
    },
    /// Skip to the next clue
    Skip,
    /// Pick a Final Five option
    Select {
        /// Option text as offered
        option: String,
    },
    /// Advance the running countdown
    Tick {
        #[arg(long, default_value = "1")]
        seconds: u32,
    },
    /// Tick once per second until the countdown stops
    Watch,
    /// Fetch the Final Five options (also retries a failed fetch)
    FinalFive,
}

/// Whether a countdown is currently running.
fn is_counting_down(engine: &SessionEngine) -> bool {
    match engine.phase() {
        Phase::Playing => engine.timer().is_active,
        Phase::FinalFiveActive => engine.final_five().is_active,
        Phase::FinalFiveTransition { .. } => engine.final_five().error.is_none(),
        Phase::RevealingAnswer { .. } => true,
        _ => false,
    }
}

async fn watch(engine: &mut SessionEngine) -> CliResult {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    // First tick completes immediately.
    interval.tick().await;
    while is_counting_down(engine) {
        interval.tick().await;
        engine.on_tick().await;
        print_events(engine)?;
        engine.save_snapshot();
    }
    Ok(())
}

pub async fn run(action: PlayAction) -> CliResult {
    let mut engine = super::open_engine()?;

    if engine.phase() == Phase::Loading {
        engine.load_challenge().await?;
    }
    engine.advance().await;

    let outcome: Result<(), Rejection> = match action {
        PlayAction::Status | PlayAction::Load => Ok(()),
        PlayAction::Reveal { index } => engine.reveal_fact(index),
        PlayAction::Guess { text } => engine.submit_guess(GuessInput::Text(text)).await,
        PlayAction::Skip => engine.submit_guess(GuessInput::Skip).await,
        PlayAction::Select { option } => engine.select_option(&option).await,
        PlayAction::Tick { seconds } => {
            for _ in 0..seconds {
                engine.on_tick().await;
            }
            Ok(())
        }
        PlayAction::FinalFive => engine.enter_final_five().await,
        PlayAction::Watch => {
            watch(&mut engine).await?;
            Ok(())
        }
    };

    print_events(&mut engine)?;
    if let Err(rejection) = outcome {
        println!(
            "{}",
            json!({
                "type": "rejected",
                "reason": rejection,
                "message": rejection.to_string(),
            })
        );
    }
    print_json(&engine.status())?;

    engine.save_snapshot();
    Ok(())
}
