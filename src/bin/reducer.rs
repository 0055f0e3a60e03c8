//! reducer CLI: drive a demo counter engine and inspect configuration.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use reducer_rs::config::{Config, EngineConfig};
use reducer_rs::telemetry::{TelemetryConfig, init_telemetry};
use reducer_rs::{ActionItem, Behavior, Engine, Mutator};

#[derive(Parser)]
#[command(name = "reducer", about = "Unidirectional state engine demo")]
struct Cli {
    /// Engine config TOML (environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch increase actions to a counter and print every state
    Counter {
        /// Number of increase actions to dispatch
        #[arg(long, default_value_t = 2)]
        actions: u32,
        /// Simulated work time per action
        #[arg(long, default_value_t = 10)]
        delay_ms: u64,
        /// Cancel in-flight work when the same action arrives again
        #[arg(long)]
        cancel_duplicates: bool,
    },
    /// Print the effective engine configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let engine_config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let config = Config::from_env_with(engine_config)?;

    match cli.command {
        Command::Counter {
            actions,
            delay_ms,
            cancel_duplicates,
        } => cmd_counter(config, actions, delay_ms, cancel_duplicates).await,
        Command::Config => {
            println!("name:          {}", config.engine.name);
            println!("change_buffer: {}", config.engine.change_buffer);
            println!("log_level:     {}", config.log_level);
            println!(
                "otel_endpoint: {}",
                config.otel_endpoint.as_deref().unwrap_or("-")
            );
            Ok(())
        }
    }
}

async fn cmd_counter(
    config: Config,
    actions: u32,
    delay_ms: u64,
    cancel_duplicates: bool,
) -> anyhow::Result<()> {
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "reducer".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let engine = Engine::with_config(
        Counter {
            delay: Duration::from_millis(delay_ms),
            cancel_duplicates,
        },
        config.engine,
    );
    engine.started().await?;

    let mut changes = engine.subscribe();
    println!("count: {}", engine.state());

    for _ in 0..actions {
        engine.dispatch(CounterAction::Increase);
    }

    // Every action settles within one delay; wait a little past it.
    let settle = Duration::from_millis(delay_ms.saturating_mul(2) + 50);
    while let Ok(Ok(change)) = tokio::time::timeout(settle, changes.recv()).await {
        println!("count: {} (revision {})", *change, change.revision());
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CounterAction {
    Increase,
}

enum CounterMutation {
    SetCount(u64),
}

struct Counter {
    delay: Duration,
    cancel_duplicates: bool,
}

#[async_trait]
impl Behavior for Counter {
    type State = u64;
    type Action = CounterAction;
    type Mutation = CounterMutation;

    fn initial_state(&self) -> u64 {
        0
    }

    async fn mutate(
        &self,
        _state: u64,
        action: CounterAction,
        mutator: Mutator<u64, CounterAction, CounterMutation>,
    ) -> anyhow::Result<()> {
        match action {
            CounterAction::Increase => {
                tokio::time::sleep(self.delay).await;
                mutator.mutate(CounterMutation::SetCount(mutator.state() + 1))?;
            }
        }
        Ok(())
    }

    fn reduce(&self, _state: u64, mutation: CounterMutation) -> u64 {
        match mutation {
            CounterMutation::SetCount(count) => count,
        }
    }

    fn should_cancel(
        &self,
        current: &ActionItem<u64, CounterAction>,
        upcoming: &ActionItem<u64, CounterAction>,
    ) -> bool {
        self.cancel_duplicates && current.action == upcoming.action
    }
}
