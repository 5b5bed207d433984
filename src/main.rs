use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use sidedrop::{
    ActivationInvoker, DeliveryConfig, HandoffDispatcher, HandoffProducer, HandoffStore, Target,
    WakeChannel,
};

#[derive(Parser)]
#[command(name = "sidedrop", about = "Durable cross-process text handoff", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Queue a text payload for a destination app (the producer end)
    Submit {
        /// Destination id: ticket, note, task or journal
        #[arg(long)]
        target: String,
        /// The text to hand off
        #[arg(long)]
        text: String,
        /// Name of the originating process
        #[arg(long)]
        source: Option<String>,
        /// Extra key=value pairs carried with the record
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
    /// Run the consumer dispatch loop until interrupted
    Watch,
    /// Run a single dispatch pass (the launch-URL trigger)
    Dispatch,
    /// List pending records, optionally for one destination
    List {
        #[arg(long)]
        target: Option<String>,
    },
    /// Read and delete one record (the destination end)
    Take {
        #[arg(long)]
        target: String,
        #[arg(long)]
        id: Uuid,
    },
    /// Delete records older than the staleness threshold
    Gc {
        #[arg(long)]
        target: Option<String>,
        /// Override the configured threshold, in seconds
        #[arg(long)]
        max_age_secs: Option<u64>,
    },
}

fn parse_target(id: &str) -> Result<Target> {
    Target::from_id(id).ok_or_else(|| {
        anyhow!(
            "unknown target '{id}' (expected one of: {})",
            Target::ALL.map(|target| target.id()).join(", ")
        )
    })
}

fn parse_meta(pairs: &[String]) -> Result<Option<BTreeMap<String, String>>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut metadata = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("metadata '{pair}' is not KEY=VALUE"))?;
        metadata.insert(key.to_string(), value.to_string());
    }
    Ok(Some(metadata))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let config = DeliveryConfig::resolve().context("resolving shared storage")?;
    let store = HandoffStore::new(&config);

    match cli.command {
        Command::Submit {
            target,
            text,
            source,
            meta,
        } => {
            let target = parse_target(&target)?;
            let producer = HandoffProducer::new(
                store,
                WakeChannel::new(&config),
                ActivationInvoker::new(&config),
            );
            let record = producer
                .submit(target, text, source, parse_meta(&meta)?)
                .await?;
            println!(
                "queued {} for {} ({})",
                record.request_id,
                record.target_id.display_name(),
                record.target_id.action_label()
            );
        }
        Command::Watch => {
            let wake = WakeChannel::new(&config);
            let dispatcher =
                HandoffDispatcher::new(store, ActivationInvoker::new(&config), config);

            let cancel_token = CancellationToken::new();
            let signal_token = cancel_token.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_token.cancel();
                }
            });

            dispatcher.run(&wake, cancel_token).await;
        }
        Command::Dispatch => {
            let dispatcher =
                HandoffDispatcher::new(store, ActivationInvoker::new(&config), config);
            match dispatcher.process_pending().await {
                Some(request_id) => println!("attempted delivery of {request_id}"),
                None => println!("nothing pending"),
            }
        }
        Command::List { target } => {
            let targets: Vec<Target> = match target {
                Some(id) => vec![parse_target(&id)?],
                None => Target::ALL.to_vec(),
            };
            let mut total = 0;
            for target in targets {
                for key in store.list_pending(target)? {
                    println!("{key}");
                    total += 1;
                }
            }
            if total == 0 {
                println!("no pending records");
            }
        }
        Command::Take { target, id } => {
            let target = parse_target(&target)?;
            let record = store.take(target, id)?;
            println!("{}", record.payload_text);
        }
        Command::Gc {
            target,
            max_age_secs,
        } => {
            let target = target.as_deref().map(parse_target).transpose()?;
            let max_age = max_age_secs
                .map(Duration::from_secs)
                .unwrap_or(config.stale_max_age);
            let cleaned = store.collect_stale(max_age, target)?;
            println!("reaped {cleaned} stale record(s)");
        }
    }

    Ok(())
}
