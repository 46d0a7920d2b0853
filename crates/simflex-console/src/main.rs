//! simflex console — terminal client for the simflex simulation service.
//!
//! Thin presentation shell over `simflex-core`: reads commands from stdin,
//! forwards them to the client engine, and renders the engine's event stream.

mod commands;
mod render;

use anyhow::Result;
use clap::Parser;
use commands::ConsoleCommand;
use render::Renderer;
use simflex_core::{spawn, Client, EngineConfig, WsConnector};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "simflex")]
#[command(about = "Terminal client for the simflex simulation service")]
struct Args {
    /// Server address
    #[arg(default_value = "ws://localhost:8000/")]
    server: String,

    /// Delay between job status polls, in milliseconds
    #[arg(long, default_value = "1000")]
    poll_delay_ms: u64,

    /// Directory where fetched artifacts are written
    #[arg(long, default_value = "results")]
    output_dir: PathBuf,

    /// Print events as JSON lines instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let connector = Arc::new(WsConnector::new(&args.server)?);
    let (client, mut events, engine) = spawn(
        connector,
        EngineConfig {
            poll_delay: Duration::from_millis(args.poll_delay_ms),
        },
    );

    info!("simflex console, server {}", args.server);

    // Same startup sequence as the web front-end: watch the server's
    // computing status, then list the generated instances.
    client.watch_server_status()?;
    client.list_instances()?;

    let mut renderer = Renderer::new(args.json, args.output_dir);
    let renderer_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            renderer.render(&event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match commands::parse(&line) {
            None => {}
            Some(Err(message)) => eprintln!("{message}"),
            Some(Ok(ConsoleCommand::Quit)) => break,
            Some(Ok(command)) => {
                if let Err(error) = dispatch(&client, command) {
                    eprintln!("{error:#}");
                }
            }
        }
    }

    let _ = client.shutdown();
    engine.join().await;
    renderer_task.abort();
    Ok(())
}

fn dispatch(client: &Client, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::List => client.list_instances()?,
        ConsoleCommand::Load(selector) => client.load_instance(selector)?,
        ConsoleCommand::Generate(path) => {
            let document = render::read_document(&path)?;
            client.generate_instance(document)?;
        }
        ConsoleCommand::Simulate(hash) => client.simulate_instance(hash)?,
        ConsoleCommand::Detach => client.request_detach()?,
        ConsoleCommand::Abort => client.request_abort()?,
        ConsoleCommand::Delete(hash) => client.delete_instance(hash)?,
        ConsoleCommand::Reset(hash) => client.reset_instance(hash)?,
        ConsoleCommand::Daily(hash, day) => client.fetch_daily_result(hash, day)?,
        ConsoleCommand::Global(hash) => client.fetch_global_results(hash)?,
        ConsoleCommand::Disconnect => client.disconnect()?,
        ConsoleCommand::Help => println!("{}", commands::HELP),
        // Handled by the input loop.
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
