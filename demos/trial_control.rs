//! Interactive console for one recording trial.
//!
//! Usage: `cargo run --example trial_control -- [config.yaml]`
//!
//! Commands, one per line:
//!   r  start     p  pause     u  unpause     s  stop
//!   q  re-read the trial      x  exit
//!   sel <guid> on|off         toggle one signal (guid in hex or decimal)
//!   anything else is written as the trial comment

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xipp_trial::session::permitted_actions;
use xipp_trial::{ClientConfig, TrialSnapshot, UserCommand, Xipp, XippError};

fn parse_guid(text: &str) -> Result<u32> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.with_context(|| format!("invalid signal guid '{}'", text))
}

fn parse_command(line: &str) -> Result<Option<UserCommand>> {
    let line = line.trim();
    let command = match line {
        "" => return Ok(None),
        "r" => UserCommand::Start,
        "p" => UserCommand::Pause,
        "u" => UserCommand::Unpause,
        "s" => UserCommand::Stop,
        "q" => UserCommand::Query,
        "x" => UserCommand::Exit,
        _ => match line.strip_prefix("sel ") {
            Some(args) => {
                let mut parts = args.split_whitespace();
                let (Some(guid), Some(state), None) = (parts.next(), parts.next(), parts.next())
                else {
                    bail!("usage: sel <guid> on|off");
                };
                let selected = match state {
                    "on" => true,
                    "off" => false,
                    other => bail!("expected on or off, got '{}'", other),
                };
                UserCommand::SetSignalSelection { guid: parse_guid(guid)?, selected }
            }
            None => UserCommand::Comment(line.to_string()),
        },
    };
    Ok(Some(command))
}

fn render(snapshot: &TrialSnapshot) {
    println!("{}", snapshot.summary());
    if let Some(status) = snapshot.status() {
        let actions: Vec<_> = permitted_actions(status).iter().map(|a| a.name()).collect();
        println!("Allowed: {}", actions.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::load(&path).with_context(|| format!("loading {}", path))?,
        None => ClientConfig::default(),
    };
    info!(listen = %config.listen_addr, request = %config.request_addr, "Starting trial console");

    let connection = Xipp::connect(config).await.context("opening connection")?;
    let mut updates = connection.snapshot_updates();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_shown = None;

    loop {
        tokio::select! {
            update = updates.next() => {
                let Some(snapshot) = update else { break };
                // datagram counters change constantly; redraw on session changes only
                let shown = (snapshot.phase, snapshot.status(), snapshot.comment.clone(), snapshot.items_received);
                if last_shown.as_ref() != Some(&shown) {
                    render(&snapshot);
                    last_shown = Some(shown);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match parse_command(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("{:#}", e);
                        continue;
                    }
                };
                let exiting = command == UserCommand::Exit;
                match connection.submit(command).await {
                    Ok(()) if exiting => break,
                    Ok(()) => {}
                    Err(e @ XippError::CommandRejected { .. }) => warn!("{}", e),
                    Err(e) => return Err(e).context("session ended"),
                }
            }
        }
    }

    connection.shutdown().await.context("control loop failed")?;
    Ok(())
}
