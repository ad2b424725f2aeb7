//! Driver spawns and runs the session control loop

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::command::CommandChannel;
use crate::config::ClientConfig;
use crate::session::{TrialSession, TrialSnapshot, UserCommand};
use crate::stats::NetworkStats;
use crate::transport::Transport;
use crate::wire::{ConfigFrame, frames};
use crate::{Result, XippError};

/// Pending user commands are buffered up to this many.
const COMMAND_QUEUE_DEPTH: usize = 16;

/// A user command and where to report its outcome.
#[derive(Debug)]
pub struct CommandRequest {
    pub command: UserCommand,
    pub reply: oneshot::Sender<Result<()>>,
}

/// Result of spawning the control loop
pub struct DriverChannels {
    /// Latest session state, republished after every change
    pub snapshots: watch::Receiver<TrialSnapshot>,
    /// Command source, drained once per refresh interval
    pub commands: mpsc::Sender<CommandRequest>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Resolves when the loop ends; `Err` for fatal failures
    pub task: JoinHandle<Result<()>>,
}

/// Driver spawns and manages the control loop task
///
/// One task owns the transport and the [`TrialSession`]. Sending and receive
/// processing never overlap, so session state needs no locking.
pub struct Driver;

impl Driver {
    /// Spawn the control loop for the given transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T>(transport: T, config: ClientConfig) -> DriverChannels
    where
        T: Transport,
    {
        let (snapshot_tx, snapshot_rx) = watch::channel(TrialSnapshot::default());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let cancel = CancellationToken::new();
        let cancel_loop = cancel.clone();

        let task = tokio::spawn(async move {
            let result =
                Self::control_loop(transport, config, snapshot_tx, command_rx, cancel_loop).await;
            if let Err(e) = &result {
                error!("Control loop ended: {}", e);
            }
            result
        });

        DriverChannels { snapshots: snapshot_rx, commands: command_tx, cancel, task }
    }

    async fn control_loop<T>(
        transport: T,
        config: ClientConfig,
        snapshot_tx: watch::Sender<TrialSnapshot>,
        mut commands: mpsc::Receiver<CommandRequest>,
        cancel: CancellationToken,
    ) -> Result<()>
    where
        T: Transport,
    {
        let channel = CommandChannel::new(transport, config.request_addr, config.send_attempts);
        let mut session = TrialSession::from_config(&config);
        let mut stats = NetworkStats::default();
        let mut buf = vec![0u8; config.max_datagram_bytes];
        let refresh_interval = config.refresh_interval();
        let receive_timeout = config.receive_timeout();

        info!("Searching for an Operator via {}", channel.destination());
        channel.send(&session.start()).await.inspect_err(|e| {
            error!("Could not send the Operator query: {}", e);
        })?;
        publish(&snapshot_tx, &session, &stats);

        let mut last_tick = Instant::now();
        loop {
            if cancel.is_cancelled() {
                info!("Control loop cancelled");
                break;
            }

            // At most one tick per iteration, however many intervals were missed.
            if last_tick.elapsed() >= refresh_interval {
                last_tick = Instant::now();
                if Self::run_commands(&channel, &mut session, &mut commands).await {
                    info!("Exit requested");
                    publish(&snapshot_tx, &session, &stats);
                    break;
                }
                let refresh = session.tick();
                send_or_defer(&channel, &mut session, refresh).await;
                publish(&snapshot_tx, &session, &stats);
            }

            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Control loop cancelled during receive");
                    break;
                }
                received = tokio::time::timeout(receive_timeout, channel.recv(&mut buf)) => received,
            };
            let len = match received {
                Err(_) => continue,
                Ok(Ok(len)) => len,
                Ok(Err(e)) => {
                    error!("Receive failed: {}", e);
                    publish(&snapshot_tx, &session, &stats);
                    return Err(e);
                }
            };

            stats.record_datagram(len);
            let mut changed = false;
            for frame in frames(&buf[..len]) {
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Dropping rest of datagram: {}", e);
                        stats.record_truncated();
                        break;
                    }
                };
                stats.record_frame(&frame);
                if !frame.is_config() {
                    continue;
                }
                let config_frame = match frame.to_config() {
                    Ok(config_frame) => config_frame,
                    Err(e) => {
                        warn!("Malformed configuration frame: {}", e);
                        continue;
                    }
                };
                trace!(
                    "Config frame from {} for property {}",
                    config_frame.source(),
                    config_frame.target.property
                );
                changed = true;
                match session.handle_frame(&config_frame) {
                    Ok(outgoing) => send_or_defer(&channel, &mut session, outgoing).await,
                    Err(e) => {
                        publish(&snapshot_tx, &session, &stats);
                        return Err(e);
                    }
                }
            }
            if changed {
                publish(&snapshot_tx, &session, &stats);
            }
        }

        info!("Control loop ended after {} datagrams", stats.datagrams);
        Ok(())
    }

    /// Apply every queued command. Returns `true` when Exit was requested.
    async fn run_commands<T: Transport>(
        channel: &CommandChannel<T>,
        session: &mut TrialSession,
        commands: &mut mpsc::Receiver<CommandRequest>,
    ) -> bool {
        loop {
            let request = match commands.try_recv() {
                Ok(request) => request,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return false,
            };
            debug!("User command {:?}", request.command);
            if request.command == UserCommand::Exit {
                let _ = request.reply.send(Ok(()));
                return true;
            }

            let outcome = match session.handle_command(request.command) {
                Ok(outgoing) => send_all(channel, session, outgoing).await,
                Err(e) => {
                    warn!("{}", e);
                    Err(e)
                }
            };
            let _ = request.reply.send(outcome);
        }
    }
}

/// Send every frame, reporting the first failure after trying them all.
///
/// Frames that could not be sent are handed back to the session so it can
/// roll back and retry them.
async fn send_all<T: Transport>(
    channel: &CommandChannel<T>,
    session: &mut TrialSession,
    outgoing: Vec<ConfigFrame>,
) -> Result<()> {
    let mut first_error: Option<XippError> = None;
    for frame in outgoing {
        if let Err(e) = channel.send(&frame).await {
            error!("Failed to send request for property {}: {}", frame.target.property, e);
            session.send_failed(&frame);
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Send frames the session produced on its own; failures are retried on a later tick.
async fn send_or_defer<T: Transport>(
    channel: &CommandChannel<T>,
    session: &mut TrialSession,
    outgoing: Vec<ConfigFrame>,
) {
    if let Err(e) = send_all(channel, session, outgoing).await {
        warn!("Deferring unsent requests to the next tick: {}", e);
    }
}

fn publish(tx: &watch::Sender<TrialSnapshot>, session: &TrialSession, stats: &NetworkStats) {
    let mut snapshot = session.snapshot();
    snapshot.network = stats.clone();
    tx.send_replace(snapshot);
}
