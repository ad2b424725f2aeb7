//! Connection facade over a running control loop

use futures::Stream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::driver::{CommandRequest, DriverChannels};
use crate::session::{SessionPhase, TrialSnapshot, UserCommand};
use crate::{Result, XippError};

/// Handle to a live trial session.
///
/// Dropping the connection cancels the control loop.
pub struct TrialConnection {
    snapshots: watch::Receiver<TrialSnapshot>,
    commands: mpsc::Sender<CommandRequest>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
}

impl TrialConnection {
    pub(crate) fn new(channels: DriverChannels) -> Self {
        Self {
            snapshots: channels.snapshots,
            commands: channels.commands,
            cancel: channels.cancel,
            task: Some(channels.task),
        }
    }

    /// Queue a command and wait for the loop to apply it.
    ///
    /// Commands are applied on the next refresh tick. Illegal commands come
    /// back as [`XippError::CommandRejected`]; [`XippError::SessionClosed`]
    /// means the loop has already ended.
    pub async fn submit(&self, command: UserCommand) -> Result<()> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(CommandRequest { command, reply })
            .await
            .map_err(|_| XippError::SessionClosed)?;
        outcome.await.map_err(|_| XippError::SessionClosed)?
    }

    /// Latest published session state
    pub fn snapshot(&self) -> TrialSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Current state, then every later change
    ///
    /// Uses WatchStream, so a slow consumer only ever sees the newest snapshot.
    pub fn snapshot_updates(&self) -> impl Stream<Item = TrialSnapshot> + 'static {
        WatchStream::new(self.snapshots.clone())
    }

    /// Wait until the session reaches `phase`.
    ///
    /// A session that fails first returns the error that ended it, such as
    /// [`XippError::SchemaMismatch`].
    pub async fn wait_for_phase(&self, phase: SessionPhase) -> Result<TrialSnapshot> {
        let mut snapshots = self.snapshots.clone();
        let snapshot = snapshots
            .wait_for(|s| s.phase == phase || s.phase == SessionPhase::Failed)
            .await
            .map_err(|_| XippError::SessionClosed)?
            .clone();
        if snapshot.phase != phase {
            if let Some(err) = snapshot.failure() {
                return Err(err);
            }
        }
        Ok(snapshot)
    }

    /// Wait for the loop to end on its own (exit command or fatal error).
    pub async fn finished(&mut self) -> Result<()> {
        match self.task.take() {
            Some(task) => task.await.map_err(|_| XippError::SessionClosed)?,
            None => Err(XippError::SessionClosed),
        }
    }

    /// Cancel the loop and wait for it to stop.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task.await.map_err(|_| XippError::SessionClosed)?,
            None => Ok(()),
        }
    }
}

impl Drop for TrialConnection {
    fn drop(&mut self) {
        debug!("Dropping trial connection");
        self.cancel.cancel();
    }
}
