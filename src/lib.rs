//! Client for the instrument network's configuration protocol.
//!
//! xipp-trial discovers an Operator on the instrument network, reads its
//! recording trial together with the property blocks that hang off it, and
//! drives the trial through start, pause, unpause and stop.
//!
//! # Features
//!
//! - **Zero-copy framing**: datagrams split into borrowed frame views
//! - **Typed properties**: one tagged-union decode per property payload
//! - **Sans-IO state machine**: [`session::TrialSession`] is testable without sockets
//! - **Async control loop**: one tokio task, snapshots published on a watch channel
//!
//! # Quick Start
//!
//! See `demos/trial_control.rs` for an interactive console client.
//!
//! ```rust,no_run
//! use xipp_trial::{ClientConfig, SessionPhase, UserCommand, Xipp};
//!
//! #[tokio::main]
//! async fn main() -> xipp_trial::Result<()> {
//!     let connection = Xipp::connect(ClientConfig::default()).await?;
//!     let snapshot = connection.wait_for_phase(SessionPhase::Ready).await?;
//!     println!("{}", snapshot.summary());
//!
//!     connection.submit(UserCommand::Start).await?;
//!     connection.shutdown().await
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;
pub mod wire;

pub mod command;
pub mod config;
pub mod connection;
pub mod driver;
pub mod session;
pub mod stats;
pub mod transport;
pub mod transports;

pub use command::{CommandChannel, anonymize};
pub use config::ClientConfig;
pub use connection::TrialConnection;
pub use error::*;
pub use session::{SessionPhase, TrialSession, TrialSnapshot, UserCommand};
pub use stats::NetworkStats;
pub use transport::Transport;
pub use transports::UdpTransport;

/// Entry point for trial sessions.
pub struct Xipp;

impl Xipp {
    /// Bind `config.listen_addr` over UDP and start discovery.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the socket cannot
    /// be bound.
    pub async fn connect(config: ClientConfig) -> Result<TrialConnection> {
        config.validate()?;
        let transport = UdpTransport::bind(config.listen_addr).await?;
        Self::connect_with(transport, config).await
    }

    /// Start discovery over any [`Transport`].
    ///
    /// ```rust,no_run
    /// use xipp_trial::{ClientConfig, UdpTransport, Xipp};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> xipp_trial::Result<()> {
    /// let transport = UdpTransport::bind("0.0.0.0:2046".parse().unwrap()).await?;
    /// let connection = Xipp::connect_with(transport, ClientConfig::default()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect_with<T: Transport>(
        transport: T,
        config: ClientConfig,
    ) -> Result<TrialConnection> {
        config.validate()?;
        Ok(TrialConnection::new(driver::Driver::spawn(transport, config)))
    }
}
