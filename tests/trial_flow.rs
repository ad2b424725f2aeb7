//! End-to-end trial control against a simulated Operator
//!
//! The simulated Operator answers every query sent to it and applies every
//! write, confirming requested trial status changes immediately.

use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use xipp_trial::types::xipp_ids::property_type;
use xipp_trial::types::{
    ConfigTarget, FrameHeader, FrontEndSelection, OperatorProcessDescriptor, PropertyBlock,
    PropertyHeader, RecordingTrialDescriptor, SchemaVersion, SignalSelectionSet, StringProperty,
    TrialStatus,
};
use xipp_trial::wire::{ConfigFrame, Property, frames};
use xipp_trial::{
    ClientConfig, Result, SessionPhase, TrialConnection, TrialSnapshot, Transport, UserCommand,
    Xipp, XippError,
};

const OPERATOR: u8 = 131;
const EXT_INFO: (u16, u16, u16) = (9, 100, 2);
const SIG_SELECTION: (u16, u16, u16) = (12, 200, 2);
const FILE_NAMES: (u16, u16, u16) = (10, 300, 3);

struct OperatorState {
    schema: SchemaVersion,
    trial: RecordingTrialDescriptor,
    ext_info: Vec<StringProperty>,
    front_ends: Vec<FrontEndSelection>,
    file_names: Vec<StringProperty>,
    queried: Vec<u16>,
    writes: Vec<Property>,
}

impl OperatorState {
    fn new(schema: SchemaVersion) -> Self {
        let sets = |module: u32| {
            [
                SignalSelectionSet::new(0x0100_0000 | (module << 16) | 0x0100, 4),
                SignalSelectionSet::new(0x0100_0000 | (module << 16) | 0x0401, 8),
            ]
        };
        Self {
            schema,
            trial: RecordingTrialDescriptor::stopped(EXT_INFO.0, FILE_NAMES.0, SIG_SELECTION.0),
            ext_info: vec![StringProperty::new(256, ""), StringProperty::new(64, "rig B")],
            front_ends: vec![
                FrontEndSelection::new(1, 1, 1, 'A', "micro", &sets(2)),
                FrontEndSelection::new(1, 1, 2, 'A', "macro", &sets(4)),
            ],
            file_names: (0..FILE_NAMES.2)
                .map(|i| StringProperty::new(512, &format!("/data/trial0007.ns{}", i + 2)))
                .collect(),
            queried: Vec::new(),
            writes: Vec::new(),
        }
    }

    fn property(&self, id: u16) -> Option<Property> {
        let member = |(_, first, count): (u16, u16, u16)| {
            (id >= first && id < first + count).then(|| (id - first) as usize)
        };
        let block = |(_, first, count): (u16, u16, u16), item_type: u8| {
            Property::Block(PropertyBlock::new(first, count, item_type as u16, "trial"))
        };
        Some(match id {
            0 => Property::OperatorDescriptor(OperatorProcessDescriptor {
                header: PropertyHeader::new(property_type::OPERATOR_DESCRIPTOR),
                property_count: 2,
                schema: self.schema,
                vendor: "Ripple".into(),
                label: "Trellis".into(),
                version: "1.8.3".into(),
            }),
            0x7FFF => Property::RecordingTrial(self.trial.clone()),
            id if id == EXT_INFO.0 => block(EXT_INFO, property_type::STRING),
            id if id == SIG_SELECTION.0 => block(SIG_SELECTION, property_type::FE_SIGNAL_SELECTION),
            id if id == FILE_NAMES.0 => block(FILE_NAMES, property_type::STRING),
            _ => {
                if let Some(i) = member(EXT_INFO) {
                    Property::String(self.ext_info[i].clone())
                } else if let Some(i) = member(SIG_SELECTION) {
                    Property::FrontEndSelection(self.front_ends[i].clone())
                } else if let Some(i) = member(FILE_NAMES) {
                    Property::String(self.file_names[i].clone())
                } else {
                    return None;
                }
            }
        })
    }

    fn apply_write(&mut self, id: u16, property: Property) {
        self.writes.push(property.clone());
        match property {
            Property::RecordingTrial(mut trial) => {
                trial.status = match trial.status {
                    TrialStatus::StartRequested | TrialStatus::UnpauseRequested => {
                        TrialStatus::Recording
                    }
                    TrialStatus::PauseRequested => TrialStatus::Paused,
                    TrialStatus::StopRequested => TrialStatus::Stopped,
                    other => other,
                };
                self.trial = trial;
            }
            Property::String(value) if id >= EXT_INFO.1 && id < EXT_INFO.1 + EXT_INFO.2 => {
                self.ext_info[(id - EXT_INFO.1) as usize] = value;
            }
            Property::FrontEndSelection(fe) if id >= SIG_SELECTION.1 => {
                self.front_ends[(id - SIG_SELECTION.1) as usize] = fe;
            }
            _ => {}
        }
    }
}

fn reply(id: u16, property: &Property) -> Vec<u8> {
    let frame = ConfigFrame {
        header: FrameHeader { size: 0, processor: OPERATOR, module: 0, stream: 0, time: 77 },
        target: ConfigTarget::new(OPERATOR, 0, id),
        payload: property.encode(),
    };
    frame.encode().expect("reply fits in a frame")
}

#[derive(Clone)]
struct SimulatedOperator {
    state: Arc<Mutex<OperatorState>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl SimulatedOperator {
    fn new(schema: SchemaVersion) -> Self {
        let (outbound, inbound) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(Mutex::new(OperatorState::new(schema))),
            outbound,
            inbound: Arc::new(tokio::sync::Mutex::new(inbound)),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut OperatorState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl Transport for SimulatedOperator {
    async fn send_to(&self, datagram: &[u8], _destination: SocketAddr) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        for frame in frames(datagram) {
            let request = frame?.to_config()?;
            let id = request.target.property;
            if request.target.processor != OPERATOR && request.target.processor != 255 {
                continue;
            }
            if request.is_query() {
                state.queried.push(id);
            } else if let Some(property) = request.property()? {
                state.apply_write(id, property);
            }
            if let Some(property) = state.property(id) {
                let _ = self.outbound.send(reply(id, &property));
            }
        }
        Ok(datagram.len())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        match self.inbound.lock().await.recv().await {
            Some(bytes) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            None => std::future::pending().await,
        }
    }
}

fn fast_config() -> ClientConfig {
    ClientConfig {
        refresh_interval_ms: 10,
        receive_timeout_ms: 5,
        file_path_base: Some("/data/session42".into()),
        ..ClientConfig::default()
    }
}

async fn wait_until(
    connection: &TrialConnection,
    predicate: impl Fn(&TrialSnapshot) -> bool,
) -> TrialSnapshot {
    let mut updates = connection.snapshot_updates();
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(snapshot) = updates.next().await {
            if predicate(&snapshot) {
                return snapshot;
            }
        }
        panic!("snapshot stream ended");
    })
    .await
    .expect("condition not reached in time")
}

fn ready_with(status: TrialStatus) -> impl Fn(&TrialSnapshot) -> bool {
    move |s| s.phase == SessionPhase::Ready && s.status() == Some(status)
}

#[tokio::test]
async fn full_trial_lifecycle() {
    let _ = tracing_subscriber::fmt::try_init();
    let operator = SimulatedOperator::new(SchemaVersion::default());
    let connection = Xipp::connect_with(operator.clone(), fast_config()).await.unwrap();

    let ready = wait_until(&connection, ready_with(TrialStatus::Stopped)).await;
    assert_eq!(ready.operator.as_ref().unwrap().id, OPERATOR);
    assert_eq!(ready.items_expected, 7);
    assert_eq!(ready.file_names.len(), 3);
    assert_eq!(ready.front_ends.len(), 2);

    connection.submit(UserCommand::Comment("bank A reference swapped".into())).await.unwrap();
    let commented = wait_until(&connection, |s| {
        s.phase == SessionPhase::Ready && s.comment.as_deref() == Some("bank A reference swapped")
    })
    .await;
    assert_eq!(commented.items_received, 7);

    let signal = ready.front_ends[1].signals()[2];
    connection
        .submit(UserCommand::SetSignalSelection { guid: signal, selected: true })
        .await
        .unwrap();
    wait_until(&connection, |s| {
        s.phase == SessionPhase::Ready && s.front_ends.iter().any(|fe| fe.is_selected(signal))
    })
    .await;

    connection.submit(UserCommand::Start).await.unwrap();
    wait_until(&connection, ready_with(TrialStatus::Recording)).await;
    let started = operator.with_state(|state| {
        state.writes.iter().find_map(|w| match w {
            Property::RecordingTrial(trial) if trial.status == TrialStatus::StartRequested => {
                Some(trial.clone())
            }
            _ => None,
        })
    });
    let started = started.expect("start request written");
    assert_eq!(started.trial_start, 0);
    assert_eq!(started.file_path_base, "/data/session42");

    // recording trials are polled every refresh interval
    let polls = operator.with_state(|s| s.queried.iter().filter(|&&id| id == 0x7FFF).count());
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(operator.with_state(|s| s.queried.iter().filter(|&&id| id == 0x7FFF).count()) > polls);

    let err = connection.submit(UserCommand::Start).await.unwrap_err();
    assert!(matches!(err, XippError::CommandRejected { .. }));

    connection.submit(UserCommand::Pause).await.unwrap();
    wait_until(&connection, ready_with(TrialStatus::Paused)).await;
    connection.submit(UserCommand::Unpause).await.unwrap();
    wait_until(&connection, ready_with(TrialStatus::Recording)).await;
    connection.submit(UserCommand::Stop).await.unwrap();
    wait_until(&connection, ready_with(TrialStatus::Stopped)).await;

    let err = connection.submit(UserCommand::Pause).await.unwrap_err();
    assert!(matches!(err, XippError::CommandRejected { .. }));

    connection.shutdown().await.unwrap();
}

#[tokio::test]
async fn incompatible_operator_is_never_asked_for_a_trial() {
    let _ = tracing_subscriber::fmt::try_init();
    let operator = SimulatedOperator::new(SchemaVersion { major: 2, minor: 7 });
    let mut connection = Xipp::connect_with(operator.clone(), fast_config()).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), connection.finished()).await.unwrap();
    assert!(matches!(result, Err(XippError::SchemaMismatch { expected: (3, 0), found: (2, 7) })));
    assert_eq!(connection.snapshot().phase, SessionPhase::Failed);
    assert_eq!(operator.with_state(|s| s.queried.clone()), vec![0]);

    let err = connection.submit(UserCommand::Query).await.unwrap_err();
    assert!(matches!(err, XippError::SessionClosed));
}

#[tokio::test]
async fn invalid_configuration_is_rejected_up_front() {
    let operator = SimulatedOperator::new(SchemaVersion::default());
    let config = ClientConfig { send_attempts: 0, ..fast_config() };
    let result = Xipp::connect_with(operator, config).await;
    assert!(matches!(result, Err(XippError::Config { .. })));
}
