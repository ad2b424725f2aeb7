//! User commands and their legality per trial status

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::TrialStatus;

/// A command from the user-command source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCommand {
    Start,
    Pause,
    Unpause,
    Stop,
    /// Re-read the trial descriptor and every dependent block.
    Query,
    /// Attach a comment to the trial, truncated to the remote string's capacity.
    Comment(String),
    SetSignalSelection { guid: u32, selected: bool },
    /// End the control loop.
    Exit,
}

/// What a command does to the trial, independent of its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialAction {
    Start,
    Pause,
    Unpause,
    Stop,
    Comment,
    SelectSignal,
    Query,
}

impl UserCommand {
    /// `None` for [`UserCommand::Exit`], which never reaches the Operator.
    pub fn action(&self) -> Option<TrialAction> {
        Some(match self {
            UserCommand::Start => TrialAction::Start,
            UserCommand::Pause => TrialAction::Pause,
            UserCommand::Unpause => TrialAction::Unpause,
            UserCommand::Stop => TrialAction::Stop,
            UserCommand::Query => TrialAction::Query,
            UserCommand::Comment(_) => TrialAction::Comment,
            UserCommand::SetSignalSelection { .. } => TrialAction::SelectSignal,
            UserCommand::Exit => return None,
        })
    }
}

impl TrialAction {
    pub fn name(self) -> &'static str {
        match self {
            TrialAction::Start => "start",
            TrialAction::Pause => "pause",
            TrialAction::Unpause => "unpause",
            TrialAction::Stop => "stop",
            TrialAction::Comment => "comment",
            TrialAction::SelectSignal => "select signal",
            TrialAction::Query => "query",
        }
    }

    /// Status the trial is optimistically moved to when this action is sent.
    pub fn requested_status(self) -> Option<TrialStatus> {
        match self {
            TrialAction::Start => Some(TrialStatus::StartRequested),
            TrialAction::Pause => Some(TrialStatus::PauseRequested),
            TrialAction::Unpause => Some(TrialStatus::UnpauseRequested),
            TrialAction::Stop => Some(TrialStatus::StopRequested),
            TrialAction::Comment | TrialAction::SelectSignal | TrialAction::Query => None,
        }
    }
}

impl fmt::Display for TrialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Actions accepted while the trial is in `status`. Query is always accepted.
pub fn permitted_actions(status: TrialStatus) -> &'static [TrialAction] {
    use TrialAction::*;
    match status {
        TrialStatus::Stopped | TrialStatus::StopRequested => {
            &[Start, Comment, SelectSignal, Query]
        }
        TrialStatus::Recording | TrialStatus::StartRequested | TrialStatus::UnpauseRequested => {
            &[Pause, Stop, Query]
        }
        TrialStatus::Paused | TrialStatus::PauseRequested => &[Unpause, Stop, Query],
        TrialStatus::Unknown(_) => &[Query],
    }
}

pub fn is_permitted(status: TrialStatus, action: TrialAction) -> bool {
    permitted_actions(status).contains(&action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_trial_accepts_start_and_comment_only() {
        for status in [TrialStatus::Stopped, TrialStatus::StopRequested] {
            assert!(is_permitted(status, TrialAction::Start));
            assert!(is_permitted(status, TrialAction::Comment));
            assert!(is_permitted(status, TrialAction::SelectSignal));
            assert!(!is_permitted(status, TrialAction::Pause));
            assert!(!is_permitted(status, TrialAction::Unpause));
            assert!(!is_permitted(status, TrialAction::Stop));
        }
    }

    #[test]
    fn running_trial_accepts_pause_and_stop() {
        for status in
            [TrialStatus::Recording, TrialStatus::StartRequested, TrialStatus::UnpauseRequested]
        {
            assert!(is_permitted(status, TrialAction::Pause));
            assert!(is_permitted(status, TrialAction::Stop));
            assert!(!is_permitted(status, TrialAction::Start));
            assert!(!is_permitted(status, TrialAction::Comment));
        }
        for status in [TrialStatus::Paused, TrialStatus::PauseRequested] {
            assert!(is_permitted(status, TrialAction::Unpause));
            assert!(is_permitted(status, TrialAction::Stop));
            assert!(!is_permitted(status, TrialAction::Pause));
        }
    }

    #[test]
    fn query_is_always_permitted() {
        for raw in 0..10 {
            assert!(is_permitted(TrialStatus::from_raw(raw), TrialAction::Query));
        }
        assert_eq!(permitted_actions(TrialStatus::Unknown(42)), &[TrialAction::Query]);
    }

    #[test]
    fn exit_has_no_trial_action() {
        assert_eq!(UserCommand::Exit.action(), None);
        assert_eq!(UserCommand::Comment("x".into()).action(), Some(TrialAction::Comment));
        assert_eq!(TrialAction::Stop.requested_status(), Some(TrialStatus::StopRequested));
        assert_eq!(TrialAction::Comment.requested_status(), None);
    }
}
