//! Build attempt state machine
//!
//! Every build attempt moves `Pending → Preparing → Building → Copying → Done`.
//! Any non-terminal state can fail; only `Building` can time out.

use serde::{Deserialize, Serialize};

/// The lifecycle stage a build attempt was in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Prepare,
    Execute,
    Copy,
}

impl std::fmt::Display for BuildStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStage::Prepare => write!(f, "prepare environment"),
            BuildStage::Execute => write!(f, "execute build"),
            BuildStage::Copy => write!(f, "copy binary"),
        }
    }
}

/// Why a build attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Working directory or source staging failed
    Environment,
    /// The toolchain reported a compile failure
    Compile,
    /// The toolchain process could not be started
    Spawn,
    /// The build exceeded its time ceiling
    Timeout,
    /// The artifact could not be published
    Artifact,
    /// The request could not be dispatched (unknown type, invalid name, busy)
    Configuration,
}

/// State of a single build attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BuildState {
    #[default]
    Pending,
    Preparing,
    Building,
    Copying,
    Done,
    Failed { stage: BuildStage, kind: FailureKind },
    TimedOut,
}

impl BuildState {
    /// Returns true for `Done`, `Failed` and `TimedOut`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildState::Done | BuildState::Failed { .. } | BuildState::TimedOut
        )
    }

    /// The stage this state belongs to, if any
    pub fn stage(&self) -> Option<BuildStage> {
        match self {
            BuildState::Preparing => Some(BuildStage::Prepare),
            BuildState::Building | BuildState::TimedOut => Some(BuildStage::Execute),
            BuildState::Copying => Some(BuildStage::Copy),
            BuildState::Failed { stage, .. } => Some(*stage),
            BuildState::Pending | BuildState::Done => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: &BuildState) -> bool {
        match (self, next) {
            (BuildState::Pending, BuildState::Preparing) => true,
            (BuildState::Preparing, BuildState::Building) => true,
            (BuildState::Building, BuildState::Copying) => true,
            (BuildState::Copying, BuildState::Done) => true,
            (BuildState::Building, BuildState::TimedOut) => true,
            (from, BuildState::Failed { .. }) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Progress percentage for status rendering
    pub fn progress(&self) -> u8 {
        match self {
            BuildState::Pending => 0,
            BuildState::Preparing => 25,
            BuildState::Building => 50,
            BuildState::Copying => 75,
            BuildState::Done => 100,
            BuildState::Failed { .. } | BuildState::TimedOut => 100,
        }
    }
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildState::Pending => write!(f, "Pending"),
            BuildState::Preparing => write!(f, "Preparing"),
            BuildState::Building => write!(f, "Building"),
            BuildState::Copying => write!(f, "Copying"),
            BuildState::Done => write!(f, "Done"),
            BuildState::Failed { stage, kind } => write!(f, "Failed ({:?} during {})", kind, stage),
            BuildState::TimedOut => write!(f, "TimedOut"),
        }
    }
}
