//! Error types for ezballot-core.
//!
//! Every failure is a precondition rejection. None of them are transient, so
//! none should be retried without changing the inputs.

use thiserror::Error;

use crate::{Identity, Timestamp};

/// Rejections raised while creating a ballot.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The voting window must be a positive number of minutes.
    #[error("invalid voting duration: {0} minutes")]
    InvalidDuration(i64),

    /// Both option labels must be non-empty.
    #[error("option labels must not be empty")]
    EmptyOption,
}

/// Rejections raised when the caller lacks the privilege for an operation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// Only the administrator may register voters.
    #[error("{0} is not the ballot administrator")]
    NotAdmin(Identity),

    /// A signed request did not verify against its claimed key.
    #[error("invalid signature for request from {0}")]
    InvalidSignature(Identity),

    /// A correctly signed request issued too far from the current time.
    #[error("request from {identity} issued at {issued_at} is outside the accepted window at {now}")]
    StaleRequest {
        identity: Identity,
        issued_at: Timestamp,
        now: Timestamp,
    },

    /// A request that could not be encoded for signing.
    #[error("malformed request: {0}")]
    MalformedRequest(String),
}

/// Rejections raised by `vote` and `result`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VotingError {
    #[error("voting is closed")]
    VotingClosed,

    #[error("{0} is not registered to vote")]
    NotRegistered(Identity),

    #[error("{0} has already voted")]
    AlreadyVoted(Identity),

    #[error("invalid option: {0}")]
    InvalidOption(u8),

    #[error("voting is still open")]
    VotingStillOpen,
}

/// Failures while encoding, decoding or restoring a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot encoding error: {0}")]
    Encode(String),

    #[error("snapshot decoding error: {0}")]
    Decode(String),

    /// A vote record exists for an identity that was never registered.
    #[error("vote recorded for unregistered identity {0}")]
    UnregisteredVoter(Identity),

    /// The stored counters disagree with the stored vote records.
    #[error("tally mismatch: stored ({stored_a}, {stored_b}), recorded ({recorded_a}, {recorded_b})")]
    TallyMismatch {
        stored_a: u64,
        stored_b: u64,
        recorded_a: u64,
        recorded_b: u64,
    },

    #[error("invalid ballot configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Any error produced by the core.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Voting(#[from] VotingError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Result alias for operations that may fail with any core error.
pub type Result<T> = std::result::Result<T, Error>;

impl ConfigError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidDuration(_) => "invalid_duration",
            Self::EmptyOption => "empty_option",
        }
    }
}

impl AuthorizationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAdmin(_) => "not_admin",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::StaleRequest { .. } => "stale_request",
            Self::MalformedRequest(_) => "malformed_request",
        }
    }
}

impl VotingError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VotingClosed => "voting_closed",
            Self::NotRegistered(_) => "not_registered",
            Self::AlreadyVoted(_) => "already_voted",
            Self::InvalidOption(_) => "invalid_option",
            Self::VotingStillOpen => "voting_still_open",
        }
    }
}

impl SnapshotError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encode(_) => "snapshot_encode",
            Self::Decode(_) => "snapshot_decode",
            Self::UnregisteredVoter(_) => "unregistered_voter",
            Self::TallyMismatch { .. } => "tally_mismatch",
            Self::Config(e) => e.kind(),
        }
    }
}

impl Error {
    /// Stable snake_case name of the rejection, suitable for surfacing to end users.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(e) => e.kind(),
            Self::Authorization(e) => e.kind(),
            Self::Voting(e) => e.kind(),
            Self::Snapshot(e) => e.kind(),
        }
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for SnapshotError {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        SnapshotError::Encode(e.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for SnapshotError {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        SnapshotError::Decode(e.to_string())
    }
}
