//! ezballot-core: a single-proposal, two-option ballot registry.
//!
//! - `BallotRegistry`: the state machine (create, register, vote, result, counts)
//! - `SharedRegistry`: the same registry behind a lock, gated by a `Clock`
//! - `Snapshot`: the complete persisted state, CBOR-encoded and BLAKE3-addressed
//! - `BallotRequest`: an operation as data, applied directly or after an
//!   `IdentityResolver` has authenticated it

mod clock;
mod config;
mod error;
mod identity;
mod notification;
mod registry;
mod request;
mod shared;
mod snapshot;
mod tally;

pub use clock::{Clock, ManualClock, SECONDS_PER_MINUTE, SystemClock, Timestamp};
pub use config::{BallotConfig, OptionSelector};
pub use error::{AuthorizationError, ConfigError, Error, Result, SnapshotError, VotingError};
pub use identity::{
    DEFAULT_MAX_REQUEST_AGE, Identity, IdentityResolver, Keypair, SignatureResolver, SignedRequest,
};
pub use notification::{Notification, RegistrationReport, VoteReceipt};
pub use registry::{BallotRegistry, Phase};
pub use request::{Authorized, BallotRequest, BallotResponse};
pub use shared::SharedRegistry;
pub use snapshot::{Snapshot, SnapshotDigest};
pub use tally::{ResultSummary, TIE_MARKER, Tally, Winner};
