//! Operations as data.
//!
//! A [`BallotRequest`] names one registry operation and its arguments. It is
//! what a signed request covers, so a signature authorizes exactly one
//! operation and never another.

use serde::{Deserialize, Serialize};

use crate::{
    BallotRegistry, Identity, RegistrationReport, ResultSummary, Result, Tally, Timestamp,
    VoteReceipt,
};

/// One operation a caller asks the registry to perform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BallotRequest {
    Register { identities: Vec<Identity> },
    Vote { choice: u8 },
    Result,
    Counts,
}

impl BallotRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::Vote { .. } => "vote",
            Self::Result => "result",
            Self::Counts => "counts",
        }
    }
}

/// A request together with the caller an [`IdentityResolver`] established
/// for it.
///
/// [`IdentityResolver`]: crate::IdentityResolver
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorized {
    pub caller: Identity,
    pub request: BallotRequest,
}

/// What a successful [`BallotRequest`] produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BallotResponse {
    Registered(RegistrationReport),
    Voted(VoteReceipt),
    Result(ResultSummary),
    Counts(Tally),
}

impl BallotRegistry {
    /// Run `request` on behalf of `caller` at time `now`.
    pub fn apply(
        &mut self,
        caller: &Identity,
        request: BallotRequest,
        now: Timestamp,
    ) -> Result<BallotResponse> {
        Ok(match request {
            BallotRequest::Register { identities } => {
                BallotResponse::Registered(self.register(identities, caller)?)
            }
            BallotRequest::Vote { choice } => BallotResponse::Voted(self.vote(choice, caller, now)?),
            BallotRequest::Result => BallotResponse::Result(self.result(now)?),
            BallotRequest::Counts => BallotResponse::Counts(self.counts()),
        })
    }
}
