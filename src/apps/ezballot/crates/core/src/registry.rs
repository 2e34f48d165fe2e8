//! The ballot registry: owns all ballot state and enforces every rule.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::{
    AuthorizationError, BallotConfig, ConfigError, Identity, Notification, OptionSelector,
    RegistrationReport, ResultSummary, Tally, Timestamp, VoteReceipt, VotingError,
};

/// Whether the ballot currently accepts votes. Derived from the clock on
/// every call, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// `now <= deadline`: voting permitted, results withheld.
    Open,
    /// `now > deadline`: voting rejected, results available.
    Closed,
}

/// A single-proposal, two-option ballot.
///
/// Registration and vote records only ever grow. A vote record and its tally
/// increment are always applied together, so `counts().total()` equals the
/// number of recorded votes at all times.
#[derive(Clone, Debug)]
pub struct BallotRegistry {
    pub(crate) config: BallotConfig,
    pub(crate) registered: BTreeSet<Identity>,
    /// Absent entry means "has not voted".
    pub(crate) votes: BTreeMap<Identity, OptionSelector>,
    pub(crate) tally: Tally,
}

impl BallotRegistry {
    /// Open a new ballot administered by `caller`, closing `duration_minutes`
    /// after `now`.
    pub fn create(
        duration_minutes: i64,
        proposal: impl Into<String>,
        option_a: impl Into<String>,
        option_b: impl Into<String>,
        caller: Identity,
        now: Timestamp,
    ) -> Result<Self, ConfigError> {
        let config = BallotConfig::new(duration_minutes, proposal, option_a, option_b, caller, now)
            .inspect_err(|e| debug!(kind = e.kind(), "ballot creation rejected"))?;

        info!(
            admin = %config.admin(),
            deadline = config.deadline(),
            proposal = config.proposal(),
            "ballot created"
        );

        Ok(Self::from_config(config))
    }

    pub(crate) fn from_config(config: BallotConfig) -> Self {
        Self {
            config,
            registered: BTreeSet::new(),
            votes: BTreeMap::new(),
            tally: Tally::default(),
        }
    }

    pub fn config(&self) -> &BallotConfig {
        &self.config
    }

    pub fn phase(&self, now: Timestamp) -> Phase {
        if now > self.config.deadline() {
            Phase::Closed
        } else {
            Phase::Open
        }
    }

    /// Enroll `identities` as voters. Only the administrator may call this.
    ///
    /// Already registered identities are skipped. Registration is allowed at
    /// any time, including after the deadline.
    pub fn register<I>(
        &mut self,
        identities: I,
        caller: &Identity,
    ) -> Result<RegistrationReport, AuthorizationError>
    where
        I: IntoIterator<Item = Identity>,
    {
        if caller != self.config.admin() {
            debug!(caller = %caller, "register rejected: not admin");
            return Err(AuthorizationError::NotAdmin(caller.clone()));
        }

        let mut report = RegistrationReport::default();

        for identity in identities {
            if self.registered.contains(&identity) {
                report.skipped += 1;
                continue;
            }

            self.registered.insert(identity.clone());

            let notification = Notification::Registered { identity };
            notification.trace();
            report.notifications.push(notification);
        }

        Ok(report)
    }

    /// Cast `caller`'s single vote.
    ///
    /// `choice` is a selector index (0 for option A, 1 for option B). Checks
    /// run in a fixed order: closed, not registered, already voted, invalid
    /// option.
    pub fn vote(
        &mut self,
        choice: impl Into<u8>,
        caller: &Identity,
        now: Timestamp,
    ) -> Result<VoteReceipt, VotingError> {
        self.try_vote(choice.into(), caller, now)
            .inspect_err(|e| debug!(caller = %caller, kind = e.kind(), "vote rejected"))
    }

    fn try_vote(
        &mut self,
        choice: u8,
        caller: &Identity,
        now: Timestamp,
    ) -> Result<VoteReceipt, VotingError> {
        if self.phase(now) == Phase::Closed {
            return Err(VotingError::VotingClosed);
        }

        if !self.registered.contains(caller) {
            return Err(VotingError::NotRegistered(caller.clone()));
        }

        let slot = match self.votes.entry(caller.clone()) {
            Entry::Occupied(_) => return Err(VotingError::AlreadyVoted(caller.clone())),
            Entry::Vacant(slot) => slot,
        };

        let selector = OptionSelector::from_index(choice).ok_or(VotingError::InvalidOption(choice))?;

        // Record and counter move together; nothing between them can fail.
        slot.insert(selector);
        self.tally.increment(selector);

        let notification = Notification::Voted {
            voter: caller.clone(),
            option: selector,
            label: self.config.label(selector).to_string(),
        };
        notification.trace();

        Ok(VoteReceipt {
            notification,
            cast_at: now,
            tally: self.tally,
        })
    }

    /// The outcome, once voting has closed.
    pub fn result(&self, now: Timestamp) -> Result<ResultSummary, VotingError> {
        if self.phase(now) == Phase::Open {
            return Err(VotingError::VotingStillOpen);
        }

        Ok(ResultSummary::from_tally(&self.config, self.tally))
    }

    /// Raw counts. Readable at any time.
    pub fn counts(&self) -> Tally {
        self.tally
    }

    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.registered.contains(identity)
    }

    /// The option `identity` voted for, if it has voted.
    pub fn vote_of(&self, identity: &Identity) -> Option<OptionSelector> {
        self.votes.get(identity).copied()
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    pub fn voter_count(&self) -> usize {
        self.votes.len()
    }
}
