//! Notifications emitted on registry state transitions.
//!
//! Exactly one notification is produced per transition, in the order the
//! transitions happen. Delivering them anywhere durable is up to the caller.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Identity, OptionSelector, Tally, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    /// An identity became eligible to vote.
    Registered { identity: Identity },

    /// A registered identity cast its vote.
    Voted {
        voter: Identity,
        option: OptionSelector,
        label: String,
    },
}

impl Notification {
    /// Emit this notification as a structured tracing event.
    pub(crate) fn trace(&self) {
        match self {
            Notification::Registered { identity } => {
                info!(identity = %identity, "registered");
            }
            Notification::Voted {
                voter,
                option,
                label,
            } => {
                info!(voter = %voter, option = %option, label = %label, "voted");
            }
        }
    }
}

/// Outcome of a successful `register` call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationReport {
    /// One `Registered` notification per newly enrolled identity, in input order.
    pub notifications: Vec<Notification>,

    /// Entries that were already registered and left untouched.
    pub skipped: usize,
}

impl RegistrationReport {
    /// Identities newly registered by this call.
    pub fn registered(&self) -> impl Iterator<Item = &Identity> {
        self.notifications.iter().filter_map(|n| match n {
            Notification::Registered { identity } => Some(identity),
            _ => None,
        })
    }
}

/// Outcome of a successful `vote` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub notification: Notification,

    /// When the vote was accepted.
    pub cast_at: Timestamp,

    /// Counts immediately after this vote.
    pub tally: Tally,
}
