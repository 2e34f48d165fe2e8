//! Vote counters and the result summary derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{BallotConfig, OptionSelector};

/// Text shown when both options received the same number of votes.
pub const TIE_MARKER: &str = "It's a Tie";

/// Raw per-option vote counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub votes_for_a: u64,
    pub votes_for_b: u64,
}

impl Tally {
    pub fn get(&self, selector: OptionSelector) -> u64 {
        match selector {
            OptionSelector::A => self.votes_for_a,
            OptionSelector::B => self.votes_for_b,
        }
    }

    pub fn total(&self) -> u64 {
        self.votes_for_a + self.votes_for_b
    }

    /// Only called alongside a vote record transition.
    pub(crate) fn increment(&mut self, selector: OptionSelector) {
        match selector {
            OptionSelector::A => self.votes_for_a += 1,
            OptionSelector::B => self.votes_for_b += 1,
        }
    }

    pub fn leader(&self) -> Option<OptionSelector> {
        use std::cmp::Ordering::*;

        match self.votes_for_a.cmp(&self.votes_for_b) {
            Greater => Some(OptionSelector::A),
            Less => Some(OptionSelector::B),
            Equal => None,
        }
    }
}

/// Who won a closed ballot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Winner {
    Option {
        selector: OptionSelector,
        label: String,
    },
    Tie,
}

/// The final outcome of a ballot, available once voting has closed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub proposal: String,
    pub winner: Winner,
    pub tally: Tally,
}

impl ResultSummary {
    pub(crate) fn from_tally(config: &BallotConfig, tally: Tally) -> Self {
        let winner = match tally.leader() {
            Some(selector) => Winner::Option {
                selector,
                label: config.label(selector).to_string(),
            },
            None => Winner::Tie,
        };

        Self {
            proposal: config.proposal().to_string(),
            winner,
            tally,
        }
    }

    pub fn is_tie(&self) -> bool {
        self.winner == Winner::Tie
    }
}

impl fmt::Display for ResultSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.winner {
            Winner::Option { label, .. } => f.write_str(label),
            Winner::Tie => f.write_str(TIE_MARKER),
        }
    }
}
