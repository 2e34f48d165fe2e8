//! Ballot configuration and option selectors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ConfigError, Identity, Timestamp, clock::SECONDS_PER_MINUTE};

/// One of the two options on the ballot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionSelector {
    A,
    B,
}

impl OptionSelector {
    /// Wire index of the selector: `A` is 0, `B` is 1.
    pub fn index(self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::A),
            1 => Some(Self::B),
            _ => None,
        }
    }
}

impl From<OptionSelector> for u8 {
    fn from(selector: OptionSelector) -> Self {
        selector.index()
    }
}

impl fmt::Display for OptionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// Immutable parameters of a ballot, fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotConfig {
    admin: Identity,
    deadline: Timestamp,
    proposal: String,
    option_a: String,
    option_b: String,
}

impl BallotConfig {
    /// Build a configuration whose deadline is `duration_minutes` after `now`.
    pub fn new(
        duration_minutes: i64,
        proposal: impl Into<String>,
        option_a: impl Into<String>,
        option_b: impl Into<String>,
        admin: Identity,
        now: Timestamp,
    ) -> Result<Self, ConfigError> {
        let deadline = u64::try_from(duration_minutes)
            .ok()
            .filter(|m| *m > 0)
            .and_then(|m| m.checked_mul(SECONDS_PER_MINUTE))
            .and_then(|secs| now.checked_add(secs))
            .ok_or(ConfigError::InvalidDuration(duration_minutes))?;

        let config = Self {
            admin,
            deadline,
            proposal: proposal.into(),
            option_a: option_a.into(),
            option_b: option_b.into(),
        };
        config.validate()?;

        Ok(config)
    }

    /// Checks that hold for any configuration, whenever it was created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.option_a.is_empty() || self.option_b.is_empty() {
            return Err(ConfigError::EmptyOption);
        }
        Ok(())
    }

    pub fn admin(&self) -> &Identity {
        &self.admin
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    pub fn proposal(&self) -> &str {
        &self.proposal
    }

    pub fn option_a(&self) -> &str {
        &self.option_a
    }

    pub fn option_b(&self) -> &str {
        &self.option_b
    }

    pub fn label(&self, selector: OptionSelector) -> &str {
        match selector {
            OptionSelector::A => &self.option_a,
            OptionSelector::B => &self.option_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Identity {
        Identity::from("admin")
    }

    #[test]
    fn deadline_is_minutes_after_now() {
        let config = BallotConfig::new(5, "Add dark mode?", "Yes", "No", admin(), 0).unwrap();
        assert_eq!(config.deadline(), 300);
        assert_eq!(config.admin(), &admin());
        assert_eq!(config.proposal(), "Add dark mode?");
    }

    #[test]
    fn rejects_non_positive_duration() {
        for minutes in [0, -1, i64::MIN] {
            let err = BallotConfig::new(minutes, "p", "a", "b", admin(), 10).unwrap_err();
            assert_eq!(err, ConfigError::InvalidDuration(minutes));
        }
    }

    #[test]
    fn rejects_overflowing_deadline() {
        let err = BallotConfig::new(i64::MAX, "p", "a", "b", admin(), 1).unwrap_err();
        assert_eq!(err, ConfigError::InvalidDuration(i64::MAX));
    }

    #[test]
    fn rejects_empty_labels() {
        assert_eq!(
            BallotConfig::new(1, "p", "", "b", admin(), 0).unwrap_err(),
            ConfigError::EmptyOption
        );
        assert_eq!(
            BallotConfig::new(1, "p", "a", "", admin(), 0).unwrap_err(),
            ConfigError::EmptyOption
        );
    }

    #[test]
    fn empty_proposal_is_allowed() {
        assert!(BallotConfig::new(1, "", "a", "b", admin(), 0).is_ok());
    }

    #[test]
    fn selector_indices() {
        assert_eq!(OptionSelector::from_index(0), Some(OptionSelector::A));
        assert_eq!(OptionSelector::from_index(1), Some(OptionSelector::B));
        assert_eq!(OptionSelector::from_index(2), None);
        assert_eq!(u8::from(OptionSelector::B), 1);
    }
}
