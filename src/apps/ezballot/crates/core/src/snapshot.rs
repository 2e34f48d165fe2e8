//! Point-in-time copies of a registry's complete state.
//!
//! A snapshot holds the four pieces of ballot state: configuration,
//! registration set, vote records and tally. It is CBOR-encoded and
//! content-addressed with BLAKE3. Ordered collections keep the encoding, and
//! therefore the digest, identical for identical state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{BallotConfig, BallotRegistry, Identity, OptionSelector, SnapshotError, Tally};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub config: BallotConfig,
    pub registered: BTreeSet<Identity>,
    pub votes: BTreeMap<Identity, OptionSelector>,
    pub tally: Tally,
}

/// BLAKE3 digest of an encoded snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotDigest(pub [u8; 32]);

impl SnapshotDigest {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Snapshot {
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(ciborium::from_reader(bytes)?)
    }

    pub fn digest(&self) -> Result<SnapshotDigest, SnapshotError> {
        let bytes = self.encode()?;
        Ok(SnapshotDigest(*blake3::hash(&bytes).as_bytes()))
    }
}

impl BallotRegistry {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            config: self.config.clone(),
            registered: self.registered.clone(),
            votes: self.votes.clone(),
            tally: self.tally,
        }
    }

    /// Rebuild a registry from a snapshot, rejecting any snapshot whose
    /// records and counters disagree.
    pub fn restore(snapshot: Snapshot) -> Result<Self, SnapshotError> {
        let Snapshot {
            config,
            registered,
            votes,
            tally,
        } = snapshot;

        config.validate()?;

        let mut recorded = Tally::default();
        for (voter, selector) in &votes {
            if !registered.contains(voter) {
                return Err(SnapshotError::UnregisteredVoter(voter.clone()));
            }
            recorded.increment(*selector);
        }

        if recorded != tally {
            return Err(SnapshotError::TallyMismatch {
                stored_a: tally.votes_for_a,
                stored_b: tally.votes_for_b,
                recorded_a: recorded.votes_for_a,
                recorded_b: recorded.votes_for_b,
            });
        }

        let mut registry = BallotRegistry::from_config(config);
        registry.registered = registered;
        registry.votes = votes;
        registry.tally = tally;

        Ok(registry)
    }
}
