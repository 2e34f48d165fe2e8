//! A registry shared between concurrent callers.
//!
//! Writers hold the write lock across the whole check-then-mutate sequence,
//! so two votes from the same identity can never both pass the
//! "not yet voted" check. Readers share the read lock and always observe
//! both counters from the same moment.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{
    AuthorizationError, Authorized, BallotRegistry, BallotRequest, BallotResponse, Clock, Error,
    Identity, IdentityResolver, Phase, RegistrationReport, ResultSummary, Snapshot, Tally,
    VoteReceipt, VotingError,
};

/// Cloneable handle to one registry and the clock that gates it.
pub struct SharedRegistry<C: Clock> {
    inner: Arc<RwLock<BallotRegistry>>,
    clock: Arc<C>,
}

impl<C: Clock> Clone for SharedRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> SharedRegistry<C> {
    pub fn new(registry: BallotRegistry, clock: C) -> Self {
        Self::with_clock(registry, Arc::new(clock))
    }

    pub fn with_clock(registry: BallotRegistry, clock: Arc<C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // Mutations never panic between their check and their write, so a
    // poisoned lock still guards consistent state.
    fn read(&self) -> RwLockReadGuard<'_, BallotRegistry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BallotRegistry> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register<I>(
        &self,
        identities: I,
        caller: &Identity,
    ) -> Result<RegistrationReport, AuthorizationError>
    where
        I: IntoIterator<Item = Identity>,
    {
        self.write().register(identities, caller)
    }

    pub fn vote(&self, choice: impl Into<u8>, caller: &Identity) -> Result<VoteReceipt, VotingError> {
        let mut registry = self.write();
        let now = self.clock.now();
        registry.vote(choice, caller, now)
    }

    pub fn result(&self) -> Result<ResultSummary, VotingError> {
        let registry = self.read();
        registry.result(self.clock.now())
    }

    pub fn counts(&self) -> Tally {
        self.read().counts()
    }

    pub fn phase(&self) -> Phase {
        let registry = self.read();
        registry.phase(self.clock.now())
    }

    /// Run `request` on behalf of `caller`, with the same locking as the
    /// matching method.
    pub fn apply(&self, caller: &Identity, request: BallotRequest) -> Result<BallotResponse, Error> {
        Ok(match request {
            BallotRequest::Register { identities } => {
                BallotResponse::Registered(self.register(identities, caller)?)
            }
            BallotRequest::Vote { choice } => BallotResponse::Voted(self.vote(choice, caller)?),
            BallotRequest::Result => BallotResponse::Result(self.result()?),
            BallotRequest::Counts => BallotResponse::Counts(self.counts()),
        })
    }

    /// Authenticate `request` with `resolver` against this registry's clock,
    /// then run the operation it carries.
    pub fn execute<R: IdentityResolver>(
        &self,
        resolver: &R,
        request: &R::Request,
    ) -> Result<BallotResponse, Error> {
        let Authorized { caller, request } = resolver.resolve(request, self.clock.now())?;
        self.apply(&caller, request)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read().snapshot()
    }

    /// Run `f` against a consistent read-only view of the registry.
    pub fn inspect<T>(&self, f: impl FnOnce(&BallotRegistry) -> T) -> T {
        f(&self.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Keypair, ManualClock, OptionSelector, SignatureResolver};
    use std::thread;

    fn shared(voters: usize) -> SharedRegistry<ManualClock> {
        let admin = Identity::from("admin");
        let mut registry = BallotRegistry::create(10, "p", "a", "b", admin.clone(), 0).unwrap();
        registry
            .register((0..voters).map(|i| Identity::new(format!("v{i}"))), &admin)
            .unwrap();
        SharedRegistry::new(registry, ManualClock::new(0))
    }

    #[test]
    fn concurrent_double_vote_counts_once() {
        let registry = shared(1);
        let voter = Identity::from("v0");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let voter = voter.clone();
                thread::spawn(move || registry.vote(OptionSelector::A, &voter).is_ok())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(registry.counts().votes_for_a, 1);
    }

    #[test]
    fn concurrent_voters_all_counted() {
        let registry = shared(16);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    let choice = if i % 2 == 0 { OptionSelector::A } else { OptionSelector::B };
                    registry.vote(choice, &Identity::new(format!("v{i}"))).unwrap();
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let tally = registry.counts();
        assert_eq!(tally.votes_for_a, 8);
        assert_eq!(tally.votes_for_b, 8);
        assert_eq!(registry.inspect(|r| r.voter_count()), 16);
    }

    #[test]
    fn phase_follows_clock() {
        let registry = shared(1);
        assert_eq!(registry.phase(), Phase::Open);
        assert_eq!(registry.result(), Err(VotingError::VotingStillOpen));

        registry.clock().set(601);
        assert_eq!(registry.phase(), Phase::Closed);
        assert!(registry.result().unwrap().is_tie());
        assert_eq!(
            registry.vote(OptionSelector::A, &Identity::from("v0")),
            Err(VotingError::VotingClosed)
        );
    }

    #[test]
    fn register_after_deadline_is_allowed() {
        let registry = shared(0);
        registry.clock().set(601);
        assert_eq!(registry.phase(), Phase::Closed);

        let report = registry.register([Identity::from("late")], &Identity::from("admin")).unwrap();
        assert_eq!(report.registered().count(), 1);
        assert!(registry.inspect(|r| r.is_registered(&Identity::from("late"))));

        // Eligibility is recorded but can no longer be exercised
        assert_eq!(
            registry.vote(OptionSelector::A, &Identity::from("late")),
            Err(VotingError::VotingClosed)
        );
    }

    #[test]
    fn execute_runs_only_the_signed_operation() {
        let admin = Keypair::generate();
        let voter = Keypair::generate();
        let registry = SharedRegistry::new(
            BallotRegistry::create(10, "p", "a", "b", admin.identity(), 0).unwrap(),
            ManualClock::new(0),
        );
        let resolver = SignatureResolver::default();

        let enroll = BallotRequest::Register { identities: vec![voter.identity()] };
        let signed = admin.sign(enroll, 0).unwrap();
        assert!(matches!(
            registry.execute(&resolver, &signed),
            Ok(BallotResponse::Registered(_))
        ));

        // A captured read-only request cannot be turned into a registration
        let captured = admin.sign(BallotRequest::Counts, 0).unwrap();
        let forged = crate::SignedRequest {
            request: BallotRequest::Register { identities: vec![Identity::from("mallory")] },
            ..captured
        };
        let err = registry.execute(&resolver, &forged).unwrap_err();
        assert_eq!(err.kind(), "invalid_signature");
        assert!(!registry.inspect(|r| r.is_registered(&Identity::from("mallory"))));

        let ballot = voter.sign(BallotRequest::Vote { choice: 1 }, 5).unwrap();
        registry.clock().set(5);
        assert!(registry.execute(&resolver, &ballot).is_ok());
        assert_eq!(registry.counts().votes_for_b, 1);

        // Replaying the same signed request once the window has passed
        registry.clock().set(100);
        let err = registry.execute(&resolver, &signed).unwrap_err();
        assert_eq!(err.kind(), "stale_request");
    }
}
