//! Caller identities and the seam that authenticates them.
//!
//! The registry trusts whatever [`Identity`] it is handed. Authentication
//! happens before that, in an [`IdentityResolver`]. The bundled
//! [`SignatureResolver`] accepts ed25519-signed [`BallotRequest`]s, derives
//! the identity from the signer's verifying key and hands back the request
//! that was actually signed.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AuthorizationError, Authorized, BallotRequest, Timestamp};

/// An opaque, unforgeable caller identifier.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity of an ed25519 key holder: hex BLAKE3 of the raw key bytes.
    pub fn from_key_bytes(key: &[u8; 32]) -> Self {
        Self(hex::encode(blake3::hash(key).as_bytes()))
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self::from_key_bytes(key.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves an inbound request to the identity that issued it and the
/// operation it asks for.
pub trait IdentityResolver: Send + Sync {
    type Request;

    fn resolve(
        &self,
        request: &Self::Request,
        now: Timestamp,
    ) -> Result<Authorized, AuthorizationError>;
}

/// How far, in seconds, a request's `issued_at` may lie from the resolver's
/// clock before it is refused.
pub const DEFAULT_MAX_REQUEST_AGE: u64 = 30;

/// A [`BallotRequest`] signed by an ed25519 key.
///
/// The signature covers the signer's key, the request and `issued_at`, so it
/// cannot be lifted onto another operation or another point in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedRequest {
    /// Raw verifying key of the signer.
    pub public_key: [u8; 32],

    pub request: BallotRequest,

    /// Clock time at which the signer issued the request.
    pub issued_at: Timestamp,

    /// Ed25519 signature over the signable content.
    pub signature: Vec<u8>,
}

impl SignedRequest {
    /// The identity this request claims to come from.
    pub fn claimed_identity(&self) -> Identity {
        Identity::from_key_bytes(&self.public_key)
    }

    /// The bytes the signature covers (everything except the signature).
    fn signable_content(&self) -> Result<Vec<u8>, ciborium::ser::Error<std::io::Error>> {
        let signable = SignableRequest {
            public_key: &self.public_key,
            request: &self.request,
            issued_at: self.issued_at,
        };

        let mut buf = Vec::new();
        ciborium::into_writer(&signable, &mut buf)?;
        Ok(buf)
    }
}

#[derive(Serialize)]
struct SignableRequest<'a> {
    public_key: &'a [u8; 32],
    request: &'a BallotRequest,
    issued_at: Timestamp,
}

/// Verifies [`SignedRequest`]s and yields the signer's identity along with
/// the request they signed.
#[derive(Clone, Copy, Debug)]
pub struct SignatureResolver {
    max_age: u64,
}

impl SignatureResolver {
    pub fn new(max_age: u64) -> Self {
        Self { max_age }
    }

    pub fn max_age(&self) -> u64 {
        self.max_age
    }
}

impl Default for SignatureResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUEST_AGE)
    }
}

impl IdentityResolver for SignatureResolver {
    type Request = SignedRequest;

    fn resolve(
        &self,
        request: &SignedRequest,
        now: Timestamp,
    ) -> Result<Authorized, AuthorizationError> {
        let claimed = request.claimed_identity();
        let invalid = || AuthorizationError::InvalidSignature(claimed.clone());

        let key = VerifyingKey::from_bytes(&request.public_key).map_err(|_| invalid())?;
        let signature = Signature::from_slice(&request.signature).map_err(|_| invalid())?;
        let content = request.signable_content().map_err(|_| invalid())?;

        key.verify(&content, &signature).map_err(|_| invalid())?;

        // Freshness is judged only once the timestamp is known to be the signer's
        if request.issued_at.abs_diff(now) > self.max_age {
            return Err(AuthorizationError::StaleRequest {
                identity: claimed,
                issued_at: request.issued_at,
                now,
            });
        }

        Ok(Authorized {
            caller: claimed,
            request: request.request.clone(),
        })
    }
}

/// An ed25519 signing key together with the identity it resolves to.
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a keypair from the raw 32-byte secret printed by `keygen`.
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn identity(&self) -> Identity {
        Identity::from_verifying_key(&self.verifying_key())
    }

    /// Sign `request` as issued at `issued_at` and package it for a
    /// [`SignatureResolver`].
    pub fn sign(
        &self,
        request: BallotRequest,
        issued_at: Timestamp,
    ) -> Result<SignedRequest, AuthorizationError> {
        let mut signed = SignedRequest {
            public_key: self.verifying_key().to_bytes(),
            request,
            issued_at,
            signature: Vec::new(),
        };

        let content = signed
            .signable_content()
            .map_err(|e| AuthorizationError::MalformedRequest(e.to_string()))?;
        signed.signature = self.signing_key.sign(&content).to_bytes().to_vec();

        Ok(signed)
    }
}
