//! Scripted ballot sessions.
//!
//! A script is a TOML file listing timestamped steps. Steps run in order
//! against one registry, with a manual clock moved to each step's `at`
//! before it runs. A rejected step is reported and the replay carries on.
//!
//! A step names its `caller` directly, or carries a `signer` (the hex secret
//! key printed by `ezballot keygen`). Signed steps are signed as issued at
//! `issued_at` (defaulting to `at`) and authenticated before they run, so the
//! caller is whoever holds the key.
//!
//! ```toml
//! start = 0
//!
//! [[step]]
//! at = 0
//! op = "register"
//! caller = "admin"
//! identities = ["V1", "V2"]
//!
//! [[step]]
//! at = 60
//! op = "vote"
//! caller = "V1"
//! choice = 0
//! ```

use anyhow::{Context, Result, bail};
use ezballot_core::{
    BallotRegistry, BallotRequest, BallotResponse, Clock, Identity, Keypair, ManualClock,
    Notification, ResultSummary, SharedRegistry, SignatureResolver, Tally, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::BallotConfig;

#[derive(Clone, Debug, Deserialize)]
pub struct Script {
    /// Clock time at which the ballot is created.
    #[serde(default)]
    pub start: Timestamp,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// Caller used by unsigned steps that name nobody.
pub const ANONYMOUS: &str = "anonymous";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Step {
    pub at: Timestamp,

    /// Identity the step runs as, taken on trust.
    #[serde(default)]
    pub caller: Option<String>,

    /// Hex ed25519 secret key that signs the step.
    #[serde(default)]
    pub signer: Option<String>,

    /// Time the signed request claims to be issued at.
    #[serde(default)]
    pub issued_at: Option<Timestamp>,

    #[serde(flatten)]
    pub op: StepOp,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StepOp {
    Register {
        identities: Vec<String>,
    },
    Vote {
        choice: u8,
    },
    Result,
    #[default]
    Counts,
    Snapshot,
}

impl StepOp {
    fn name(&self) -> &'static str {
        match self {
            StepOp::Register { .. } => "register",
            StepOp::Vote { .. } => "vote",
            StepOp::Result => "result",
            StepOp::Counts => "counts",
            StepOp::Snapshot => "snapshot",
        }
    }

    /// The registry operation this step performs, if any.
    fn request(&self) -> Option<BallotRequest> {
        match self {
            StepOp::Register { identities } => Some(BallotRequest::Register {
                identities: identities.iter().map(|i| Identity::new(i.as_str())).collect(),
            }),
            StepOp::Vote { choice } => Some(BallotRequest::Vote { choice: *choice }),
            StepOp::Result => Some(BallotRequest::Result),
            StepOp::Counts => Some(BallotRequest::Counts),
            StepOp::Snapshot => None,
        }
    }
}

impl Script {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid script {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let script: Self = toml::from_str(content)?;

        for (i, step) in script.steps.iter().enumerate() {
            if step.caller.is_some() && step.signer.is_some() {
                bail!("step {} sets both caller and signer", i + 1);
            }
            if let Some(secret) = &step.signer {
                parse_signer(secret).with_context(|| format!("step {} has an invalid signer", i + 1))?;
            }
        }

        Ok(script)
    }
}

/// Decode a hex secret key as printed by `ezballot keygen`.
fn parse_signer(secret: &str) -> Result<Keypair> {
    let bytes = hex::decode(secret.trim()).context("signer is not valid hex")?;
    let secret: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("signer must be a 32-byte ed25519 secret key"))?;
    Ok(Keypair::from_secret_bytes(&secret))
}

/// What a single step produced.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Notifications { notifications: Vec<Notification> },
    Result { summary: ResultSummary },
    Counts { tally: Tally },
    Snapshot { digest: String, bytes: usize },
    Rejected { kind: &'static str, message: String },
}

impl From<BallotResponse> for Outcome {
    fn from(response: BallotResponse) -> Self {
        match response {
            BallotResponse::Registered(report) => Outcome::Notifications {
                notifications: report.notifications,
            },
            BallotResponse::Voted(receipt) => Outcome::Notifications {
                notifications: vec![receipt.notification],
            },
            BallotResponse::Result(summary) => Outcome::Result { summary },
            BallotResponse::Counts(tally) => Outcome::Counts { tally },
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub at: Timestamp,
    pub op: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[t={}] {}: ", self.at, self.op)?;
        match &self.outcome {
            Outcome::Notifications { notifications } if notifications.is_empty() => {
                f.write_str("no change")
            }
            Outcome::Notifications { notifications } => {
                let parts: Vec<String> = notifications
                    .iter()
                    .map(|n| match n {
                        Notification::Registered { identity } => format!("Registered({identity})"),
                        Notification::Voted { voter, label, .. } => {
                            format!("Voted({voter}, {label})")
                        }
                    })
                    .collect();
                f.write_str(&parts.join(", "))
            }
            Outcome::Result { summary } => write!(
                f,
                "{} ({} - {})",
                summary, summary.tally.votes_for_a, summary.tally.votes_for_b
            ),
            Outcome::Counts { tally } => write!(f, "{} - {}", tally.votes_for_a, tally.votes_for_b),
            Outcome::Snapshot { digest, bytes } => write!(f, "{digest} ({bytes} bytes)"),
            Outcome::Rejected { kind, message } => write!(f, "rejected [{kind}] {message}"),
        }
    }
}

/// A ballot being driven by a script.
pub struct Session {
    registry: SharedRegistry<ManualClock>,
    resolver: SignatureResolver,
}

impl Session {
    pub fn create(ballot: &BallotConfig, start: Timestamp) -> Result<Self> {
        let registry = BallotRegistry::create(
            ballot.duration_minutes,
            ballot.proposal.as_str(),
            ballot.option_a.as_str(),
            ballot.option_b.as_str(),
            Identity::new(ballot.admin.as_str()),
            start,
        )
        .context("failed to create ballot")?;

        Ok(Self {
            registry: SharedRegistry::new(registry, ManualClock::new(start)),
            resolver: SignatureResolver::new(ballot.max_request_age),
        })
    }

    pub fn registry(&self) -> &SharedRegistry<ManualClock> {
        &self.registry
    }

    pub fn step(&self, step: &Step) -> StepReport {
        let clock = self.registry.clock();
        if step.at < clock.now() {
            warn!(at = step.at, now = clock.now(), "step is in the past, clock not moved");
        }
        clock.set(step.at);
        let at = clock.now();

        debug!(at, op = step.op.name(), signed = step.signer.is_some(), "running step");

        let outcome = match step.op.request() {
            Some(request) => self.submit(step, request, at),
            None => self.snapshot(),
        };

        StepReport {
            at,
            op: step.op.name(),
            outcome,
        }
    }

    pub fn replay(&self, script: &Script) -> Vec<StepReport> {
        script.steps.iter().map(|step| self.step(step)).collect()
    }

    fn submit(&self, step: &Step, request: BallotRequest, at: Timestamp) -> Outcome {
        let response = match &step.signer {
            Some(secret) => {
                let keypair = match parse_signer(secret) {
                    Ok(keypair) => keypair,
                    Err(e) => {
                        return Outcome::Rejected {
                            kind: "invalid_signer",
                            message: format!("{e:#}"),
                        };
                    }
                };
                keypair
                    .sign(request, step.issued_at.unwrap_or(at))
                    .map_err(ezballot_core::Error::from)
                    .and_then(|signed| self.registry.execute(&self.resolver, &signed))
            }
            None => {
                let caller = Identity::new(step.caller.as_deref().unwrap_or(ANONYMOUS));
                self.registry.apply(&caller, request)
            }
        };

        response
            .map(Outcome::from)
            .unwrap_or_else(|e| rejected(e.kind(), &e))
    }

    fn snapshot(&self) -> Outcome {
        let snapshot = self.registry.snapshot();
        match snapshot.encode().and_then(|bytes| Ok((snapshot.digest()?, bytes.len()))) {
            Ok((digest, bytes)) => Outcome::Snapshot {
                digest: digest.to_hex(),
                bytes,
            },
            Err(e) => rejected(e.kind(), &e),
        }
    }
}

fn rejected(kind: &'static str, error: &dyn std::error::Error) -> Outcome {
    Outcome::Rejected {
        kind,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ballot() -> BallotConfig {
        BallotConfig {
            proposal: "Add dark mode?".into(),
            option_a: "Yes".into(),
            option_b: "No".into(),
            duration_minutes: 5,
            admin: "admin".into(),
            max_request_age: 30,
        }
    }

    const DARK_MODE: &str = r#"
start = 0

[[step]]
at = 0
op = "register"
caller = "admin"
identities = ["V1", "V2", "V3"]

[[step]]
at = 60
op = "vote"
caller = "V1"
choice = 0

[[step]]
at = 70
op = "vote"
caller = "V1"
choice = 1

[[step]]
at = 100
op = "result"

[[step]]
at = 120
op = "vote"
caller = "V2"
choice = 1

[[step]]
at = 130
op = "register"
caller = "V1"
identities = ["V5"]

[[step]]
at = 301
op = "result"

[[step]]
at = 302
op = "counts"
"#;

    #[test]
    fn parses_steps() {
        let script = Script::parse(DARK_MODE).unwrap();
        assert_eq!(script.start, 0);
        assert_eq!(script.steps.len(), 8);
        assert_eq!(script.steps[1].caller.as_deref(), Some("V1"));
        assert!(matches!(script.steps[1].op, StepOp::Vote { choice: 0 }));
        assert!(matches!(script.steps[3].op, StepOp::Result));
    }

    #[test]
    fn rejects_unknown_op() {
        let err = Script::parse("[[step]]\nat = 1\nop = \"retract\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn replays_dark_mode_ballot() {
        let script = Script::parse(DARK_MODE).unwrap();
        let session = Session::create(&ballot(), script.start).unwrap();
        let reports = session.replay(&script);

        let lines: Vec<String> = reports.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            [
                "[t=0] register: Registered(V1), Registered(V2), Registered(V3)",
                "[t=60] vote: Voted(V1, Yes)",
                "[t=70] vote: rejected [already_voted] V1 has already voted",
                "[t=100] result: rejected [voting_still_open] voting is still open",
                "[t=120] vote: Voted(V2, No)",
                "[t=130] register: rejected [not_admin] V1 is not the ballot administrator",
                "[t=301] result: It's a Tie (1 - 1)",
                "[t=302] counts: 1 - 1",
            ]
        );
    }

    #[test]
    fn json_report_is_tagged() {
        let session = Session::create(&ballot(), 0).unwrap();
        let report = session.step(&Step {
            at: 400,
            caller: Some("V9".into()),
            op: StepOp::Vote { choice: 0 },
            ..Default::default()
        });

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["kind"], "voting_closed");
        assert_eq!(json["op"], "vote");
        assert_eq!(json["at"], 400);
    }

    #[test]
    fn clock_never_moves_back() {
        let session = Session::create(&ballot(), 100).unwrap();
        let report = session.step(&Step {
            at: 10,
            op: StepOp::Counts,
            ..Default::default()
        });
        assert_eq!(report.at, 100);
    }

    #[test]
    fn snapshot_step_reports_digest() {
        let session = Session::create(&ballot(), 0).unwrap();
        let report = session.step(&Step {
            at: 1,
            op: StepOp::Snapshot,
            ..Default::default()
        });
        match report.outcome {
            Outcome::Snapshot { digest, bytes } => {
                assert_eq!(digest.len(), 64);
                assert!(bytes > 0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn invalid_ballot_fails_session() {
        let mut config = ballot();
        config.duration_minutes = 0;
        assert!(Session::create(&config, 0).is_err());
    }

    fn secret_hex(keypair: &Keypair) -> String {
        hex::encode(keypair.signing_key().to_bytes())
    }

    #[test]
    fn replays_signed_steps() {
        let admin = Keypair::generate();
        let voter = Keypair::generate();

        let mut config = ballot();
        config.admin = admin.identity().to_string();

        let script = Script::parse(&format!(
            r#"
[[step]]
at = 0
op = "register"
signer = "{admin}"
identities = ["{voter_id}"]

[[step]]
at = 60
op = "vote"
signer = "{voter}"
choice = 0

[[step]]
at = 70
op = "register"
signer = "{voter}"
identities = ["mallory"]

[[step]]
at = 200
op = "register"
signer = "{admin}"
issued_at = 0
identities = ["mallory"]

[[step]]
at = 301
op = "result"
signer = "{voter}"
"#,
            admin = secret_hex(&admin),
            voter = secret_hex(&voter),
            voter_id = voter.identity(),
        ))
        .unwrap();

        let session = Session::create(&config, 0).unwrap();
        let reports = session.replay(&script);
        let kinds: Vec<_> = reports
            .iter()
            .map(|r| match &r.outcome {
                Outcome::Rejected { kind, .. } => *kind,
                _ => "ok",
            })
            .collect();

        assert_eq!(kinds, ["ok", "ok", "not_admin", "stale_request", "ok"]);
        assert_eq!(reports[1].to_string(), format!("[t=60] vote: Voted({}, Yes)", voter.identity()));
        assert_eq!(reports[4].to_string(), "[t=301] result: Yes (1 - 0)");
        assert!(!session.registry().inspect(|r| r.is_registered(&Identity::from("mallory"))));
    }

    #[test]
    fn rejects_step_with_caller_and_signer() {
        let signer = secret_hex(&Keypair::generate());
        let script = format!(
            "[[step]]\nat = 0\nop = \"counts\"\ncaller = \"admin\"\nsigner = \"{signer}\"\n"
        );
        assert!(Script::parse(&script).is_err());
    }

    #[test]
    fn rejects_malformed_signer() {
        let err = Script::parse("[[step]]\nat = 0\nop = \"counts\"\nsigner = \"abcd\"\n");
        assert!(err.is_err());

        let session = Session::create(&ballot(), 0).unwrap();
        let report = session.step(&Step {
            at: 1,
            signer: Some("zz".into()),
            ..Default::default()
        });
        assert!(matches!(report.outcome, Outcome::Rejected { kind: "invalid_signer", .. }));
    }

    #[test]
    fn unsigned_step_without_caller_is_anonymous() {
        let session = Session::create(&ballot(), 0).unwrap();
        let report = session.step(&Step {
            at: 1,
            op: StepOp::Register {
                identities: vec!["V1".into()],
            },
            ..Default::default()
        });
        assert_eq!(
            report.to_string(),
            "[t=1] register: rejected [not_admin] anonymous is not the ballot administrator"
        );
    }
}
