use crate::error::CoreError;
use crate::observability;
use crate::store::{PollMutation, Storage, UpdateOutcome};
use ballotbox_models::Poll;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity used when a request carries no usable peer information.
pub const FALLBACK_VOTER_IDENTITY: &str = "127.0.0.1";

/// How repeat votes from the same voter are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateVotePolicy {
    /// One vote per poll per hashed voter identity, enforced by the store.
    #[default]
    VoterIdentity,
    /// The server accepts every vote; clients remember that they voted.
    ClientMarker,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteSettings {
    pub duplicate_policy: DuplicateVotePolicy,
    /// Reject votes carrying more proxy-related headers than this. `None`
    /// disables the check.
    pub max_proxy_headers: Option<usize>,
}

/// Request metadata the recorder needs about whoever is voting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoterContext {
    /// Client address as resolved by the HTTP layer.
    pub identity: Option<String>,
    /// Number of proxy-related headers seen on the request.
    pub proxy_headers: usize,
}

impl VoterContext {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            proxy_headers: 0,
        }
    }

    pub fn with_proxy_headers(mut self, count: usize) -> Self {
        self.proxy_headers = count;
        self
    }

    fn identity(&self) -> &str {
        self.identity
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(FALLBACK_VOTER_IDENTITY)
    }
}

/// SHA-256 hex digest of a voter identity. Raw addresses are never stored.
pub fn voter_key(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Cast one vote for `option_index` on `poll_id`.
///
/// On success exactly one option and the poll total grow by one. Any
/// rejection leaves the poll untouched.
pub async fn record_vote(
    store: &Storage,
    settings: &VoteSettings,
    poll_id: &str,
    option_index: i64,
    voter: &VoterContext,
) -> Result<Poll, CoreError> {
    if let Some(max) = settings.max_proxy_headers {
        if voter.proxy_headers > max {
            observability::vote_rejected("proxy");
            tracing::warn!(
                poll_id,
                proxy_headers = voter.proxy_headers,
                max,
                "vote rejected: proxy headers over limit"
            );
            return Err(CoreError::ProxyRejected);
        }
    }

    let voter_key = match settings.duplicate_policy {
        DuplicateVotePolicy::VoterIdentity => Some(voter_key(voter.identity())),
        DuplicateVotePolicy::ClientMarker => None,
    };

    let outcome = store
        .update_poll(
            poll_id,
            PollMutation::CastVote {
                option_index,
                voter_key,
            },
        )
        .await?;

    match outcome {
        UpdateOutcome::Updated(poll) => {
            observability::vote_recorded();
            tracing::debug!(
                poll_id,
                option_index,
                total_votes = poll.total_votes,
                "vote recorded"
            );
            Ok(poll)
        }
        UpdateOutcome::PollNotFound => {
            observability::vote_rejected("not_found");
            tracing::debug!(poll_id, "vote rejected: unknown poll");
            Err(CoreError::NotFound)
        }
        UpdateOutcome::OptionOutOfRange => {
            observability::vote_rejected("invalid_option");
            tracing::debug!(poll_id, option_index, "vote rejected: option out of range");
            Err(CoreError::NotFound)
        }
        UpdateOutcome::AlreadyVoted => {
            observability::vote_rejected("duplicate");
            tracing::warn!(poll_id, "vote rejected: voter already voted");
            Err(CoreError::DuplicateVote)
        }
    }
}
