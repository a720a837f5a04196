use ballotbox_models::{NewPollOption, Poll, PollOption};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub use crate::memory::MemoryStore;
pub use crate::sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(ballotbox_db::DbError),
    #[error("poll already exists: {0}")]
    Conflict(String),
}

impl From<ballotbox_db::DbError> for StoreError {
    fn from(e: ballotbox_db::DbError) -> Self {
        match e {
            ballotbox_db::DbError::Conflict(id) => StoreError::Conflict(id),
            other => StoreError::Db(other),
        }
    }
}

/// A poll that passed validation and is ready to be stored.
///
/// Only [`crate::poll::validate_new_poll`] builds one, so a store can rely on
/// a trimmed question and at least two non-blank options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollDraft {
    pub(crate) question: String,
    pub(crate) options: Vec<NewPollOption>,
}

impl PollDraft {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[NewPollOption] {
        &self.options
    }

    pub(crate) fn into_poll(self, id: String, created_at: DateTime<Utc>) -> Poll {
        Poll {
            id,
            question: self.question,
            options: self
                .options
                .into_iter()
                .map(|o| PollOption {
                    text: o.text,
                    votes: 0,
                    image_url: o.image_url,
                })
                .collect(),
            total_votes: 0,
            created_at,
        }
    }
}

/// A change applied to one poll under that poll's serialization point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollMutation {
    /// Add one vote to `option_index`. With a `voter_key`, a key that already
    /// voted on the poll is turned away.
    CastVote {
        option_index: i64,
        voter_key: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(Poll),
    PollNotFound,
    OptionOutOfRange,
    AlreadyVoted,
}

pub fn new_poll_id() -> String {
    Uuid::new_v4().to_string()
}

/// Storage interface for polls.
///
/// Implementations own the canonical copy of every poll. Reads hand out
/// clones; every mutation goes through [`PollStore::update_poll`], which must
/// serialize mutations of the same poll so no vote is lost.
#[allow(async_fn_in_trait)]
pub trait PollStore: Send + Sync {
    /// Store a new poll under a freshly generated id.
    async fn create_poll(&self, draft: PollDraft) -> Result<Poll, StoreError>;

    async fn get_poll(&self, id: &str) -> Result<Option<Poll>, StoreError>;

    /// Newest polls first, at most `limit`.
    async fn list_polls(&self, limit: usize) -> Result<Vec<Poll>, StoreError>;

    async fn update_poll(
        &self,
        id: &str,
        mutation: PollMutation,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Insert a fully-formed poll, tallies included. Fails with
    /// [`StoreError::Conflict`] when the id is taken.
    async fn import_poll(&self, poll: Poll) -> Result<(), StoreError>;
}

/// Enum-dispatch wrapper over the available backends; `Clone + Send + Sync`.
#[derive(Clone)]
pub enum Storage {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Storage {
    pub fn memory() -> Self {
        Storage::Memory(MemoryStore::new())
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Storage::Memory(_) => "memory",
            Storage::Sqlite(_) => "sqlite",
        }
    }

    pub async fn create_poll(&self, draft: PollDraft) -> Result<Poll, StoreError> {
        match self {
            Storage::Memory(s) => s.create_poll(draft).await,
            Storage::Sqlite(s) => s.create_poll(draft).await,
        }
    }

    pub async fn get_poll(&self, id: &str) -> Result<Option<Poll>, StoreError> {
        match self {
            Storage::Memory(s) => s.get_poll(id).await,
            Storage::Sqlite(s) => s.get_poll(id).await,
        }
    }

    pub async fn list_polls(&self, limit: usize) -> Result<Vec<Poll>, StoreError> {
        match self {
            Storage::Memory(s) => s.list_polls(limit).await,
            Storage::Sqlite(s) => s.list_polls(limit).await,
        }
    }

    pub async fn update_poll(
        &self,
        id: &str,
        mutation: PollMutation,
    ) -> Result<UpdateOutcome, StoreError> {
        match self {
            Storage::Memory(s) => s.update_poll(id, mutation).await,
            Storage::Sqlite(s) => s.update_poll(id, mutation).await,
        }
    }

    pub async fn import_poll(&self, poll: Poll) -> Result<(), StoreError> {
        match self {
            Storage::Memory(s) => s.import_poll(poll).await,
            Storage::Sqlite(s) => s.import_poll(poll).await,
        }
    }
}
