pub mod error;
pub mod memory;
pub mod observability;
pub mod poll;
pub mod results;
pub mod sqlite;
pub mod store;
pub mod suggest;
pub mod vote;

pub use error::CoreError;
pub use results::WinnerPolicy;
pub use store::{PollStore, Storage, StoreError};
pub use suggest::QuestionSuggester;
pub use vote::{DuplicateVotePolicy, VoteSettings, VoterContext};

/// Shared state handed to every request handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Storage,
    pub suggester: QuestionSuggester,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Storage, suggester: QuestionSuggester, config: AppConfig) -> Self {
        Self {
            store,
            suggester,
            config,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub voting: VoteSettings,
    pub winner_policy: WinnerPolicy,
    /// Take the voter address from `X-Forwarded-For` instead of the socket
    /// peer. Only safe behind a reverse proxy that overwrites the header.
    pub trust_proxy: bool,
    /// The public URL of this server (e.g., https://polls.example.com).
    /// Used for CORS auto-configuration.
    pub public_url: Option<String>,
}
