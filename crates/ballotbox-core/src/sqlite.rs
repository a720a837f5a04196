use crate::store::{new_poll_id, PollDraft, PollMutation, PollStore, StoreError, UpdateOutcome};
use ballotbox_db::polls::{self, VoteWrite};
use ballotbox_db::DbPool;
use ballotbox_models::Poll;
use chrono::Utc;

/// SQLite-backed store. Polls, tallies and voter keys survive restarts.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and apply
    /// migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = ballotbox_db::create_pool(database_url, max_connections)
            .await
            .map_err(ballotbox_db::DbError::from)?;
        ballotbox_db::run_migrations(&pool)
            .await
            .map_err(ballotbox_db::DbError::from)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl PollStore for SqliteStore {
    async fn create_poll(&self, draft: PollDraft) -> Result<Poll, StoreError> {
        let poll = draft.into_poll(new_poll_id(), Utc::now());
        polls::insert_poll(&self.pool, &poll).await?;
        Ok(poll)
    }

    async fn get_poll(&self, id: &str) -> Result<Option<Poll>, StoreError> {
        Ok(polls::get_poll(&self.pool, id).await?)
    }

    async fn list_polls(&self, limit: usize) -> Result<Vec<Poll>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(polls::list_polls(&self.pool, limit).await?)
    }

    /// The poll returned after a recorded vote is read after the vote commits,
    /// so it may already include other voters' concurrent votes.
    async fn update_poll(
        &self,
        id: &str,
        mutation: PollMutation,
    ) -> Result<UpdateOutcome, StoreError> {
        match mutation {
            PollMutation::CastVote {
                option_index,
                voter_key,
            } => {
                let write = polls::record_vote(
                    &self.pool,
                    id,
                    option_index,
                    voter_key.as_deref(),
                    Utc::now(),
                )
                .await?;

                match write {
                    VoteWrite::Recorded => Ok(polls::get_poll(&self.pool, id)
                        .await?
                        .map(UpdateOutcome::Updated)
                        .unwrap_or(UpdateOutcome::PollNotFound)),
                    VoteWrite::UnknownPoll => Ok(UpdateOutcome::PollNotFound),
                    VoteWrite::UnknownOption => Ok(UpdateOutcome::OptionOutOfRange),
                    VoteWrite::DuplicateVoter => Ok(UpdateOutcome::AlreadyVoted),
                }
            }
        }
    }

    async fn import_poll(&self, poll: Poll) -> Result<(), StoreError> {
        polls::insert_poll(&self.pool, &poll).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotbox_models::NewPollOption;

    async fn test_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn draft() -> PollDraft {
        PollDraft {
            question: "Best topping?".into(),
            options: vec![NewPollOption::new("Cheese"), NewPollOption::new("Pepperoni")],
        }
    }

    #[tokio::test]
    async fn create_and_vote_round_trip() {
        let store = test_store().await;
        let poll = store.create_poll(draft()).await.unwrap();

        let outcome = store
            .update_poll(
                &poll.id,
                PollMutation::CastVote {
                    option_index: 0,
                    voter_key: Some("k".into()),
                },
            )
            .await
            .unwrap();
        let UpdateOutcome::Updated(updated) = outcome else {
            panic!("expected update, got {outcome:?}");
        };
        assert_eq!(updated.options[0].votes, 1);
        assert_eq!(updated.total_votes, 1);

        let again = store
            .update_poll(
                &poll.id,
                PollMutation::CastVote {
                    option_index: 1,
                    voter_key: Some("k".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(again, UpdateOutcome::AlreadyVoted);
    }

    #[tokio::test]
    async fn rejections_map_to_outcomes() {
        let store = test_store().await;
        let poll = store.create_poll(draft()).await.unwrap();

        let out_of_range = store
            .update_poll(
                &poll.id,
                PollMutation::CastVote {
                    option_index: 5,
                    voter_key: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(out_of_range, UpdateOutcome::OptionOutOfRange);

        let missing = store
            .update_poll(
                "missing",
                PollMutation::CastVote {
                    option_index: 0,
                    voter_key: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(missing, UpdateOutcome::PollNotFound);
    }

    #[tokio::test]
    async fn polls_survive_reopening_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("polls.db").display());

        let id = {
            let store = SqliteStore::connect(&url, 1).await.unwrap();
            let poll = store.create_poll(draft()).await.unwrap();
            store
                .update_poll(
                    &poll.id,
                    PollMutation::CastVote {
                        option_index: 1,
                        voter_key: None,
                    },
                )
                .await
                .unwrap();
            store.pool().close().await;
            poll.id
        };

        let reopened = SqliteStore::connect(&url, 1).await.unwrap();
        let poll = reopened.get_poll(&id).await.unwrap().unwrap();
        assert_eq!(poll.options[1].votes, 1);
        assert_eq!(poll.total_votes, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_votes_are_not_lost() {
        const VOTERS: usize = 16;
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("votes.db").display());
        let store = SqliteStore::connect(&url, 8).await.unwrap();
        let poll = store
            .create_poll(PollDraft {
                question: "Pick one".into(),
                options: (0..VOTERS)
                    .map(|i| NewPollOption::new(format!("option {i}")))
                    .collect(),
            })
            .await
            .unwrap();

        let mut tasks = Vec::with_capacity(VOTERS);
        for index in 0..VOTERS {
            let store = store.clone();
            let id = poll.id.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .update_poll(
                        &id,
                        PollMutation::CastVote {
                            option_index: index as i64,
                            voter_key: Some(format!("voter-{index}")),
                        },
                    )
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            assert!(matches!(task.await.unwrap(), UpdateOutcome::Updated(_)));
        }

        let stored = store.get_poll(&poll.id).await.unwrap().unwrap();
        assert_eq!(stored.total_votes, VOTERS as u64);
        assert!(stored.options.iter().all(|o| o.votes == 1));
        assert_eq!(stored.tallied_votes(), stored.total_votes);
        store.pool().close().await;
    }
}
