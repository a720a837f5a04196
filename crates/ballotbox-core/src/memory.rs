use crate::store::{new_poll_id, PollDraft, PollMutation, PollStore, StoreError, UpdateOutcome};
use ballotbox_models::Poll;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// One stored poll plus the voter keys that already voted on it.
#[derive(Debug)]
struct PollEntry {
    poll: Poll,
    voters: HashSet<String>,
}

impl PollEntry {
    fn new(poll: Poll) -> Self {
        Self {
            poll,
            voters: HashSet::new(),
        }
    }

    fn apply(&mut self, mutation: PollMutation) -> UpdateOutcome {
        match mutation {
            PollMutation::CastVote {
                option_index,
                voter_key,
            } => {
                let Some(index) = usize::try_from(option_index)
                    .ok()
                    .filter(|&i| i < self.poll.options.len())
                else {
                    return UpdateOutcome::OptionOutOfRange;
                };

                if let Some(key) = voter_key {
                    if !self.voters.insert(key) {
                        return UpdateOutcome::AlreadyVoted;
                    }
                }

                self.poll.options[index].votes += 1;
                self.poll.total_votes += 1;
                UpdateOutcome::Updated(self.poll.clone())
            }
        }
    }
}

fn lock_entry(entry: &Mutex<PollEntry>) -> MutexGuard<'_, PollEntry> {
    match entry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Process-lifetime poll store. Nothing survives a restart.
///
/// Each poll sits behind its own mutex, so votes on one poll are serialized
/// while different polls never contend.
#[derive(Clone, Default)]
pub struct MemoryStore {
    polls: Arc<DashMap<String, Arc<Mutex<PollEntry>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.polls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }

    /// Clone the entry handle out so the map shard is released before the
    /// entry mutex is taken.
    fn entry(&self, id: &str) -> Option<Arc<Mutex<PollEntry>>> {
        self.polls.get(id).map(|e| Arc::clone(e.value()))
    }

    fn insert(&self, poll: Poll) -> Result<(), StoreError> {
        match self.polls.entry(poll.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(poll.id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(PollEntry::new(poll))));
                Ok(())
            }
        }
    }
}

impl PollStore for MemoryStore {
    async fn create_poll(&self, draft: PollDraft) -> Result<Poll, StoreError> {
        let poll = draft.into_poll(new_poll_id(), Utc::now());
        self.insert(poll.clone())?;
        Ok(poll)
    }

    async fn get_poll(&self, id: &str) -> Result<Option<Poll>, StoreError> {
        Ok(self.entry(id).map(|entry| {
            let guard = lock_entry(&entry);
            guard.poll.clone()
        }))
    }

    async fn list_polls(&self, limit: usize) -> Result<Vec<Poll>, StoreError> {
        let handles: Vec<Arc<Mutex<PollEntry>>> =
            self.polls.iter().map(|e| Arc::clone(e.value())).collect();

        let mut polls: Vec<Poll> = handles
            .iter()
            .map(|entry| lock_entry(entry).poll.clone())
            .collect();
        polls.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        polls.truncate(limit);
        Ok(polls)
    }

    async fn update_poll(
        &self,
        id: &str,
        mutation: PollMutation,
    ) -> Result<UpdateOutcome, StoreError> {
        let Some(entry) = self.entry(id) else {
            return Ok(UpdateOutcome::PollNotFound);
        };
        let outcome = lock_entry(&entry).apply(mutation);
        Ok(outcome)
    }

    async fn import_poll(&self, poll: Poll) -> Result<(), StoreError> {
        self.insert(poll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotbox_models::NewPollOption;
    use chrono::Duration;

    fn draft(question: &str, options: &[&str]) -> PollDraft {
        PollDraft {
            question: question.to_string(),
            options: options.iter().map(|&t| NewPollOption::new(t)).collect(),
        }
    }

    fn vote(option_index: i64, voter_key: Option<&str>) -> PollMutation {
        PollMutation::CastVote {
            option_index,
            voter_key: voter_key.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_same_poll() {
        let store = MemoryStore::new();
        let created = store
            .create_poll(draft("Best topping?", &["Cheese", "Pepperoni"]))
            .await
            .unwrap();

        let loaded = store.get_poll(&created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn get_unknown_poll_is_none() {
        let store = MemoryStore::new();
        assert!(store.get_poll("missing").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn vote_updates_option_and_total() {
        let store = MemoryStore::new();
        let poll = store.create_poll(draft("Q", &["A", "B"])).await.unwrap();

        let outcome = store.update_poll(&poll.id, vote(1, None)).await.unwrap();
        let UpdateOutcome::Updated(updated) = outcome else {
            panic!("expected update, got {outcome:?}");
        };
        assert_eq!(updated.options[1].votes, 1);
        assert_eq!(updated.total_votes, 1);

        let stored = store.get_poll(&poll.id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn out_of_range_vote_leaves_poll_untouched() {
        let store = MemoryStore::new();
        let poll = store.create_poll(draft("Q", &["A", "B"])).await.unwrap();

        for index in [-1, 2, i64::MAX] {
            let outcome = store
                .update_poll(&poll.id, vote(index, Some("k")))
                .await
                .unwrap();
            assert_eq!(outcome, UpdateOutcome::OptionOutOfRange);
        }

        let stored = store.get_poll(&poll.id).await.unwrap().unwrap();
        assert_eq!(stored, poll);
        // The rejected attempts must not have burned the voter key.
        let outcome = store.update_poll(&poll.id, vote(0, Some("k"))).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated(_)));
    }

    #[tokio::test]
    async fn unknown_poll_update_reports_not_found() {
        let store = MemoryStore::new();
        let outcome = store.update_poll("missing", vote(0, None)).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::PollNotFound);
    }

    #[tokio::test]
    async fn repeated_voter_key_is_rejected() {
        let store = MemoryStore::new();
        let poll = store.create_poll(draft("Q", &["A", "B"])).await.unwrap();

        let first = store.update_poll(&poll.id, vote(0, Some("k"))).await.unwrap();
        let second = store.update_poll(&poll.id, vote(1, Some("k"))).await.unwrap();
        assert!(matches!(first, UpdateOutcome::Updated(_)));
        assert_eq!(second, UpdateOutcome::AlreadyVoted);

        let stored = store.get_poll(&poll.id).await.unwrap().unwrap();
        assert_eq!(stored.total_votes, 1);
        assert_eq!(stored.options[1].votes, 0);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        let base = Utc::now();
        for (id, age) in [("old", 10), ("new", 0), ("mid", 5)] {
            let mut poll = draft("Q", &["A", "B"]).into_poll(id.into(), base);
            poll.created_at = base - Duration::minutes(age);
            store.import_poll(poll).await.unwrap();
        }

        let polls = store.list_polls(2).await.unwrap();
        let ids: Vec<_> = polls.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn import_rejects_taken_id() {
        let store = MemoryStore::new();
        let poll = draft("Q", &["A", "B"]).into_poll("demo".into(), Utc::now());
        store.import_poll(poll.clone()).await.unwrap();
        let err = store.import_poll(poll).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(id) if id == "demo"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_votes_are_not_lost() {
        const VOTERS: usize = 16;
        let store = MemoryStore::new();
        let labels: Vec<String> = (0..VOTERS).map(|i| format!("option {i}")).collect();
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
        let poll = store.create_poll(draft("Q", &labels)).await.unwrap();

        let mut tasks = Vec::with_capacity(VOTERS);
        for index in 0..VOTERS {
            let store = store.clone();
            let id = poll.id.clone();
            tasks.push(tokio::spawn(async move {
                let key = format!("voter-{index}");
                store
                    .update_poll(&id, vote(index as i64, Some(&key)))
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
    }
}
