use crate::{DbError, DbPool};
use ballotbox_models::{Poll, PollOption};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PollRow {
    pub id: String,
    pub question: String,
    pub total_votes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PollOptionRow {
    pub poll_id: String,
    pub position: i64,
    pub text: String,
    pub image_url: Option<String>,
    pub votes: i64,
}

/// Result of a single vote write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteWrite {
    Recorded,
    UnknownPoll,
    UnknownOption,
    DuplicateVoter,
}

fn to_db_count(value: u64) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|_| DbError::Corrupt(format!("vote count {value} out of range")))
}

fn from_db_count(value: i64) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|_| DbError::Corrupt(format!("negative vote count {value}")))
}

fn assemble(row: PollRow, options: Vec<PollOptionRow>) -> Result<Poll, DbError> {
    let options = options
        .into_iter()
        .map(|o| {
            Ok(PollOption {
                text: o.text,
                votes: from_db_count(o.votes)?,
                image_url: o.image_url,
            })
        })
        .collect::<Result<Vec<_>, DbError>>()?;

    Ok(Poll {
        id: row.id,
        question: row.question,
        options,
        total_votes: from_db_count(row.total_votes)?,
        created_at: row.created_at,
    })
}

/// Insert a complete poll, including any existing tallies.
pub async fn insert_poll(pool: &DbPool, poll: &Poll) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO polls (id, question, total_votes, created_at)
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(&poll.id)
    .bind(&poll.question)
    .bind(to_db_count(poll.total_votes)?)
    .bind(poll.created_at)
    .execute(&mut *tx)
    .await;

    if let Err(sqlx::Error::Database(err)) = &inserted {
        if err.is_unique_violation() {
            return Err(DbError::Conflict(poll.id.clone()));
        }
    }
    inserted?;

    for (position, option) in poll.options.iter().enumerate() {
        sqlx::query(
            "INSERT INTO poll_options (poll_id, position, text, image_url, votes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&poll.id)
        .bind(position as i64)
        .bind(&option.text)
        .bind(option.image_url.as_deref())
        .bind(to_db_count(option.votes)?)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Read one poll. Both statements run in one read transaction so the
/// option tallies always match `total_votes`.
pub async fn get_poll(pool: &DbPool, id: &str) -> Result<Option<Poll>, DbError> {
    let mut tx = pool.begin().await?;

    let Some(row) = sqlx::query_as::<_, PollRow>(
        "SELECT id, question, total_votes, created_at FROM polls WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    else {
        tx.rollback().await?;
        return Ok(None);
    };

    let options = sqlx::query_as::<_, PollOptionRow>(
        "SELECT poll_id, position, text, image_url, votes
         FROM poll_options
         WHERE poll_id = ?1
         ORDER BY position ASC",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    if options.is_empty() {
        return Err(DbError::Corrupt(format!("poll {id} has no options")));
    }
    assemble(row, options).map(Some)
}

/// Newest polls first.
///
/// Both reads share one transaction, so they see the same snapshot and a
/// concurrent insert cannot shift the window between them.
pub async fn list_polls(pool: &DbPool, limit: i64) -> Result<Vec<Poll>, DbError> {
    let mut tx = pool.begin().await?;

    let rows = sqlx::query_as::<_, PollRow>(
        "SELECT id, question, total_votes, created_at
         FROM polls
         ORDER BY created_at DESC, id ASC
         LIMIT ?1",
    )
    .bind(limit.max(0))
    .fetch_all(&mut *tx)
    .await?;

    if rows.is_empty() {
        tx.rollback().await?;
        return Ok(Vec::new());
    }

    let option_rows = sqlx::query_as::<_, PollOptionRow>(
        "SELECT poll_id, position, text, image_url, votes
         FROM poll_options
         WHERE poll_id IN (
             SELECT id FROM polls ORDER BY created_at DESC, id ASC LIMIT ?1
         )
         ORDER BY poll_id ASC, position ASC",
    )
    .bind(limit.max(0))
    .fetch_all(&mut *tx)
    .await?;
    tx.commit().await?;

    let mut by_poll: HashMap<String, Vec<PollOptionRow>> = HashMap::with_capacity(rows.len());
    for option in option_rows {
        by_poll.entry(option.poll_id.clone()).or_default().push(option);
    }

    rows.into_iter()
        .map(|row| {
            let options = by_poll
                .remove(&row.id)
                .ok_or_else(|| DbError::Corrupt(format!("poll {} has no options", row.id)))?;
            assemble(row, options)
        })
        .collect()
}

/// Add one vote to `position` of `poll_id`.
///
/// The transaction opens with the counter update so the SQLite write lock is
/// held from the first statement; a rejected vote rolls back and leaves every
/// counter untouched. When `voter_key` is given, a second vote with the same
/// key on the same poll is rejected.
pub async fn record_vote(
    pool: &DbPool,
    poll_id: &str,
    position: i64,
    voter_key: Option<&str>,
    voted_at: DateTime<Utc>,
) -> Result<VoteWrite, DbError> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE poll_options SET votes = votes + 1 WHERE poll_id = ?1 AND position = ?2",
    )
    .bind(poll_id)
    .bind(position)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM polls WHERE id = ?1")
            .bind(poll_id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.rollback().await?;
        return Ok(if exists.is_some() {
            VoteWrite::UnknownOption
        } else {
            VoteWrite::UnknownPoll
        });
    }

    if let Some(voter_key) = voter_key {
        let inserted = sqlx::query(
            "INSERT INTO poll_voters (poll_id, voter_key, option_position, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(poll_id, voter_key) DO NOTHING",
        )
        .bind(poll_id)
        .bind(voter_key)
        .bind(position)
        .bind(voted_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(VoteWrite::DuplicateVoter);
        }
    }

    sqlx::query("UPDATE polls SET total_votes = total_votes + 1 WHERE id = ?1")
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(VoteWrite::Recorded)
}
