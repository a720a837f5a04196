use ballotbox_models::{OptionResult, Poll, PollResults};
use serde::{Deserialize, Serialize};

/// How a leader is picked when options share the top count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerPolicy {
    /// A tie for first place means there is no winner.
    #[default]
    Strict,
    /// The earliest option with the top count wins.
    FirstMaximal,
}

/// Share of `total` held by `votes`, as a whole percent rounded half up.
pub fn percentage(votes: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    let scaled = (u128::from(votes) * 100 + u128::from(total) / 2) / u128::from(total);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

pub fn winning_index(poll: &Poll, policy: WinnerPolicy) -> Option<usize> {
    let top = poll.options.iter().map(|o| o.votes).max()?;
    if top == 0 {
        return None;
    }

    let mut leaders = poll
        .options
        .iter()
        .enumerate()
        .filter(|(_, o)| o.votes == top)
        .map(|(i, _)| i);
    let first = leaders.next()?;
    match policy {
        WinnerPolicy::FirstMaximal => Some(first),
        WinnerPolicy::Strict if leaders.next().is_none() => Some(first),
        WinnerPolicy::Strict => None,
    }
}

/// Build the display view of a poll's tallies.
pub fn project(poll: &Poll, policy: WinnerPolicy) -> PollResults {
    let options = poll
        .options
        .iter()
        .map(|o| OptionResult {
            text: o.text.clone(),
            image_url: o.image_url.clone(),
            votes: o.votes,
            percentage: percentage(o.votes, poll.total_votes),
        })
        .collect();

    PollResults {
        poll_id: poll.id.clone(),
        question: poll.question.clone(),
        total_votes: poll.total_votes,
        options,
        winning_index: winning_index(poll, policy),
    }
}
