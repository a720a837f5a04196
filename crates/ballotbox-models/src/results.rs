use serde::{Deserialize, Serialize};

/// Display projection of a poll's tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResults {
    pub poll_id: String,
    pub question: String,
    pub total_votes: u64,
    pub options: Vec<OptionResult>,
    pub winning_index: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionResult {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub votes: u64,
    /// Whole-number share of `total_votes`, 0..=100.
    pub percentage: u32,
}
