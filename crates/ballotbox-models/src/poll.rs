use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<PollOption>,
    pub total_votes: u64,
    pub created_at: DateTime<Utc>,
}

impl Poll {
    /// Sum of the per-option counters. Always equal to `total_votes` for a
    /// poll that only ever changed through the store.
    pub fn tallied_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    pub votes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Option as submitted by a poll creator, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPollOption {
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewPollOption {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: None,
        }
    }

    pub fn with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: Some(image_url.into()),
        }
    }

    /// An untouched form row: no text and no image.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
            && self
                .image_url
                .as_deref()
                .map(|url| url.trim().is_empty())
                .unwrap_or(true)
    }
}
