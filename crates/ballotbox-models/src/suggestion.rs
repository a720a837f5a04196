use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub question: String,
    pub should_suggest: bool,
}

impl Suggestion {
    pub fn none() -> Self {
        Self::default()
    }
}
