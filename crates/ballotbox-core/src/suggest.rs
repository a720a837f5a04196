use crate::observability;
use crate::poll::MAX_QUESTION_LEN;
use ballotbox_models::Suggestion;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Topics shorter than this (after trimming) are never sent out.
pub const MIN_TOPIC_LEN: usize = 5;
const MAX_TOPIC_LEN: usize = 500;

const SYSTEM_PROMPT: &str = "You help people write poll questions. \
Given a topic, propose one clear, concise poll question suitable for a general audience. \
Also decide whether proposing it would help the poll author: set shouldSuggest to true \
when the topic is vague or broad, and to false when the topic is already specific enough \
that the author most likely has a question in mind. \
Reply with a JSON object of the form {\"question\": string, \"shouldSuggest\": boolean}.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggesterConfig {
    pub enabled: bool,
    /// OpenAI-compatible chat-completions URL.
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub per_minute: u32,
}

impl Default for SuggesterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_ms: 8_000,
            per_minute: 30,
        }
    }
}

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("suggestion service returned status {0}")]
    Status(u16),
    #[error("suggestion service timed out")]
    Timeout,
    #[error("suggestion rate limit reached")]
    RateLimited,
    #[error("unreadable suggestion: {0}")]
    Parse(String),
}

impl SuggestError {
    fn reason(&self) -> &'static str {
        match self {
            SuggestError::Http(_) => "http",
            SuggestError::Status(_) => "status",
            SuggestError::Timeout => "timeout",
            SuggestError::RateLimited => "rate_limited",
            SuggestError::Parse(_) => "parse",
        }
    }
}

#[derive(Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    question: String,
    #[serde(default, alias = "shouldSuggest")]
    should_suggest: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    // Drop an info string such as `json` on the opening fence line.
    match inner.split_once('\n') {
        Some((first, rest)) if !first.trim_start().starts_with('{') => rest.trim(),
        _ => inner.trim(),
    }
}

/// Read a model reply into a [`Suggestion`].
///
/// A blank question is never suggested, and long questions are cut to the
/// poll question limit.
pub fn parse_suggestion(content: &str) -> Result<Suggestion, SuggestError> {
    let raw: RawSuggestion = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| SuggestError::Parse(e.to_string()))?;

    let question: String = raw.question.trim().chars().take(MAX_QUESTION_LEN).collect();
    let question = question.trim_end().to_string();
    let should_suggest = raw.should_suggest && !question.is_empty();
    Ok(Suggestion {
        question,
        should_suggest,
    })
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct RemoteSuggester {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
    limiter: Arc<DirectLimiter>,
}

impl RemoteSuggester {
    pub fn new(config: &SuggesterConfig) -> Result<Self, SuggestError> {
        let timeout = Duration::from_millis(config.timeout_ms.max(1));
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ballotbox/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let per_minute = NonZeroU32::new(config.per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            timeout,
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    pub async fn try_suggest(&self, topic: &str) -> Result<Suggestion, SuggestError> {
        if self.limiter.check().is_err() {
            return Err(SuggestError::RateLimited);
        }
        match tokio::time::timeout(self.timeout, self.request(topic)).await {
            Ok(result) => result,
            Err(_) => Err(SuggestError::Timeout),
        }
    }

    async fn request(&self, topic: &str) -> Result<Suggestion, SuggestError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Topic: {topic}") },
            ],
            "response_format": { "type": "json_object" },
        });

        let mut req = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                SuggestError::Timeout
            } else {
                SuggestError::Http(e)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SuggestError::Status(status.as_u16()));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| SuggestError::Parse(e.to_string()))?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SuggestError::Parse("response has no message content".into()))?;
        parse_suggestion(&content)
    }
}

/// Optional question-suggestion collaborator.
///
/// Shares no state with the poll store; a slow or failing service only ever
/// costs the caller a `should_suggest = false` answer.
#[derive(Clone)]
pub enum QuestionSuggester {
    Disabled,
    Remote(RemoteSuggester),
}

impl QuestionSuggester {
    pub fn from_config(config: &SuggesterConfig) -> Result<Self, SuggestError> {
        if !config.enabled {
            return Ok(QuestionSuggester::Disabled);
        }
        Ok(QuestionSuggester::Remote(RemoteSuggester::new(config)?))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, QuestionSuggester::Remote(_))
    }

    pub async fn suggest(&self, topic: &str) -> Suggestion {
        let topic = topic.trim();
        if topic.chars().count() < MIN_TOPIC_LEN {
            return Suggestion::none();
        }

        match self {
            QuestionSuggester::Disabled => Suggestion::none(),
            QuestionSuggester::Remote(remote) => {
                let topic: String = topic.chars().take(MAX_TOPIC_LEN).collect();
                match remote.try_suggest(&topic).await {
                    Ok(suggestion) => suggestion,
                    Err(e) => {
                        observability::suggestion_degraded(e.reason());
                        tracing::warn!(error = %e, "question suggestion unavailable");
                        Suggestion::none()
                    }
                }
            }
        }
    }
}
