use crate::error::CoreError;
use crate::observability;
use crate::store::{PollDraft, Storage, StoreError};
use ballotbox_models::{NewPollOption, Poll, PollOption};
use chrono::Utc;

pub const MAX_QUESTION_LEN: usize = 300;
pub const MAX_OPTION_TEXT_LEN: usize = 200;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 20;

/// Id of the pre-seeded demo poll.
pub const DEMO_POLL_ID: &str = "demo";

/// Accepts absolute http(s) URLs only; returns the trimmed input.
fn parse_image_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let parsed = url::Url::parse(trimmed).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(trimmed.to_string())
}

/// Check a poll-creation request and collect every violated constraint.
///
/// Blank option text is a violation, and only non-blank options count toward
/// the two-option minimum, so a single blank option reports both.
pub fn validate_new_poll(question: &str, options: &[NewPollOption]) -> Result<PollDraft, CoreError> {
    let mut violations = Vec::new();

    let question = question.trim();
    if question.is_empty() {
        violations.push("Question cannot be empty.".to_string());
    } else if question.chars().count() > MAX_QUESTION_LEN {
        violations.push(format!(
            "Question must be at most {MAX_QUESTION_LEN} characters."
        ));
    }

    let mut accepted = Vec::with_capacity(options.len());
    for (index, option) in options.iter().enumerate() {
        let number = index + 1;
        let text = option.text.trim();
        if text.is_empty() {
            violations.push(format!("Option {number} cannot be empty."));
        } else if text.chars().count() > MAX_OPTION_TEXT_LEN {
            violations.push(format!(
                "Option {number} must be at most {MAX_OPTION_TEXT_LEN} characters."
            ));
        }

        let image_url = match option.image_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match parse_image_url(raw) {
                Some(url) => Some(url),
                None => {
                    violations.push(format!("Option {number} image must be a valid URL."));
                    None
                }
            },
        };

        if !text.is_empty() {
            accepted.push(NewPollOption {
                text: text.to_string(),
                image_url,
            });
        }
    }

    if accepted.len() < MIN_OPTIONS {
        violations.push("Must have at least two options.".to_string());
    }
    if options.len() > MAX_OPTIONS {
        violations.push(format!("A poll can have at most {MAX_OPTIONS} options."));
    }

    if violations.is_empty() {
        Ok(PollDraft {
            question: question.to_string(),
            options: accepted,
        })
    } else {
        Err(CoreError::Validation(violations))
    }
}

/// Validate and store a new poll.
pub async fn create_poll(
    store: &Storage,
    question: &str,
    options: &[NewPollOption],
) -> Result<Poll, CoreError> {
    let draft = validate_new_poll(question, options)?;
    let poll = store.create_poll(draft).await?;

    observability::poll_created();
    tracing::info!(
        poll_id = %poll.id,
        options = poll.options.len(),
        "poll created"
    );
    Ok(poll)
}

pub fn demo_poll() -> Poll {
    let option = |text: &str, votes: u64, seed: &str| PollOption {
        text: text.to_string(),
        votes,
        image_url: Some(format!("https://picsum.photos/seed/{seed}/200/200")),
    };
    let options = vec![
        option("TypeScript", 25, "p1"),
        option("Python", 30, "p2"),
        option("Rust", 15, "p3"),
        option("Go", 10, "p4"),
    ];
    let total_votes = options.iter().map(|o| o.votes).sum();

    Poll {
        id: DEMO_POLL_ID.to_string(),
        question: "What is the best programming language?".to_string(),
        options,
        total_votes,
        created_at: Utc::now(),
    }
}

/// Insert the demo poll unless it already exists. Returns whether it was added.
pub async fn seed_demo_poll(store: &Storage) -> Result<bool, CoreError> {
    if store.get_poll(DEMO_POLL_ID).await?.is_some() {
        return Ok(false);
    }
    match store.import_poll(demo_poll()).await {
        Ok(()) => Ok(true),
        Err(StoreError::Conflict(_)) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(texts: &[&str]) -> Vec<NewPollOption> {
        texts.iter().map(|&t| NewPollOption::new(t)).collect()
    }

    fn violations(result: Result<PollDraft, CoreError>) -> Vec<String> {
        match result {
            Err(CoreError::Validation(v)) => v,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_trimmed_question_and_options() {
        let draft = validate_new_poll("  Best topping? ", &options(&[" Cheese", "Pepperoni "]))
            .unwrap();
        assert_eq!(draft.question(), "Best topping?");
        assert_eq!(draft.options()[0].text, "Cheese");
        assert_eq!(draft.options()[1].text, "Pepperoni");
    }

    #[test]
    fn single_blank_option_reports_both_violations() {
        let v = violations(validate_new_poll("Q", &options(&[""])));
        assert_eq!(
            v,
            vec![
                "Option 1 cannot be empty.".to_string(),
                "Must have at least two options.".to_string(),
            ]
        );
    }

    #[test]
    fn empty_question_is_reported_with_other_violations() {
        let v = violations(validate_new_poll("   ", &options(&["A"])));
        assert!(v.contains(&"Question cannot be empty.".to_string()));
        assert!(v.contains(&"Must have at least two options.".to_string()));
    }

    #[test]
    fn malformed_image_urls_are_rejected() {
        let opts = vec![
            NewPollOption::with_image("A", "not a url"),
            NewPollOption::with_image("B", "ftp://example.com/b.png"),
            NewPollOption::with_image("C", "https://example.com/c.png"),
        ];
        let v = violations(validate_new_poll("Q", &opts));
        assert_eq!(
            v,
            vec![
                "Option 1 image must be a valid URL.".to_string(),
                "Option 2 image must be a valid URL.".to_string(),
            ]
        );
    }

    #[test]
    fn empty_image_url_means_no_image() {
        let opts = vec![
            NewPollOption::with_image("A", ""),
            NewPollOption::with_image("B", " https://example.com/b.png "),
        ];
        let draft = validate_new_poll("Q", &opts).unwrap();
        assert_eq!(draft.options()[0].image_url, None);
        assert_eq!(
            draft.options()[1].image_url.as_deref(),
            Some("https://example.com/b.png")
        );
    }

    #[test]
    fn length_limits_are_enforced() {
        let long_question = "q".repeat(MAX_QUESTION_LEN + 1);
        let long_option = "o".repeat(MAX_OPTION_TEXT_LEN + 1);
        let v = violations(validate_new_poll(
            &long_question,
            &options(&[&long_option, "B"]),
        ));
        assert_eq!(v.len(), 2);

        let many: Vec<String> = (0..=MAX_OPTIONS).map(|i| i.to_string()).collect();
        let many: Vec<&str> = many.iter().map(String::as_str).collect();
        let v = violations(validate_new_poll("Q", &options(&many)));
        assert_eq!(v, vec![format!("A poll can have at most {MAX_OPTIONS} options.")]);
    }

    #[tokio::test]
    async fn create_poll_starts_with_zero_votes() {
        let store = Storage::memory();
        let poll = create_poll(&store, "Best topping?", &options(&["Cheese", "Pepperoni"]))
            .await
            .unwrap();

        assert_eq!(poll.total_votes, 0);
        assert_eq!(poll.options.len(), 2);
        assert!(poll.options.iter().all(|o| o.votes == 0));
        assert!(store.get_poll(&poll.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_poll_is_not_stored() {
        let store = Storage::memory();
        let err = create_poll(&store, "", &options(&["A", "B"])).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(store.list_polls(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn demo_poll_is_seeded_once() {
        let store = Storage::memory();
        assert!(seed_demo_poll(&store).await.unwrap());
        assert!(!seed_demo_poll(&store).await.unwrap());

        let demo = store.get_poll(DEMO_POLL_ID).await.unwrap().unwrap();
        assert_eq!(demo.total_votes, 80);
        assert_eq!(demo.tallied_votes(), demo.total_votes);
    }
}
