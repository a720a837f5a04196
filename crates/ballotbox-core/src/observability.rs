use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

const REASON_FALLBACK: &str = "other";
const MAX_REASON_LEN: usize = 32;
const MAX_REASON_KEYS: usize = 32;

static POLLS_CREATED: AtomicU64 = AtomicU64::new(0);
static VOTES_RECORDED: AtomicU64 = AtomicU64::new(0);
static VOTES_REJECTED: AtomicU64 = AtomicU64::new(0);
static SUGGESTIONS_DEGRADED: AtomicU64 = AtomicU64::new(0);
static REJECTIONS_BY_REASON: OnceLock<Mutex<HashMap<String, u64>>> = OnceLock::new();

fn rejections_by_reason() -> &'static Mutex<HashMap<String, u64>> {
    REJECTIONS_BY_REASON.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_rejections_by_reason() -> std::sync::MutexGuard<'static, HashMap<String, u64>> {
    match rejections_by_reason().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn normalize_reason(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_REASON_LEN {
        return REASON_FALLBACK.to_string();
    }
    if !trimmed
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
    {
        return REASON_FALLBACK.to_string();
    }
    trimmed.to_string()
}

pub fn poll_created() {
    POLLS_CREATED.fetch_add(1, Ordering::Relaxed);
}

pub fn vote_recorded() {
    VOTES_RECORDED.fetch_add(1, Ordering::Relaxed);
}

pub fn vote_rejected(reason: &str) {
    VOTES_REJECTED.fetch_add(1, Ordering::Relaxed);

    let mut normalized = normalize_reason(reason);
    let mut by_reason = lock_rejections_by_reason();
    if !by_reason.contains_key(&normalized) && by_reason.len() >= MAX_REASON_KEYS {
        normalized = REASON_FALLBACK.to_string();
    }
    let entry = by_reason.entry(normalized).or_insert(0);
    *entry = entry.saturating_add(1);
}

pub fn suggestion_degraded(reason: &str) {
    SUGGESTIONS_DEGRADED.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(reason, "suggestion degraded");
}

#[derive(Clone, Debug, Default)]
pub struct MetricsSnapshot {
    pub polls_created: u64,
    pub votes_recorded: u64,
    pub votes_rejected: u64,
    pub suggestions_degraded: u64,
    pub rejections_by_reason: Vec<(String, u64)>,
}

pub fn metrics_snapshot() -> MetricsSnapshot {
    let mut rejections_by_reason: Vec<(String, u64)> = lock_rejections_by_reason()
        .iter()
        .map(|(reason, count)| (reason.clone(), *count))
        .collect();
    rejections_by_reason.sort_by(|a, b| a.0.cmp(&b.0));

    MetricsSnapshot {
        polls_created: POLLS_CREATED.load(Ordering::Relaxed),
        votes_recorded: VOTES_RECORDED.load(Ordering::Relaxed),
        votes_rejected: VOTES_REJECTED.load(Ordering::Relaxed),
        suggestions_degraded: SUGGESTIONS_DEGRADED.load(Ordering::Relaxed),
        rejections_by_reason,
    }
}
