pub mod health;
pub mod polls;
pub mod suggestions;
pub mod votes;
