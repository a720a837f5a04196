pub mod poll;
pub mod results;
pub mod suggestion;

pub use poll::{NewPollOption, Poll, PollOption};
pub use results::{OptionResult, PollResults};
pub use suggestion::Suggestion;
