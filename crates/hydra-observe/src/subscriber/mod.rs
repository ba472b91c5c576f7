mod journal;
mod view;

pub use journal::Journal;
pub use view::{level_for, log_event, message_for};
