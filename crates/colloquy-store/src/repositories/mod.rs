mod config;
mod conversations;
mod feedback;
mod messages;
mod users;

pub use config::ConfigRepository;
pub use conversations::{ConversationFilter, ConversationRepository};
pub use feedback::FeedbackRepository;
pub use messages::MessageRepository;
pub use users::UserRepository;

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
