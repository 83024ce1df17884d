pub mod error;
pub mod migration;
pub mod models;
pub mod repositories;
pub mod store;

pub use error::{Result, StoreError};
pub use models::{
    ConfigEntry, Conversation, ConversationPatch, Feedback, FeedbackSubmission, Message,
    NewConversation, NewMessage, NewUser, User, UserPatch,
};
pub use repositories::{
    ConfigRepository, ConversationFilter, ConversationRepository, FeedbackRepository,
    MessageRepository, UserRepository,
};
pub use store::Store;
