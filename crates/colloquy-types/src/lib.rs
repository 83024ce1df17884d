pub mod chat;
pub mod envelope;
pub mod metadata;

pub use chat::{ChatTurn, Role};
pub use envelope::{estimate_tokens, Envelope, GenerationOptions, ReplyStatus};
pub use metadata::{decode_metadata, encode_metadata, Metadata};
