pub mod ai;
pub mod conversations;
pub mod health;
pub mod learning;
pub mod users;
