pub mod conversation;
pub mod registration;
