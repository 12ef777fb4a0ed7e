pub mod attachments;
pub mod auth;
pub mod boards;
pub mod comments;
pub mod health;
pub mod tasks;
