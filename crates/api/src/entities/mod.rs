pub mod chat;
pub mod contributor;
pub mod idea;
pub mod milestone;
pub mod payment;
pub mod stake;
pub mod task;
pub mod timeline;
pub mod user;
pub mod verification;
