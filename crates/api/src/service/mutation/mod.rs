pub mod chat;
pub mod contributors;
pub mod ideas;
pub mod milestones;
pub mod payments;
pub mod tasks;
pub mod timelines;
pub mod users;
pub mod verifications;
