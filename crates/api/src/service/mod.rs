pub mod mutation;
pub mod query;
