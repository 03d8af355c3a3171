pub mod clean_typing;
