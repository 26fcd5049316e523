//! Activity logging: JSONL records written by a dedicated logger thread.

pub mod activity;
pub mod jsonl;
