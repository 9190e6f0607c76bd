pub mod clock;
pub mod config;
pub mod error;
pub mod history_store;
pub mod storage;
