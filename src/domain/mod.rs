pub mod day_boundary;
pub mod history_stats;
pub mod interval_machine;
pub mod models;
pub mod retention;
