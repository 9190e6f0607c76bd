pub mod bootstrap;
pub mod commands;
pub mod ticker;
pub mod timer_service;
