pub mod auto_extend;
pub mod commands;
pub mod command_handlers;
pub mod config;
pub mod handle;
pub mod logs;
pub mod persistence;
