pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod text;
pub mod trade;
