pub mod client;
pub mod command;
pub mod config;
pub mod controller;
pub mod document;
pub mod render;
pub mod session;
pub mod state;
pub mod types;
