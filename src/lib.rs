pub mod alarm;
pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod platform;
pub mod settings;
