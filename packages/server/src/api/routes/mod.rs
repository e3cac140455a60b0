pub mod config_io;
pub mod configs;
pub mod connections;
pub mod health;
pub mod jobs;
pub mod status;
