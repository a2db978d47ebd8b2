pub mod banner;
pub mod cache;
pub mod config;
pub mod consts;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod events;
pub mod format;
pub mod health;
pub mod imports;
pub mod installer;
pub mod logging;
pub mod runner;
