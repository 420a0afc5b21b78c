//! Uptime monitoring engine: scheduled probes, uptime accounting and alerting.

pub mod config;
pub mod database;
pub mod monitoring;
pub mod notification;
pub mod pool;
pub mod retention;
pub mod validation;
