//! hostdeck - single-host administration dashboard
//!
//! Exposes service and package control, scanners, a restricted shell, log
//! viewing, web search, news feeds and host metrics over a small JSON HTTP
//! surface. Every command is built from allow-list validated input and runs
//! under a deadline.

pub mod cache;
pub mod collector;
pub mod commands;
pub mod config;
pub mod feeds;
pub mod markup;
pub mod search;
pub mod server;
pub mod service;
pub mod validation;

pub use config::Config;
pub use service::DashboardService;
