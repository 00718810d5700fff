//! forge-exporter - A Prometheus exporter for code-forge repositories.
//!
//! This library continuously mirrors a set of remote repositories (pull
//! requests, issues, milestones, labels, repository metadata) into an
//! in-memory cache and exposes that cache as textual time-series on an
//! HTTP endpoint for a pull-based monitoring scraper.

#[cfg(test)]
pub mod test_utils;

pub mod cache;
pub mod client;
pub mod config;
pub mod drivers;
pub mod exporter;
pub mod fetcher;
pub mod metrics;
pub mod server;
pub mod types;
