//! Aquaview serves a NASA MODIS AQUA imagery table over HTTP: summaries,
//! previews and statistics of the table, CSV export, and animated GIF
//! rendering of granule sequences selected by year and month.

pub mod animation;
pub mod app;
pub mod app_state;
pub mod cli;
pub mod dataset;
pub mod error;
pub mod inspector;
pub mod metrics;
pub mod models;
pub mod server;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod validated_json;
