//! Card-transaction audit core: jurisdiction inference, feature
//! preparation, a dual-population anomaly ensemble and score fusion
//! into a ranked priority table.

pub mod clean;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod event;
pub mod features;
pub mod fusion;
pub mod iforest;
pub mod jurisdiction;
pub mod lof;
pub mod model;
pub mod pipeline;
pub mod priority;
pub mod record;
pub mod rng;
pub mod stats;
pub mod store;
pub mod types;
