//! Deal-evaluation pipeline for marketplace CPU listings: classify titles
//! into normalized product identities, resolve fair-market values through
//! tiered cache-backed sources, and tier the resulting net profit, with
//! bounded-concurrency collect-all and streaming delivery modes.

pub mod classifier;
pub mod ebay;
pub mod evaluator;
pub mod http;
pub mod models;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod sources;
pub mod token;
