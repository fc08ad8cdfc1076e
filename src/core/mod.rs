pub mod config;
pub mod feed;
pub mod filter;
pub mod pipeline;
pub mod report;
pub mod stats;
