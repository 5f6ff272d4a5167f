pub mod config;
pub mod error;
pub mod features;
pub mod fetch;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod store;
