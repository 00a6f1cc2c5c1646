pub mod collect;
pub mod collections;
pub mod config;
pub mod delegate;
pub mod output;
pub mod snapshot;
