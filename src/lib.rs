//! Progressive allowlist tiers from token and NFT holder snapshots.
//!
//! [allocator] holds the pure tiering logic; [data] and [pipeline] are the
//! file adapters around it.

pub mod allocator;
pub mod cli;
pub mod data;
pub mod parallel;
pub mod pipeline;
