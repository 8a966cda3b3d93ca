//! Asset-service REST operations for assetlink.
//!
//! This crate implements the [`AssetApi`](assetlink_common::AssetApi)
//! collaborator against the real asset service:
//! - [`RestClient`]: the five HTTP operations over `reqwest`
//! - [`object_type`]: image/document object-type selection

pub mod client;
pub mod object_type;

pub use client::RestClient;
pub use object_type::ApiOperation;
