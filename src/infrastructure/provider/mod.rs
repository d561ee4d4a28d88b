//! Key provider client implementations

mod http;

pub use http::HttpProviderClient;
