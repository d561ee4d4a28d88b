//! Usage accounting services

mod service;

pub use service::{LogUsageRequest, UsageService};

pub(crate) use service::limit_check_for;
