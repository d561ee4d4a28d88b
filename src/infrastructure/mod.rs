//! Infrastructure implementations over the domain traits

pub mod key;
pub mod logging;
pub mod notifier;
pub mod provider;
pub mod reconciler;
pub mod store;
pub mod usage;
