//! Usage reconciliation passes and their scheduler

mod scheduler;
mod service;

pub use scheduler::ReconcilerScheduler;
pub use service::UsageReconciler;
