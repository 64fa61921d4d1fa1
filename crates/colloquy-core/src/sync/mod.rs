pub mod reconciler;
pub mod scheduler;

pub use reconciler::{ReconcileReport, Reconciler};
pub use scheduler::ReconciliationScheduler;
