pub mod reconciler;
#[cfg(test)]
mod tests;

pub use reconciler::{BatchOutcome, Reconciler, SyncError, SyncOutcome};
