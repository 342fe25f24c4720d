pub mod ordering;
pub mod permissions;
pub mod reconcile;
pub mod snapshot;
