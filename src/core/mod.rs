//! Core refresh machinery: snapshots, the snapshot cache and the periodic refresher.

mod bound;
mod builder;
mod cache;
pub(crate) mod refresher;
mod snapshot;

pub use bound::BoundConfig;
pub use builder::{DEFAULT_STARTUP_TIMEOUT, PeriodicLayerBuilder, RefreshOptions, StartupPolicy};
pub use cache::SnapshotCache;
pub use refresher::{
    DEFAULT_REFRESH_PERIOD, FailureObserver, PeriodicRefresher, RefreshHandle, RefreshState,
    RefreshStatus,
};
pub use snapshot::Snapshot;
