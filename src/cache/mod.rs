//! Client-side resource cache and the mutation protocol built on it.
//!
//! - [`ResourceCache`] maps a structured [`ResourceKey`] to the current known
//!   value, deduplicates fetches and revalidates in the background
//!   (stale-while-revalidate)
//! - [`MutationCoordinator`] runs add/remove/edit against a cached list and
//!   folds the server's answer back into it
//! - [`SnapshotStorage`] optionally persists values so a cold start can show
//!   the last known list while the first fetch is in flight

mod key;
mod mutation;
mod resource;
mod storage;
mod traits;

pub use key::ResourceKey;
pub use mutation::{
  Confirm, MutationCoordinator, MutationError, Notify, Validate, ValidationError, ViewGuard, ViewScope,
};
pub use resource::{CacheValue, ResourceCache, Subscription};
pub use storage::{NoopStorage, SnapshotStorage, SqliteStorage};
pub use traits::{CacheEntry, CacheSource, Identified};
