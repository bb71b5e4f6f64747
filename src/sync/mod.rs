//! Client-side optimistic update protocol for daily logging.

pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod mirror;
pub mod plan;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Coordinator, InFlight, Invalidation, Settlement};
pub use error::{RemoteError, SyncError};
pub use gateway::{HttpGateway, RemoteGateway};
pub use plan::{CheckIn, MutationKind, MutationPlan};
pub use store::AggregateStore;
