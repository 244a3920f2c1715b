//! Delivery of session and trial records to the remote store, with a durable
//! local queue for whatever cannot be delivered.

pub mod error;
pub mod gateway;
pub mod memory;
pub mod queue;
pub mod transport;

pub use error::{StoreError, TransportError};
pub use gateway::{Delivery, GatewayStats, PersistenceGateway, ReplayReport, RetryPolicy};
pub use memory::{Health, MemoryTransport, SessionStatus, StoredSession};
pub use queue::{LocalQueue, PendingRecord};
pub use transport::{SessionRequest, Transport};
