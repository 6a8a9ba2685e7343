//! lagscale-scaler — scaler adapters built on `lagscale-core`.
//!
//! Each adapter fetches raw partition state from an injected collaborator,
//! feeds it through the core arithmetic, and reports one external metric
//! plus an activation flag.
//!
//! # Architecture
//!
//! ```text
//! Poller (interval loop, shutdown via watch channel)
//!   └── Box<dyn Scaler>
//!         ├── ConsumerGroupScaler
//!         │     ├── OffsetSource        (current/stored offsets, login/logout)
//!         │     ├── SessionCache        (shared, TTL-bounded)
//!         │     └── PersistentLagTracker (previous stored offset per partition)
//!         └── SequenceScaler
//!               ├── PartitionInfoSource (last enqueued / beginning sequence)
//!               └── CheckpointStore     (committed sequence per partition)
//! ```
//!
//! [`snapshot::SnapshotSource`] implements every collaborator on top of a
//! JSON file for local evaluation.

pub mod consumer_group;
pub mod error;
pub mod offsets;
pub mod poller;
pub mod scaler;
pub mod sequence;
pub mod session;
pub mod snapshot;

pub use consumer_group::{ConsumerGroupScaler, OffsetSource};
pub use error::{ScalerError, ScalerResult};
pub use offsets::{OffsetProgress, PersistentLagTracker};
pub use poller::{PollCallback, PollOutcome, Poller};
pub use scaler::{MetricsAndActivity, Scaler, ScalerFuture};
pub use sequence::{CheckpointStore, PartitionInfoSource, PartitionSequence, SequenceScaler};
pub use session::{SessionCache, SessionCacheConfig, SessionToken, TtlSessionCache};
pub use snapshot::{Snapshot, SnapshotSource};
