//! Cluster access for BYOH host records
//!
//! Typed access to the object store (host records, claims, machines and
//! scaling groups), the secret store and the event sink, behind traits so
//! the agent reconciler and the detach workflow can run against an
//! in-memory store in tests.
//!
//! # Example
//!
//! ```no_run
//! use cluster_client::{ClusterClientTrait, KubeClusterClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = KubeClusterClient::try_default().await?;
//! if let Some(host) = client.get_host("default", "host-1").await? {
//!     println!("attached: {}", host.machine_ref().is_some());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod events;
#[path = "trait.rs"]
pub mod cluster_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{FIELD_MANAGER, KubeClusterClient};
pub use cluster_trait::{ClusterClientTrait, SecretData};
pub use error::ClusterError;
pub use events::{EventKind, EventSink, KubeEventSink};
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockClusterClient, MockEventSink, RecordedEvent, StoredSecret};
