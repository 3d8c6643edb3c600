//! Protocol Buffer definitions for vakeel-way.
//!
//! This crate contains the gRPC service definition and message types for
//! communication between heartbeat agents and the aggregator server.
//!
//! ## Services
//!
//! - **StateService**: the single ingress API
//!   - `Update`: long-lived stream of heartbeat batches; each batch is
//!     acknowledged with an empty response message
//!
//! ## Wire format
//!
//! Service identifiers travel as two `uint64` halves rather than 16 raw
//! bytes. The halves map onto [`uuid::Uuid`] with
//! [`Uuid::from_u64_pair`](uuid::Uuid::from_u64_pair), so
//! `11111111-1111-1111-1111-111111111111` is
//! `high = 0x1111111111111111, low = 0x1111111111111111`.
//!
//! ## Usage
//!
//! ```ignore
//! use vakeel_proto::way::{state_service_client::StateServiceClient, UpdateRequest};
//!
//! let mut client = StateServiceClient::connect("http://localhost:4643").await?;
//! let heartbeats = tokio_stream::iter(vec![UpdateRequest {
//!     ids: vec![service_id.into()],
//! }]);
//! let mut acks = client.update(heartbeats).await?.into_inner();
//! ```

/// Generated types for the `vakeel.way` package.
pub mod way {
    tonic::include_proto!("vakeel.way");
}

/// File descriptor set for gRPC server reflection.
pub const FILE_DESCRIPTOR_SET: &[u8] = include_bytes!("../proto/vakeel_way_descriptor.bin");

impl way::Uuid {
    /// Reassembles the two wire halves into a [`uuid::Uuid`].
    pub fn to_uuid(&self) -> uuid::Uuid {
        uuid::Uuid::from_u64_pair(self.high, self.low)
    }
}

impl From<uuid::Uuid> for way::Uuid {
    fn from(id: uuid::Uuid) -> Self {
        let (high, low) = id.as_u64_pair();
        Self { high, low }
    }
}

impl From<way::Uuid> for uuid::Uuid {
    fn from(id: way::Uuid) -> Self {
        id.to_uuid()
    }
}
