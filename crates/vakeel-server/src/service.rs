//! Heartbeat ingress: the StateService gRPC implementation.
//!
//! Each connected agent holds one Update stream open. Every request
//! message is a batch of service ids; the handler reassembles each id
//! from its wire halves, pushes it onto the bounded ingress channel and
//! answers the batch with an empty acknowledgement.
//!
//! The channel send is deliberately blocking. When the drainer falls
//! behind and the channel fills, the receive loop stalls, which stalls
//! the peer's stream. Load is shed upstream instead of growing queues or
//! spawning workers per request.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, warn};
use uuid::Uuid;
use vakeel_core::Status as ServiceStatus;
use vakeel_engine::StateEngine;
use vakeel_proto::way::state_service_server::StateService;
use vakeel_proto::way::{UpdateRequest, UpdateResponse};

/// Default capacity of the ingress channel.
pub const DEFAULT_INGRESS_BUFFER: usize = 64;

/// StateService implementation: fans inbound heartbeats into the ingress
/// channel consumed by the drainer.
pub struct StateServiceImpl {
    events: mpsc::Sender<Uuid>,
    shutdown: watch::Receiver<bool>,
}

impl StateServiceImpl {
    pub fn new(events: mpsc::Sender<Uuid>, shutdown: watch::Receiver<bool>) -> Self {
        Self { events, shutdown }
    }
}

#[tonic::async_trait]
impl StateService for StateServiceImpl {
    type UpdateStream = ReceiverStream<Result<UpdateResponse, Status>>;

    async fn update(
        &self,
        request: Request<Streaming<UpdateRequest>>,
    ) -> Result<Response<Self::UpdateStream>, Status> {
        let peer = request.remote_addr();
        let mut inbound = request.into_inner();
        let events = self.events.clone();
        let mut shutdown = self.shutdown.clone();
        let (acks, ack_stream) = mpsc::channel(16);

        tokio::spawn(async move {
            debug!(peer = ?peer, "heartbeat stream opened");
            loop {
                let message = tokio::select! {
                    _ = shutdown.changed() => break,
                    message = inbound.message() => message,
                };

                match message {
                    Ok(Some(request)) => {
                        for id in request.ids {
                            // Blocks when the drainer is behind; this is
                            // the backpressure path.
                            if events.send(id.to_uuid()).await.is_err() {
                                let _ = acks
                                    .send(Err(Status::unavailable("server shutting down")))
                                    .await;
                                return;
                            }
                        }
                        if acks.send(Ok(UpdateResponse {})).await.is_err() {
                            // Peer stopped reading acknowledgements.
                            break;
                        }
                    }
                    // Client closed its half of the stream.
                    Ok(None) => break,
                    Err(status) => {
                        debug!(peer = ?peer, error = %status, "heartbeat stream failed");
                        break;
                    }
                }
            }
            debug!(peer = ?peer, "heartbeat stream closed");
        });

        Ok(Response::new(ReceiverStream::new(ack_stream)))
    }
}

/// Consumes the ingress channel and applies each heartbeat to the engine.
///
/// Exactly one drainer runs per process. Engine errors (unknown id,
/// failed delivery) are logged and do not stop the loop; the stream that
/// produced the heartbeat is never affected.
pub async fn run_drainer(
    mut events: mpsc::Receiver<Uuid>,
    engine: Arc<StateEngine>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Some(id) => {
                    if let Err(err) = engine.send(id, ServiceStatus::Up).await {
                        warn!(id = %id, error = %err, "failed to apply heartbeat");
                    }
                }
                None => break,
            },
        }
    }
    // Reject any send still queued behind the shutdown edge.
    events.close();
    debug!("ingress drainer stopped");
}
