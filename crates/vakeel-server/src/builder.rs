//! Application assembly.
//!
//! [`AppBuilder`] turns a [`Config`] into a bound, ready-to-serve
//! [`App`]: directory and notifier feed the state engine, the engine
//! feeds the ingress service, and every background task is tied to one
//! shutdown channel.
//!
//! Construction and serving are split so callers can learn the bound
//! address (and drive shutdown themselves) before traffic flows, which is
//! also what the end-to-end tests rely on.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tracing::{error, info};
use vakeel_engine::{EngineConfig, StateEngine, StaticDirectory, WebhookClient};
use vakeel_proto::way::state_service_server::StateServiceServer;

use crate::config::{Config, ConfigError};
use crate::error::{Error, Result};
use crate::service::{run_drainer, StateServiceImpl, DEFAULT_INGRESS_BUFFER};

/// Composes the application from configuration.
pub struct AppBuilder {
    config: Config,
    engine_config: EngineConfig,
    ingress_buffer: usize,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            engine_config: EngineConfig::default(),
            ingress_buffer: DEFAULT_INGRESS_BUFFER,
        }
    }

    /// Overrides the engine tunables (TTLs, retry ceiling, sweep
    /// interval). Test harnesses shrink these to drive expiry quickly.
    pub fn engine_config(mut self, engine_config: EngineConfig) -> Self {
        self.engine_config = engine_config;
        self
    }

    /// Overrides the ingress channel capacity. The bound is the
    /// backpressure knob; it must stay finite.
    pub fn ingress_buffer(mut self, capacity: usize) -> Self {
        self.ingress_buffer = capacity;
        self
    }

    /// Wires the components and binds the listener.
    pub async fn build(self) -> Result<App> {
        if self.config.grpc.network != "tcp" {
            return Err(ConfigError::UnsupportedNetwork(self.config.grpc.network.clone()).into());
        }

        let directory = Arc::new(StaticDirectory::new(self.config.webhook_map()));
        let notifier = Arc::new(WebhookClient::new());
        let engine = Arc::new(StateEngine::new(notifier, directory, self.engine_config));

        let addr = self.config.grpc.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| Error::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| Error::Bind { addr, source })?;

        Ok(App {
            engine,
            listener,
            local_addr,
            ingress_buffer: self.ingress_buffer,
        })
    }
}

/// A fully wired application holding its bound listener.
pub struct App {
    engine: Arc<StateEngine>,
    listener: TcpListener,
    local_addr: SocketAddr,
    ingress_buffer: usize,
}

impl App {
    /// The address the listener is bound to. With port 0 in the
    /// configuration this reveals the ephemeral port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until SIGINT or SIGTERM, then shuts down gracefully.
    pub async fn serve(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(flip_on_signal(shutdown_tx));
        self.serve_with_shutdown(shutdown_rx).await
    }

    /// Serves until the shutdown channel fires.
    ///
    /// On a clean stop the accept loop finishes first, then the drainer,
    /// expiry worker and sweeper are waited on; the process owns no
    /// running task when this returns.
    pub async fn serve_with_shutdown(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let (events_tx, events_rx) = mpsc::channel(self.ingress_buffer);

        let mut handles = self.engine.start(shutdown.clone());
        handles.push(tokio::spawn(run_drainer(
            events_rx,
            Arc::clone(&self.engine),
            shutdown.clone(),
        )));

        let reflection = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(vakeel_proto::FILE_DESCRIPTOR_SET)
            .build()?;

        let service = StateServiceImpl::new(events_tx, shutdown.clone());

        info!(addr = %self.local_addr, "Starting gRPC server");

        let mut stop = shutdown.clone();
        let served = Server::builder()
            .add_service(StateServiceServer::new(service))
            .add_service(reflection)
            .serve_with_incoming_shutdown(TcpListenerStream::new(self.listener), async move {
                let _ = stop.changed().await;
            })
            .await;

        match served {
            Ok(()) => {
                for handle in handles {
                    let _ = handle.await;
                }
                info!("server stopped");
                Ok(())
            }
            Err(err) => {
                for handle in handles {
                    handle.abort();
                }
                Err(err.into())
            }
        }
    }
}

/// Flips the shutdown channel once the process receives SIGINT or, on
/// Unix, SIGTERM. The channel is the only shutdown representation; every
/// consumer already holds a receiver.
async fn flip_on_signal(shutdown: watch::Sender<bool>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    error!(error = %err, "failed to listen for Ctrl+C");
                    return;
                }
                info!("received SIGINT, shutting down");
            }
            _ = terminate.recv() => info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            return;
        }
        info!("received SIGINT, shutting down");
    }

    let _ = shutdown.send(true);
}
