//! Daemon facade and message I/O pipeline
//!
//! [`Daemon`] owns the transports and wires the engine together. Four
//! tasks run while started:
//!
//! - **receiver**: reads the local channel and forwards frames to control;
//!   it re-arms unconditionally, so a malformed frame never stops reads.
//! - **network**: reads the network endpoint and drains the remote send
//!   queue; independent of local delivery, so a stalled peer cannot block
//!   local clients.
//! - **sender**: drains one FIFO queue of `(client, bytes)` jobs onto the
//!   local channel; total order preserves per-destination order.
//! - **control**: the single owner of [`RoutingCore`]; every table
//!   mutation happens here.
//!
//! The watchdog timer task feeds control as a fifth, optional input
//! source.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use soipc_core::{ClientId, EventId, EventgroupId, InstanceId, ServiceId};
use soipc_transport::{
    create_local_channel, create_network, LocalChannel, NetworkEndpoint, TransportError,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::DaemonConfig;
use crate::dispatch::{ControlInput, Delivery, RoutingCore};
use crate::error::DaemonError;
use crate::watchdog::spawn_watchdog;

const CONTROL_QUEUE_DEPTH: usize = 256;

/// The routing daemon: transports, engine, and lifecycle
pub struct Daemon {
    config: DaemonConfig,
    local: Arc<dyn LocalChannel>,
    network: Arc<dyn NetworkEndpoint>,
    running: Option<Running>,
}

struct Running {
    control_tx: mpsc::Sender<ControlInput>,
    control: JoinHandle<()>,
    receiver: JoinHandle<()>,
    network: JoinHandle<()>,
    sender: JoinHandle<()>,
    watchdog: Option<JoinHandle<()>>,
}

impl Daemon {
    /// Bind the local channel and network endpoint per configuration.
    /// Failure to bind either is fatal: the daemon cannot operate without
    /// its control channel.
    pub async fn init(config: DaemonConfig) -> Result<Self, DaemonError> {
        let local =
            create_local_channel(&config.daemon.local, &config.daemon.channel_prefix).await?;
        let network = create_network(&config.daemon.network).await?;
        Ok(Self::init_with_transports(config, local, network))
    }

    /// Construct with externally provided transports (testing seam)
    pub fn init_with_transports(
        config: DaemonConfig,
        local: Arc<dyn LocalChannel>,
        network: Arc<dyn NetworkEndpoint>,
    ) -> Self {
        Self {
            config,
            local,
            network,
            running: None,
        }
    }

    /// Launch the I/O contexts and arm the watchdog
    pub fn start(&mut self) -> Result<DaemonHandle, DaemonError> {
        if self.running.is_some() {
            return Err(DaemonError::AlreadyStarted);
        }

        let (control_tx, mut control_rx) = mpsc::channel::<ControlInput>(CONTROL_QUEUE_DEPTH);
        let (sender_tx, mut sender_rx) = mpsc::unbounded_channel::<(ClientId, Bytes)>();
        let (net_out_tx, mut net_out_rx) = mpsc::unbounded_channel::<(SocketAddr, Bytes)>();

        // Receiver context: read, hand off, re-arm. Recoverable errors
        // never stop the loop.
        let receiver = {
            let local = self.local.clone();
            let control_tx = control_tx.clone();
            tokio::spawn(async move {
                loop {
                    match local.recv().await {
                        Ok(frame) => {
                            if control_tx
                                .send(ControlInput::LocalFrame(frame))
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(TransportError::Closed) => break,
                        Err(e) => warn!(error = %e, "local receive failed"),
                    }
                }
            })
        };

        // Network context: inbound reads and outbound drains in one task,
        // independent of the local pipeline.
        let network = {
            let network = self.network.clone();
            let control_tx = control_tx.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        read = network.recv() => match read {
                            Ok((data, from)) => {
                                if control_tx
                                    .send(ControlInput::NetworkFrame { data, from })
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Err(TransportError::Closed) => break,
                            Err(e) => warn!(error = %e, "network receive failed"),
                        },
                        job = net_out_rx.recv() => match job {
                            Some((addr, bytes)) => {
                                if let Err(e) = network.send_to(addr, &bytes).await {
                                    warn!(%addr, error = %e, "network send failed");
                                }
                            }
                            None => break,
                        },
                    }
                }
            })
        };

        // Sender context: one FIFO for all local deliveries keeps
        // per-destination order without per-client queues.
        let sender = {
            let local = self.local.clone();
            tokio::spawn(async move {
                while let Some((client, bytes)) = sender_rx.recv().await {
                    let channel = local.channel_name(client);
                    if let Err(e) = local.send_to(&channel, &bytes).await {
                        warn!(client = %client, error = %e, "local delivery failed");
                    }
                }
            })
        };

        // Control context: sole owner of the routing tables.
        let control = {
            let prefix = self.config.daemon.channel_prefix.clone();
            tokio::spawn(async move {
                let mut core = RoutingCore::new(&prefix);
                while let Some(input) = control_rx.recv().await {
                    if matches!(input, ControlInput::Shutdown) {
                        break;
                    }
                    for delivery in core.handle(input) {
                        match delivery {
                            Delivery::Local { client, bytes } => {
                                let _ = sender_tx.send((client, bytes));
                            }
                            Delivery::Remote { addr, bytes } => {
                                let _ = net_out_tx.send((addr, bytes));
                            }
                        }
                    }
                }
                // sender_tx and net_out_tx drop here; the sender drains
                // whatever is queued and the network task winds down.
            })
        };

        let watchdog = spawn_watchdog(&self.config.watchdog, control_tx.clone());

        info!(name = %self.config.daemon.name, "daemon started");
        self.running = Some(Running {
            control_tx: control_tx.clone(),
            control,
            receiver,
            network,
            sender,
            watchdog,
        });
        Ok(DaemonHandle { tx: control_tx })
    }

    /// Stop: cancel timers and pending reads, let the sender drain what is
    /// already queued, then release the contexts
    pub async fn stop(&mut self) -> Result<(), DaemonError> {
        let Some(running) = self.running.take() else {
            return Err(DaemonError::NotStarted);
        };

        if let Some(watchdog) = running.watchdog {
            watchdog.abort();
        }
        running.receiver.abort();

        let _ = running.control_tx.send(ControlInput::Shutdown).await;
        let _ = running.control.await;
        // Both exit on their closed queues once control is gone.
        let _ = running.network.await;
        let _ = running.sender.await;

        info!(name = %self.config.daemon.name, "daemon stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

/// Cloneable collaborator surface onto a running daemon
///
/// The service-discovery collaborator and management components use this
/// to feed the control task; every call is a message, so collaborators
/// never touch the routing tables directly.
#[derive(Clone)]
pub struct DaemonHandle {
    tx: mpsc::Sender<ControlInput>,
}

impl DaemonHandle {
    /// Service-discovery input: a remote service appeared or disappeared
    pub async fn remote_availability(
        &self,
        service: ServiceId,
        instance: InstanceId,
        location: Option<(SocketAddr, bool)>,
        available: bool,
    ) -> Result<(), DaemonError> {
        self.send(ControlInput::RemoteAvailability {
            service,
            instance,
            location,
            available,
        })
        .await
    }

    /// Subscribe a client to an eventgroup (with late-join replay)
    pub async fn subscribe(
        &self,
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        subscriber: ClientId,
    ) -> Result<(), DaemonError> {
        self.send(ControlInput::Subscription {
            service,
            instance,
            eventgroup,
            subscriber,
            subscribing: true,
        })
        .await
    }

    /// Remove a client from an eventgroup
    pub async fn unsubscribe(
        &self,
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        subscriber: ClientId,
    ) -> Result<(), DaemonError> {
        self.send(ControlInput::Subscription {
            service,
            instance,
            eventgroup,
            subscriber,
            subscribing: false,
        })
        .await
    }

    /// Cache and fan out a field value
    pub async fn publish_field(
        &self,
        service: ServiceId,
        instance: InstanceId,
        eventgroup: EventgroupId,
        event: EventId,
        payload: Bytes,
    ) -> Result<(), DaemonError> {
        self.send(ControlInput::PublishField {
            service,
            instance,
            eventgroup,
            event,
            payload,
        })
        .await
    }

    /// Replay the full current state to one client
    pub async fn catch_up(&self, client: ClientId) -> Result<(), DaemonError> {
        self.send(ControlInput::CatchUp(client)).await
    }

    async fn send(&self, input: ControlInput) -> Result<(), DaemonError> {
        self.tx
            .send(input)
            .await
            .map_err(|_| DaemonError::NotStarted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soipc_codec::{decode_command, encode_command, Command};
    use soipc_transport::memory::{MemoryChannel, MemoryNetwork};
    use soipc_transport::{LocalConfig, MemoryConfig, NetworkConfig};

    fn test_config() -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.daemon.local = LocalConfig::Memory(MemoryConfig::default());
        config.daemon.network = NetworkConfig::Memory(MemoryConfig::default());
        config.watchdog.enabled = false;
        config
    }

    #[tokio::test]
    async fn lifecycle_guards() {
        let local = MemoryChannel::new("/tmp/soipc");
        let network = MemoryNetwork::new();
        let mut daemon = Daemon::init_with_transports(test_config(), local, network);

        assert!(matches!(daemon.stop().await, Err(DaemonError::NotStarted)));
        daemon.start().unwrap();
        assert!(matches!(daemon.start(), Err(DaemonError::AlreadyStarted)));
        daemon.stop().await.unwrap();
        assert!(!daemon.is_running());

        // Restartable after a clean stop.
        daemon.start().unwrap();
        daemon.stop().await.unwrap();
    }

    #[tokio::test]
    async fn registration_round_trip_over_pipeline() {
        let local = MemoryChannel::new("/tmp/soipc");
        let network = MemoryNetwork::new();
        let mut daemon =
            Daemon::init_with_transports(test_config(), local.clone(), network.clone());
        daemon.start().unwrap();

        let mut client = local.connect(ClientId(5));
        client
            .send(&encode_command(
                ClientId(5),
                &Command::RegisterApplication {
                    name: "nav".to_string(),
                    managing: false,
                },
            ))
            .unwrap();

        let reply = client.recv().await.expect("registry snapshot");
        let (sender, command) = decode_command(&reply).unwrap();
        assert_eq!(sender, ClientId::DAEMON);
        assert!(matches!(
            command,
            Command::ApplicationInfo { entries } if entries.len() == 1
        ));

        daemon.stop().await.unwrap();
    }

    #[tokio::test]
    async fn handle_is_rejected_after_stop() {
        let local = MemoryChannel::new("/tmp/soipc");
        let network = MemoryNetwork::new();
        let mut daemon = Daemon::init_with_transports(test_config(), local, network);
        let handle = daemon.start().unwrap();
        daemon.stop().await.unwrap();

        let err = handle.catch_up(ClientId(5)).await.unwrap_err();
        assert!(matches!(err, DaemonError::NotStarted));
    }
}
