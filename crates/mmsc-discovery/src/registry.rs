//! Browse sessions, single-target resolution, and the peer list

use crate::error::{DiscoveryError, Result};
use crate::types::{RegistryEvent, RegistryEventKind};
use async_channel::{Receiver, Sender};
use mdns_sd::{ServiceDaemon, ServiceEvent as MdnsEvent, ServiceInfo};
use mmsc_core::config::DiscoveryConfig;
use mmsc_core::Peer;
use parking_lot::{Mutex, RwLock};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Discovery registry for media-meta-stream peers.
///
/// Browses the local network for the configured service type and publishes
/// resolved peers as an ordered, deduplicated list. One browse session is
/// active at a time; [`PeerRegistry::start_discovery`] supersedes the
/// previous session without clearing the published list.
pub struct PeerRegistry {
    /// mDNS service daemon
    mdns: Arc<ServiceDaemon>,

    /// State shared with the browse task and resolve-deadline timers
    shared: Arc<RegistryShared>,

    /// Event channel receiver (for external consumers)
    event_rx: Receiver<RegistryEvent>,

    /// Handle of the active browse task
    browse_task: Mutex<Option<JoinHandle<()>>>,

    /// Configuration
    config: DiscoveryConfig,
}

/// Mutable registry state.
///
/// The peer list and the pursuit marker are only written by the browse task
/// and the deadline timers; session tagging keeps late callbacks from a
/// superseded session out.
struct RegistryShared {
    /// Ordered list of resolved peers, never cleared
    peers: RwLock<Vec<Peer>>,

    /// Identifier of the active browse session, bumped on every restart
    session: AtomicU64,

    /// The one instance being pursued in the active session, if any
    pursuit: Mutex<Option<Pursuit>>,

    /// Event channel sender
    event_tx: Sender<RegistryEvent>,

    /// Service type being browsed, used to derive display names
    service_type: String,
}

/// Resolution state for the single pursued instance of a session.
struct Pursuit {
    session: u64,
    instance: String,
    resolved: bool,
    expired: bool,
}

impl PeerRegistry {
    /// Creates a new registry and the underlying mDNS daemon.
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        config.validate()?;

        let mdns =
            ServiceDaemon::new().map_err(|e| DiscoveryError::MdnsInitFailed(e.to_string()))?;

        let (event_tx, event_rx) = async_channel::bounded(config.event_capacity);

        info!(service_type = config.service_type, "peer registry created");

        Ok(Self {
            mdns: Arc::new(mdns),
            shared: Arc::new(RegistryShared {
                peers: RwLock::new(Vec::new()),
                session: AtomicU64::new(0),
                pursuit: Mutex::new(None),
                event_tx,
                service_type: config.service_type.clone(),
            }),
            event_rx,
            browse_task: Mutex::new(None),
            config,
        })
    }

    /// Starts a fresh browse session, superseding any previous one.
    ///
    /// The pursuit marker is reset so the next announced instance is pursued
    /// again; the published peer list is left intact. Safe to call
    /// repeatedly. Late callbacks from a superseded session are discarded by
    /// their session tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the browse cannot be started. The failure is
    /// session-scoped: the registry stays usable and a later call may
    /// succeed.
    pub fn start_discovery(&self) -> Result<()> {
        let session = self.shared.begin_session();

        // Supersede the previous browse session
        if let Some(task) = self.browse_task.lock().take() {
            task.abort();
        }
        let service_type = self.config.service_type.as_str();
        if let Err(e) = self.mdns.stop_browse(service_type) {
            debug!(error = %e, "no previous browse to stop");
        }

        let receiver =
            self.mdns
                .browse(service_type)
                .map_err(|e| DiscoveryError::BrowseFailed {
                    service_type: service_type.to_string(),
                    reason: e.to_string(),
                })?;

        info!(service_type, session, "starting discovery");

        let shared = self.shared.clone();
        let resolve_timeout = self.config.resolve_timeout();
        let task = tokio::spawn(run_browse_session(shared, receiver, session, resolve_timeout));
        *self.browse_task.lock() = Some(task);

        Ok(())
    }

    /// Returns an ordered snapshot of the known peers.
    pub fn peers(&self) -> Vec<Peer> {
        self.shared.peers.read().clone()
    }

    /// Returns the event receiver for external consumers.
    pub fn event_receiver(&self) -> Receiver<RegistryEvent> {
        self.event_rx.clone()
    }

    /// Stops browsing and shuts the mDNS daemon down.
    pub fn stop(&self) -> Result<()> {
        if let Some(task) = self.browse_task.lock().take() {
            task.abort();
        }

        self.mdns.shutdown().map_err(|e| {
            DiscoveryError::Internal(format!("Failed to shutdown mDNS daemon: {e}"))
        })?;

        info!("peer registry stopped");
        Ok(())
    }
}

impl Drop for PeerRegistry {
    fn drop(&mut self) {
        let _ = self.mdns.shutdown();
    }
}

/// Consumes mDNS events for one browse session until the receiver closes or
/// the session is superseded.
async fn run_browse_session(
    shared: Arc<RegistryShared>,
    receiver: mdns_sd::Receiver<MdnsEvent>,
    session: u64,
    resolve_timeout: Duration,
) {
    while let Ok(event) = receiver.recv_async().await {
        if shared.session.load(Ordering::SeqCst) != session {
            debug!(session, "discovery session superseded");
            break;
        }

        match event {
            MdnsEvent::ServiceFound(_, fullname) => {
                if shared.handle_announced(session, &fullname) {
                    arm_resolve_deadline(&shared, session, fullname, resolve_timeout);
                }
            }

            MdnsEvent::ServiceResolved(info) => {
                if let Some(kind) = shared.handle_resolved(&info) {
                    shared.emit(kind).await;
                }
            }

            MdnsEvent::ServiceRemoved(_, fullname) => {
                // Peers are never removed from the published list
                debug!(instance = fullname, "service removal announced, ignored");
            }

            MdnsEvent::SearchStarted(ty) => {
                debug!(ty, session, "search started");
            }

            MdnsEvent::SearchStopped(ty) => {
                debug!(ty, session, "search stopped");
            }

            _ => {}
        }
    }

    debug!(session, "browse task stopped");
}

/// Spawns the bounded-resolution timer for a pursued instance.
fn arm_resolve_deadline(
    shared: &Arc<RegistryShared>,
    session: u64,
    instance: String,
    timeout: Duration,
) {
    let shared = shared.clone();
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if let Some(kind) = shared.expire_pursuit(session, &instance) {
            shared.emit(kind).await;
        }
    });
}

impl RegistryShared {
    /// Begins a new session: bumps the session id and clears the pursuit
    /// marker. The peer list is left intact.
    fn begin_session(&self) -> u64 {
        let session = self.session.fetch_add(1, Ordering::SeqCst) + 1;
        *self.pursuit.lock() = None;
        session
    }

    /// Handles an instance announcement. Returns true when the instance was
    /// taken up for resolution and a deadline should be armed.
    ///
    /// Only the first announcement per session is pursued; anything after
    /// that is ignored until the next session, whether or not the pursuit
    /// succeeded.
    fn handle_announced(&self, session: u64, instance: &str) -> bool {
        let mut pursuit = self.pursuit.lock();
        if pursuit.is_some() {
            debug!(instance, "ignoring announcement, an instance is already pursued");
            return false;
        }

        info!(instance, session, "pursuing announced instance");
        *pursuit = Some(Pursuit {
            session,
            instance: instance.to_string(),
            resolved: false,
            expired: false,
        });
        true
    }

    /// Handles a completed resolution. Returns the event to emit, if any.
    ///
    /// Resolutions for anything but the live pursued instance are discarded,
    /// as are resolutions arriving after the deadline expired. A usable
    /// result appends a peer unless an identical one is already listed.
    fn handle_resolved(&self, info: &ServiceInfo) -> Option<RegistryEventKind> {
        let fullname = info.get_fullname();

        {
            let mut pursuit = self.pursuit.lock();
            match pursuit.as_mut() {
                Some(p) if p.instance == fullname && !p.expired => {
                    p.resolved = true;
                }
                _ => {
                    debug!(instance = fullname, "discarding resolution for unpursued instance");
                    return None;
                }
            }
        }

        // Select the first IPv4 entry; other address families are skipped
        let address = info.get_addresses().iter().find_map(|addr| match addr {
            IpAddr::V4(v4) => Some(*v4),
            IpAddr::V6(_) => None,
        });

        let Some(address) = address else {
            debug!(instance = fullname, "no IPv4 address in resolution, instance dropped");
            return None;
        };

        let peer = Peer::new(self.display_name(fullname), address, info.get_port());

        let mut peers = self.peers.write();
        if peers.contains(&peer) {
            debug!(peer = %peer, "peer already listed");
            return None;
        }

        info!(peer = %peer, "peer discovered");
        peers.push(peer.clone());
        let snapshot = peers.clone();
        drop(peers);

        Some(RegistryEventKind::PeerDiscovered {
            peer,
            peers: snapshot,
        })
    }

    /// Expires a pursuit whose resolution did not complete in time. Returns
    /// the event to emit, if the pursuit was still pending.
    fn expire_pursuit(&self, session: u64, instance: &str) -> Option<RegistryEventKind> {
        if self.session.load(Ordering::SeqCst) != session {
            return None;
        }

        let mut pursuit = self.pursuit.lock();
        match pursuit.as_mut() {
            Some(p) if p.session == session && p.instance == instance && !p.resolved => {
                p.expired = true;
                warn!(instance, "resolution timed out, instance dropped");
                Some(RegistryEventKind::ResolveFailed {
                    instance: instance.to_string(),
                    reason: "resolution timed out".to_string(),
                })
            }
            _ => None,
        }
    }

    /// Strips the service-type suffix off an mDNS fullname for display.
    fn display_name(&self, fullname: &str) -> String {
        fullname
            .strip_suffix(&format!(".{}", self.service_type))
            .unwrap_or(fullname)
            .to_string()
    }

    async fn emit(&self, kind: RegistryEventKind) {
        let event = RegistryEvent::new(kind);
        if let Err(e) = self.event_tx.send(event).await {
            warn!(error = %e, "failed to send registry event");
        }
    }
}
