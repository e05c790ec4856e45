//! Connection manager implementation
//!
//! The registry that tracks every active output connection, keeps recently
//! started sources attachable for the de-duplication window and serves the
//! ConnectionManager service actions.

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::protocol::{Protocol, ProtocolCatalog};
use crate::proxy::{StreamProxy, StreamSource};
use crate::scheduler::Scheduler;
use crate::upnp::{ArgumentDirection, PropertySet, RootDevice, Service, ServiceDescription};

use super::config::RegistryConfig;
use super::entry::{ConnectionInfo, ConnectionStatus, Direction, ProtocolInfo};
use super::error::RegistryError;
use super::key::OutputKey;
use super::subscription::Subscription;

/// Service id the manager registers under
pub const SERVICE_ID: &str = "urn:upnp-org:serviceId:ConnectionManager";

/// Service type URN
pub const SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:ConnectionManager:1";

type CountHandler = Arc<dyn Fn(usize) + Send + Sync>;

struct RegistryState {
    /// Last issued connection id
    next_connection_id: i32,

    connections: BTreeMap<i32, ConnectionInfo>,

    /// Sources kept alive for de-duplication, by connection id
    sources: BTreeMap<i32, Arc<StreamSource>>,

    count_handlers: BTreeMap<u64, CountHandler>,
    next_subscriber_id: u64,
}

struct Inner {
    config: RegistryConfig,
    catalog: ProtocolCatalog,
    scheduler: Arc<dyn Scheduler>,
    root_device: Arc<dyn RootDevice>,
    state: Mutex<RegistryState>,
}

/// Registry of active output connections
///
/// Every change to the connection table and the subscriber list runs on the
/// [`Scheduler`] loop thread, so count notifications are delivered in the
/// order the changes happened. Calls from other threads block until the
/// change is done. Queries read a lock-protected snapshot from any thread.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Create a connection manager with default configuration
    pub fn new(
        catalog: ProtocolCatalog,
        scheduler: Arc<dyn Scheduler>,
        root_device: Arc<dyn RootDevice>,
    ) -> Self {
        Self::with_config(RegistryConfig::default(), catalog, scheduler, root_device)
    }

    /// Create a connection manager and register it with `root_device`
    pub fn with_config(
        config: RegistryConfig,
        catalog: ProtocolCatalog,
        scheduler: Arc<dyn Scheduler>,
        root_device: Arc<dyn RootDevice>,
    ) -> Self {
        let inner = Arc::new(Inner {
            config,
            catalog,
            scheduler,
            root_device,
            state: Mutex::new(RegistryState {
                next_connection_id: 0,
                connections: BTreeMap::new(),
                sources: BTreeMap::new(),
                count_handlers: BTreeMap::new(),
                next_subscriber_id: 0,
            }),
        });

        let service: Arc<dyn Service> = inner.clone();
        inner
            .root_device
            .service_register(SERVICE_ID, Arc::downgrade(&service));

        Self { inner }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Declared protocols
    pub fn catalog(&self) -> &ProtocolCatalog {
        &self.inner.catalog
    }

    /// Register an output connection served by `proxy`
    ///
    /// The registry keeps the proxy's source attachable until the
    /// de-duplication window elapses or a cursor detaches, whichever comes
    /// first. The connection itself is removed when the source closes.
    pub fn add_output_connection(
        &self,
        proxy: &StreamProxy,
        protocol: &Protocol,
        mrl: &str,
        endpoint: &str,
        opt: &str,
    ) -> Result<i32> {
        let source = Arc::clone(proxy.source());
        let protocol = protocol.clone();
        let (mrl, endpoint, opt) = (mrl.to_string(), endpoint.to_string(), opt.to_string());

        let added = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&added);
        let inner = Arc::clone(&self.inner);

        self.inner.scheduler.send(Box::new(move || {
            let connection_id = inner.add(source, &protocol, &mrl, &endpoint, &opt);
            *slot.lock() = Some(connection_id);
        }))?;

        let connection_id = added.lock().take();
        connection_id.ok_or(Error::SchedulerStopped)
    }

    /// Remove an output connection
    ///
    /// Removing an unknown id does nothing.
    pub fn remove_output_connection(&self, connection_id: i32) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .scheduler
            .send(Box::new(move || inner.remove(connection_id)))
    }

    /// Attach to a running source serving exactly this request
    ///
    /// Only sources still retained by the registry are considered. Fails
    /// with [`RegistryError::WindowClosed`] if the matching source has
    /// already evicted data, and with [`RegistryError::NoMatchingConnection`]
    /// if nothing matches.
    pub fn try_attach_output_connection(
        &self,
        protocol: &Protocol,
        mrl: &str,
        endpoint: &str,
        opt: &str,
    ) -> std::result::Result<StreamProxy, RegistryError> {
        let key = OutputKey::new(protocol, mrl, endpoint, opt);

        let candidate = {
            let state = self.inner.state.lock();
            state
                .connections
                .values()
                .filter(|info| info.matches(&key))
                .find_map(|info| {
                    state
                        .sources
                        .get(&info.connection_id)
                        .map(|source| (info.connection_id, Arc::clone(source)))
                })
        };

        let Some((connection_id, source)) = candidate else {
            return Err(RegistryError::NoMatchingConnection(key));
        };

        match source.attach() {
            Some(proxy) => {
                tracing::info!(
                    connection_id = connection_id,
                    stream = %key,
                    "Attached to existing source"
                );
                Ok(proxy)
            }
            None => Err(RegistryError::WindowClosed { connection_id }),
        }
    }

    /// Serve a request, sharing a running source when possible
    ///
    /// Tries [`try_attach_output_connection`](Self::try_attach_output_connection)
    /// first. On an attach miss `start` opens the underlying input, which is
    /// wrapped in a new source and registered as a new connection.
    pub fn open_output_connection<R, F>(
        &self,
        protocol: &Protocol,
        mrl: &str,
        endpoint: &str,
        opt: &str,
        start: F,
    ) -> Result<StreamProxy>
    where
        R: Read + Send + 'static,
        F: FnOnce() -> io::Result<R>,
    {
        match self.try_attach_output_connection(protocol, mrl, endpoint, opt) {
            Ok(proxy) => return Ok(proxy),
            Err(e) => tracing::debug!(reason = %e, "Starting new source"),
        }

        let input = start()?;
        let proxy = StreamProxy::open(input, self.inner.config.proxy)?;
        self.add_output_connection(&proxy, protocol, mrl, endpoint, opt)?;

        Ok(proxy)
    }

    /// Ids of all active connections, ascending
    pub fn get_current_connection_ids(&self) -> Vec<i32> {
        self.inner.state.lock().connections.keys().copied().collect()
    }

    /// Info for one connection, `None` if the id is unknown
    pub fn get_current_connection_info(&self, connection_id: i32) -> Option<ConnectionInfo> {
        self.inner
            .state
            .lock()
            .connections
            .get(&connection_id)
            .cloned()
    }

    /// Declared source and sink protocols
    pub fn get_protocol_info(&self) -> ProtocolInfo {
        ProtocolInfo {
            source: self.inner.catalog.source_protocol_info(),
            sink: self.inner.catalog.sink_protocol_info(),
        }
    }

    /// Snapshot of all active connections
    pub fn output_connections(&self) -> Vec<ConnectionInfo> {
        self.inner
            .state
            .lock()
            .connections
            .values()
            .cloned()
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.state.lock().connections.len()
    }

    /// Drop every connection and retained source
    pub fn close(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.inner.scheduler.send(Box::new(move || inner.clear()))
    }

    /// Call `handler` with the new count whenever connections are added or removed
    ///
    /// Handlers run on the scheduler loop thread.
    pub fn subscribe_connection_count<F>(&self, handler: F) -> Result<Subscription>
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let handler: CountHandler = Arc::new(handler);
        let subscribed = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&subscribed);
        let inner = Arc::clone(&self.inner);

        self.inner.scheduler.send(Box::new(move || {
            let mut state = inner.state.lock();
            let id = state.next_subscriber_id;
            state.next_subscriber_id += 1;
            state.count_handlers.insert(id, handler);
            *slot.lock() = Some(id);
        }))?;

        let id = subscribed.lock().take().ok_or(Error::SchedulerStopped)?;

        let weak = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.unsubscribe(id);
            }
        }))
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.inner.root_device.service_unregister(SERVICE_ID);
    }
}

impl Inner {
    fn add(
        self: &Arc<Self>,
        source: Arc<StreamSource>,
        protocol: &Protocol,
        mrl: &str,
        endpoint: &str,
        opt: &str,
    ) -> i32 {
        let (connection_id, count) = {
            let mut state = self.state.lock();
            state.next_connection_id += 1;
            let connection_id = state.next_connection_id;

            let info = ConnectionInfo::output(connection_id, protocol, mrl, endpoint, opt, &source);
            state.connections.insert(connection_id, info);
            state.sources.insert(connection_id, Arc::clone(&source));

            (connection_id, state.connections.len())
        };

        let weak = Arc::downgrade(self);

        source.subscribe_close(&self.scheduler, {
            let weak = weak.clone();
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.remove(connection_id);
                }
            }
        });

        source.subscribe_detach(&self.scheduler, {
            let weak = weak.clone();
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.release_source(connection_id);
                }
            }
        });

        self.scheduler.timer(
            self.config.dedup_window,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    tracing::debug!(connection_id = connection_id, "De-duplication window elapsed");
                    inner.release_source(connection_id);
                }
            }),
        );

        tracing::info!(
            connection_id = connection_id,
            mrl = mrl,
            endpoint = endpoint,
            profile = %protocol.profile,
            "Output connection added"
        );

        self.emit_event();
        self.notify_count(count);

        connection_id
    }

    fn remove(&self, connection_id: i32) {
        let removed = {
            let mut state = self.state.lock();
            let source = state.sources.remove(&connection_id);
            state
                .connections
                .remove(&connection_id)
                .map(|_| (source, state.connections.len()))
        };

        let Some((source, count)) = removed else {
            return;
        };
        drop(source);

        tracing::info!(connection_id = connection_id, "Output connection removed");

        self.emit_event();
        self.notify_count(count);
    }

    fn clear(&self) {
        let sources = {
            let mut state = self.state.lock();
            state.connections.clear();
            std::mem::take(&mut state.sources)
        };

        // Sources may join their producer on drop, keep that outside the lock
        drop(sources);

        tracing::info!("Connection manager closed");
        self.notify_count(0);
    }

    fn unsubscribe(self: Arc<Self>, id: u64) {
        let inner = Arc::clone(&self);
        let removed = self.scheduler.send(Box::new(move || {
            inner.state.lock().count_handlers.remove(&id);
        }));

        // Loop already gone: nothing can be notified any more, drop it here
        if removed.is_err() {
            self.state.lock().count_handlers.remove(&id);
        }
    }

    /// Stop keeping the source of `connection_id` attachable
    fn release_source(&self, connection_id: i32) {
        let source = self.state.lock().sources.remove(&connection_id);

        if source.is_some() {
            tracing::debug!(connection_id = connection_id, "Released source reference");
        }
    }

    fn emit_event(&self) {
        let root_device = Arc::clone(&self.root_device);
        self.scheduler
            .post(Box::new(move || root_device.emit_event(SERVICE_ID)));
    }

    fn notify_count(&self, count: usize) {
        let handlers: Vec<CountHandler> = self
            .state
            .lock()
            .count_handlers
            .values()
            .cloned()
            .collect();

        for handler in handlers {
            handler(count);
        }
    }

    fn current_connection_ids(&self) -> String {
        self.state
            .lock()
            .connections
            .keys()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Service for Inner {
    fn service_type(&self) -> &str {
        SERVICE_TYPE
    }

    fn write_service_description(&self, desc: &mut ServiceDescription) {
        use ArgumentDirection::{In, Out};

        desc.add_action(
            "GetCurrentConnectionIDs",
            &[("ConnectionIDs", Out, "CurrentConnectionIDs")],
        );
        desc.add_action(
            "GetCurrentConnectionInfo",
            &[
                ("ConnectionID", In, "A_ARG_TYPE_ConnectionID"),
                ("RcsID", Out, "A_ARG_TYPE_RcsID"),
                ("AVTransportID", Out, "A_ARG_TYPE_AVTransportID"),
                ("ProtocolInfo", Out, "A_ARG_TYPE_ProtocolInfo"),
                ("PeerConnectionManager", Out, "A_ARG_TYPE_ConnectionManager"),
                ("PeerConnectionID", Out, "A_ARG_TYPE_ConnectionID"),
                ("Direction", Out, "A_ARG_TYPE_Direction"),
                ("Status", Out, "A_ARG_TYPE_ConnectionStatus"),
            ],
        );
        desc.add_action(
            "GetProtocolInfo",
            &[
                ("Source", Out, "SourceProtocolInfo"),
                ("Sink", Out, "SinkProtocolInfo"),
            ],
        );

        desc.add_state_variable("SourceProtocolInfo", "string", true, &[]);
        desc.add_state_variable("SinkProtocolInfo", "string", true, &[]);
        desc.add_state_variable("CurrentConnectionIDs", "string", true, &[]);
        desc.add_state_variable(
            "A_ARG_TYPE_ConnectionStatus",
            "string",
            false,
            &ConnectionStatus::VALUES,
        );
        desc.add_state_variable("A_ARG_TYPE_ConnectionManager", "string", false, &[]);
        desc.add_state_variable("A_ARG_TYPE_Direction", "string", false, &Direction::VALUES);
        desc.add_state_variable("A_ARG_TYPE_ProtocolInfo", "string", false, &[]);
        desc.add_state_variable("A_ARG_TYPE_ConnectionID", "i4", false, &[]);
        desc.add_state_variable("A_ARG_TYPE_AVTransportID", "i4", false, &[]);
        desc.add_state_variable("A_ARG_TYPE_RcsID", "i4", false, &[]);
    }

    fn write_eventable_statevariables(&self, propset: &mut PropertySet) {
        propset.add_property("SourceProtocolInfo", self.catalog.source_protocol_info());
        propset.add_property("SinkProtocolInfo", self.catalog.sink_protocol_info());
        propset.add_property("CurrentConnectionIDs", self.current_connection_ids());
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;
    use std::time::Duration;

    use super::*;
    use crate::protocol::constants::{MIME_AUDIO_MP3, MIME_VIDEO_MPEG};
    use crate::protocol::{AudioFormat, EncoderHints, VideoFormat};
    use crate::proxy::ProxyConfig;
    use crate::scheduler::MessageLoop;

    #[derive(Default)]
    struct RecordingDevice {
        events: AtomicUsize,
        services: Mutex<Vec<(String, Weak<dyn Service>)>>,
    }

    impl RootDevice for RecordingDevice {
        fn service_register(&self, service_id: &str, service: Weak<dyn Service>) {
            self.services.lock().push((service_id.to_string(), service));
        }

        fn service_unregister(&self, service_id: &str) {
            self.services.lock().retain(|(id, _)| id != service_id);
        }

        fn emit_event(&self, _service_id: &str) {
            self.events.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl RecordingDevice {
        fn events(&self) -> usize {
            self.events.load(Ordering::SeqCst)
        }

        fn service(&self) -> Option<Arc<dyn Service>> {
            self.services
                .lock()
                .iter()
                .find(|(id, _)| id == SERVICE_ID)
                .and_then(|(_, service)| service.upgrade())
        }
    }

    struct Fixture {
        messageloop: Arc<MessageLoop>,
        device: Arc<RecordingDevice>,
        manager: ConnectionManager,
    }

    impl Fixture {
        fn new(config: RegistryConfig) -> Self {
            let messageloop = Arc::new(MessageLoop::spawn("registry-test").unwrap());
            let device = Arc::new(RecordingDevice::default());

            let mut catalog = ProtocolCatalog::new();
            catalog.add_source_audio_protocol(
                "MP3",
                MIME_AUDIO_MP3,
                "mp3",
                AudioFormat::new(44100, 2),
                EncoderHints::default(),
            );
            catalog.add_source_video_protocol(
                "MPEG_PS_PAL",
                MIME_VIDEO_MPEG,
                "mpg",
                AudioFormat::new(48000, 2),
                VideoFormat::new(720, 576, 1.0, 25, 1),
                EncoderHints::default(),
            );

            let manager = ConnectionManager::with_config(
                config,
                catalog,
                messageloop.clone(),
                device.clone(),
            );

            Self {
                messageloop,
                device,
                manager,
            }
        }

        fn flush(&self) {
            self.messageloop.flush().unwrap();
        }

        fn protocol(&self) -> Protocol {
            self.manager.catalog().get_video_protocol("MPEG_PS_PAL", 2, 720, 25.0)
        }
    }

    fn small_proxy(len: usize) -> StreamProxy {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        StreamProxy::open(
            Cursor::new(data),
            ProxyConfig::default().block_size(16).block_count(4),
        )
        .unwrap()
    }

    #[test]
    fn test_add_remove_restores_state() {
        let fixture = Fixture::new(RegistryConfig::default());
        let protocol = fixture.protocol();
        let service = fixture.device.service().unwrap();

        let mut before = PropertySet::new();
        service.write_eventable_statevariables(&mut before);

        let proxy = small_proxy(32);
        let id = fixture
            .manager
            .add_output_connection(&proxy, &protocol, "file:///movie.mkv", "/mpeg/1", "")
            .unwrap();
        assert_eq!(fixture.manager.connection_count(), 1);

        fixture.manager.remove_output_connection(id).unwrap();
        fixture.flush();

        let mut after = PropertySet::new();
        service.write_eventable_statevariables(&mut after);

        assert_eq!(fixture.manager.connection_count(), 0);
        assert_eq!(before.get("CurrentConnectionIDs"), after.get("CurrentConnectionIDs"));
        assert_eq!(fixture.device.events(), 2);
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let fixture = Fixture::new(RegistryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        let _subscription = fixture
            .manager
            .subscribe_connection_count(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        fixture.manager.remove_output_connection(42).unwrap();
        fixture.flush();

        assert_eq!(fixture.device.events(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_connection_ids_increase() {
        let fixture = Fixture::new(RegistryConfig::default());
        let protocol = fixture.protocol();

        let first = small_proxy(8);
        let second = small_proxy(8);
        let a = fixture
            .manager
            .add_output_connection(&first, &protocol, "a", "/a", "")
            .unwrap();
        fixture.manager.remove_output_connection(a).unwrap();
        let b = fixture
            .manager
            .add_output_connection(&second, &protocol, "b", "/b", "")
            .unwrap();

        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(fixture.manager.get_current_connection_ids(), vec![2]);
    }

    #[test]
    fn test_connection_info() {
        let fixture = Fixture::new(RegistryConfig::default());
        let protocol = fixture.protocol();
        let proxy = small_proxy(8);

        let id = fixture
            .manager
            .add_output_connection(&proxy, &protocol, "file:///a.mkv", "/mpeg/7", "-ss 10")
            .unwrap();

        let info = fixture.manager.get_current_connection_info(id).unwrap();
        assert_eq!(info.protocol_info, "http-get:*:video/mpeg:*");
        assert_eq!(info.direction, Direction::Output);
        assert_eq!(info.status, ConnectionStatus::Ok);
        assert_eq!(info.opt, "-ss 10");
        assert_eq!(info.protocol_string, protocol.to_string());

        assert!(fixture.manager.get_current_connection_info(id + 1).is_none());
        assert_eq!(fixture.manager.output_connections().len(), 1);
    }

    #[test]
    fn test_try_attach_matches_exact_tuple() {
        let fixture = Fixture::new(RegistryConfig::default());
        let protocol = fixture.protocol();
        let data: Vec<u8> = (0..32u8).collect();

        let proxy = StreamProxy::open(
            Cursor::new(data.clone()),
            ProxyConfig::default().block_size(16).block_count(4),
        )
        .unwrap();
        fixture
            .manager
            .add_output_connection(&proxy, &protocol, "file:///a.mkv", "/mpeg/1", "")
            .unwrap();

        let mut attached = fixture
            .manager
            .try_attach_output_connection(&protocol, "file:///a.mkv", "/mpeg/1", "")
            .unwrap();
        assert_eq!(attached.position(), Some(0));

        let mut out = Vec::new();
        attached.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);

        let miss = fixture
            .manager
            .try_attach_output_connection(&protocol, "file:///b.mkv", "/mpeg/1", "");
        assert!(matches!(miss, Err(RegistryError::NoMatchingConnection(_))));

        let miss = fixture
            .manager
            .try_attach_output_connection(&protocol, "file:///a.mkv", "/mpeg/1", "-ss 5");
        assert!(matches!(miss, Err(RegistryError::NoMatchingConnection(_))));
    }

    #[test]
    fn test_try_attach_after_eviction_fails() {
        let fixture = Fixture::new(RegistryConfig::default());
        let protocol = fixture.protocol();

        let mut proxy = small_proxy(256);
        let id = fixture
            .manager
            .add_output_connection(&proxy, &protocol, "file:///a.mkv", "/mpeg/1", "")
            .unwrap();

        let mut out = Vec::new();
        proxy.read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 256);
        assert!(proxy.source().stats().buffer_offset > 0);

        let result = fixture
            .manager
            .try_attach_output_connection(&protocol, "file:///a.mkv", "/mpeg/1", "");
        assert_eq!(
            result.unwrap_err(),
            RegistryError::WindowClosed { connection_id: id }
        );

        let fresh = small_proxy(8);
        let next = fixture
            .manager
            .add_output_connection(&fresh, &protocol, "file:///a.mkv", "/mpeg/1", "")
            .unwrap();
        assert_eq!(next, id + 1);
    }

    #[test]
    fn test_dedup_window_expires() {
        let fixture =
            Fixture::new(RegistryConfig::default().dedup_window(Duration::from_millis(20)));
        let protocol = fixture.protocol();

        let proxy = small_proxy(8);
        let id = fixture
            .manager
            .add_output_connection(&proxy, &protocol, "m", "/e", "")
            .unwrap();

        std::thread::sleep(Duration::from_millis(100));
        fixture.flush();

        // Connection stays listed while a client still reads from it
        assert_eq!(fixture.manager.get_current_connection_ids(), vec![id]);
        assert!(matches!(
            fixture.manager.try_attach_output_connection(&protocol, "m", "/e", ""),
            Err(RegistryError::NoMatchingConnection(_))
        ));

        // Last handle gone: the source closes and the connection goes with it
        drop(proxy);
        fixture.flush();
        fixture.flush();

        assert_eq!(fixture.manager.connection_count(), 0);
    }

    #[test]
    fn test_detach_releases_source() {
        let fixture = Fixture::new(RegistryConfig::default());
        let protocol = fixture.protocol();

        let proxy = small_proxy(8);
        fixture
            .manager
            .add_output_connection(&proxy, &protocol, "m", "/e", "")
            .unwrap();
        drop(proxy);

        // Detach releases the source, its close handler removes the connection,
        // and the removal posts an event
        fixture.flush();
        fixture.flush();
        fixture.flush();

        assert_eq!(fixture.manager.connection_count(), 0);
        assert_eq!(fixture.device.events(), 2);
    }

    #[test]
    fn test_count_subscription() {
        let fixture = Fixture::new(RegistryConfig::default());
        let protocol = fixture.protocol();
        let counts = Arc::new(Mutex::new(Vec::new()));

        let c = Arc::clone(&counts);
        let subscription = fixture
            .manager
            .subscribe_connection_count(move |count| c.lock().push(count))
            .unwrap();

        let first = small_proxy(8);
        let second = small_proxy(8);
        let a = fixture
            .manager
            .add_output_connection(&first, &protocol, "a", "/a", "")
            .unwrap();
        fixture
            .manager
            .add_output_connection(&second, &protocol, "b", "/b", "")
            .unwrap();
        fixture.manager.remove_output_connection(a).unwrap();
        assert_eq!(*counts.lock(), vec![1, 2, 1]);

        drop(subscription);
        fixture.manager.close().unwrap();
        assert_eq!(*counts.lock(), vec![1, 2, 1]);
        assert_eq!(fixture.manager.connection_count(), 0);
    }

    #[test]
    fn test_concurrent_adds_notify_in_order() {
        let fixture = Arc::new(Fixture::new(RegistryConfig::default()));
        let protocol = fixture.protocol();
        let counts = Arc::new(Mutex::new(Vec::new()));

        let c = Arc::clone(&counts);
        let _subscription = fixture
            .manager
            .subscribe_connection_count(move |count| c.lock().push(count))
            .unwrap();

        let adders: Vec<_> = (0..8)
            .map(|i| {
                let fixture = Arc::clone(&fixture);
                let protocol = protocol.clone();
                std::thread::spawn(move || {
                    let proxy = small_proxy(8);
                    let id = fixture
                        .manager
                        .add_output_connection(&proxy, &protocol, &format!("m{}", i), "/e", "")
                        .unwrap();
                    (id, proxy)
                })
            })
            .collect();

        let mut added: Vec<_> = adders.into_iter().map(|h| h.join().unwrap()).collect();
        added.sort_by_key(|(id, _)| *id);

        let ids: Vec<i32> = added.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        assert_eq!(*counts.lock(), (1..=8).collect::<Vec<usize>>());
        assert_eq!(counts.lock().last().copied(), Some(fixture.manager.connection_count()));
    }

    #[test]
    fn test_close_notifies_zero() {
        let fixture = Fixture::new(RegistryConfig::default());
        let protocol = fixture.protocol();
        let last = Arc::new(AtomicUsize::new(usize::MAX));

        let l = Arc::clone(&last);
        let _subscription = fixture
            .manager
            .subscribe_connection_count(move |count| l.store(count, Ordering::SeqCst))
            .unwrap();

        let proxy = small_proxy(8);
        fixture
            .manager
            .add_output_connection(&proxy, &protocol, "a", "/a", "")
            .unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 1);

        fixture.manager.close().unwrap();
        assert_eq!(last.load(Ordering::SeqCst), 0);
        assert!(fixture.manager.get_current_connection_ids().is_empty());
    }

    #[test]
    fn test_eventable_statevariables() {
        let fixture = Fixture::new(RegistryConfig::default());
        let protocol = fixture.protocol();
        let service = fixture.device.service().unwrap();

        let first = small_proxy(8);
        let second = small_proxy(8);
        fixture
            .manager
            .add_output_connection(&first, &protocol, "a", "/a", "")
            .unwrap();
        fixture
            .manager
            .add_output_connection(&second, &protocol, "b", "/b", "")
            .unwrap();

        let mut propset = PropertySet::new();
        service.write_eventable_statevariables(&mut propset);

        assert_eq!(propset.get("CurrentConnectionIDs"), Some("1,2"));
        assert_eq!(propset.get("SinkProtocolInfo"), Some(""));
        assert_eq!(
            propset.get("SourceProtocolInfo"),
            Some(
                "http-get:*:audio/mpeg:DLNA.ORG_PN=MP3,\
                 http-get:*:video/mpeg:DLNA.ORG_PN=MPEG_PS_PAL"
            )
        );
        assert_eq!(
            fixture.manager.get_protocol_info().source,
            propset.get("SourceProtocolInfo").unwrap()
        );
    }

    #[test]
    fn test_service_description() {
        let fixture = Fixture::new(RegistryConfig::default());
        let service = fixture.device.service().unwrap();
        assert_eq!(service.service_type(), SERVICE_TYPE);

        let mut desc = ServiceDescription::new();
        service.write_service_description(&mut desc);

        assert_eq!(desc.actions.len(), 3);
        assert_eq!(desc.action("GetCurrentConnectionInfo").unwrap().arguments.len(), 8);

        let status = desc.state_variable("A_ARG_TYPE_ConnectionStatus").unwrap();
        assert!(!status.send_events);
        assert_eq!(status.allowed_values.len(), 5);

        let ids = desc.state_variable("CurrentConnectionIDs").unwrap();
        assert!(ids.send_events);
        assert_eq!(desc.state_variable("A_ARG_TYPE_RcsID").unwrap().data_type, "i4");
    }

    #[test]
    fn test_drop_unregisters_service() {
        let fixture = Fixture::new(RegistryConfig::default());
        let device = Arc::clone(&fixture.device);
        assert!(device.service().is_some());

        drop(fixture);
        assert!(device.services.lock().is_empty());
    }
}
