//! Shared stream demo
//!
//! Run with: cargo run --example shared_stream
//!
//! Starts a fake transcoder, serves it to one client and then lets a second
//! client with the identical request join the same stream instead of
//! starting another transcode. A third request arrives after the first
//! client has read far ahead and gets a fresh source.
//!
//! Set `RUST_LOG=dlna_stream=debug` to see the registry at work.

use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dlna_stream::protocol::constants::{MIME_AUDIO_MP3, MIME_VIDEO_MPEG};
use dlna_stream::registry::SERVICE_ID;
use dlna_stream::upnp::{PropertySet, RootDevice, Service};
use dlna_stream::{
    AudioFormat, ConnectionManager, EncoderHints, MessageLoop, ProtocolCatalog, ProxyConfig,
    RegistryConfig, VideoFormat,
};

/// Prints every event it is asked to send
#[derive(Default)]
struct ConsoleDevice {
    service: parking_lot::Mutex<Option<Weak<dyn Service>>>,
    events: AtomicUsize,
}

impl RootDevice for ConsoleDevice {
    fn service_register(&self, service_id: &str, service: Weak<dyn Service>) {
        println!("Registered service {}", service_id);
        *self.service.lock() = Some(service);
    }

    fn service_unregister(&self, service_id: &str) {
        println!("Unregistered service {}", service_id);
        self.service.lock().take();
    }

    fn emit_event(&self, service_id: &str) {
        self.events.fetch_add(1, Ordering::Relaxed);

        let service = self.service.lock().as_ref().and_then(Weak::upgrade);
        if let Some(service) = service {
            let mut propset = PropertySet::new();
            service.write_eventable_statevariables(&mut propset);
            println!(
                "Event {}: CurrentConnectionIDs=[{}]",
                service_id,
                propset.get("CurrentConnectionIDs").unwrap_or_default()
            );
        }
    }
}

/// Stand-in for a transcoder process: a numbered byte pattern
struct FakeTranscoder {
    produced: usize,
    total: usize,
}

impl Read for FakeTranscoder {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.total - self.produced);
        for (i, b) in buf[..n].iter_mut().enumerate() {
            *b = ((self.produced + i) % 251) as u8;
        }
        self.produced += n;
        Ok(n)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dlna_stream=info".parse()?),
        )
        .init();

    let mut catalog = ProtocolCatalog::new();
    catalog.add_source_audio_protocol(
        "MP3",
        MIME_AUDIO_MP3,
        "mp3",
        AudioFormat::new(44100, 2),
        EncoderHints::audio("mp2", 256, "mp3"),
    );
    catalog.add_source_video_protocol(
        "MPEG_PS_PAL",
        MIME_VIDEO_MPEG,
        "mpg",
        AudioFormat::new(48000, 2),
        VideoFormat::new(720, 576, 1.0, 25, 1),
        EncoderHints::audio("mp2", 256, "vob").video("mpeg2video", 8000),
    );

    let messageloop = Arc::new(MessageLoop::spawn("connection-manager")?);
    let device = Arc::new(ConsoleDevice::default());
    let config = RegistryConfig::default()
        .dedup_window(Duration::from_secs(2))
        .proxy(ProxyConfig::default().block_size(64 * 1024).block_count(8));

    let manager = ConnectionManager::with_config(config, catalog, messageloop.clone(), device.clone());

    let protocol = manager.catalog().get_video_protocol("MPEG_PS_PAL", 2, 720, 25.0);
    println!("Negotiated {}", protocol);

    let total = 4 * 1024 * 1024;
    let start = || -> io::Result<FakeTranscoder> { Ok(FakeTranscoder { produced: 0, total }) };

    let mut first = manager.open_output_connection(&protocol, "file:///movie.mkv", "/mpeg/1", "", start)?;
    let second = manager.open_output_connection(&protocol, "file:///movie.mkv", "/mpeg/1", "", start)?;
    println!(
        "Two clients, {} connection(s), {} cursor(s) on the first source",
        manager.connection_count(),
        first.source().stats().cursor_count
    );

    let mut a = Vec::new();
    let mut b = Vec::new();
    let handle = std::thread::spawn(move || {
        let mut second = second;
        let mut buf = Vec::new();
        second.read_to_end(&mut buf).map(|_| buf)
    });
    first.read_to_end(&mut a)?;
    b.extend(handle.join().map_err(|_| "reader panicked")??);
    println!("Both clients received {} bytes, identical: {}", a.len(), a == b);

    // The first source has evicted data, so this request starts its own
    let third = manager.open_output_connection(&protocol, "file:///movie.mkv", "/mpeg/1", "", start)?;
    println!("Third client got connection ids {:?}", manager.get_current_connection_ids());

    drop(first);
    drop(third);
    messageloop.flush()?;
    messageloop.flush()?;
    messageloop.flush()?;

    println!(
        "Remaining connections: {}, events sent: {}",
        manager.connection_count(),
        device.events.load(Ordering::Relaxed)
    );

    Ok(())
}
