//! NMEA source - UDP listener for NMEA-0183 receivers.
//!
//! Many GPS receivers and phone apps ("GPS over network") can stream NMEA
//! sentences to a UDP port. This source listens on that port and turns the
//! sentences into fixes and status events.
//!
//! # Event mapping
//!
//! - GGA with a fix: a fix, then `FirstFix` once, then `SatelliteStatus`
//! - GGA without a fix: `SatelliteStatus` only (the fix goes stale)
//! - RMC: remembers the date; a valid RMC counts as a fix only when the
//!   receiver never sends GGA

mod protocol;

pub use protocol::{parse_sentence, GgaFix, NmeaSentence, RmcFix};

use std::net::UdpSocket as StdUdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::source::{FixSink, PositionSource, SourceError};
use super::state::{GpsEvent, RawFix};

/// Default NMEA-over-UDP port.
pub const DEFAULT_NMEA_PORT: u16 = 10110;

/// Maximum datagram size we expect.
const MAX_PACKET_SIZE: usize = 2048;

/// NMEA source configuration.
#[derive(Debug, Clone)]
pub struct NmeaSourceConfig {
    /// UDP port to listen on. 0 picks a free port.
    pub port: u16,

    /// Timeout for socket receive operations.
    pub recv_timeout: Duration,
}

impl Default for NmeaSourceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_NMEA_PORT,
            recv_timeout: Duration::from_millis(500),
        }
    }
}

/// Position source reading NMEA sentences from UDP.
pub struct NmeaSource {
    config: NmeaSourceConfig,
    enabled: AtomicBool,
    running: Mutex<Option<CancellationToken>>,
    bound_port: Mutex<Option<u16>>,
}

impl NmeaSource {
    pub fn new(config: NmeaSourceConfig) -> Self {
        Self {
            config,
            enabled: AtomicBool::new(true),
            running: Mutex::new(None),
            bound_port: Mutex::new(None),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(NmeaSourceConfig::default())
    }

    /// Port actually bound while running.
    pub fn local_port(&self) -> Option<u16> {
        *self.bound_port.lock()
    }
}

impl PositionSource for NmeaSource {
    fn name(&self) -> &str {
        "nmea"
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn start(&self, sink: Arc<dyn FixSink>) -> Result<(), SourceError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| SourceError::NoRuntime(self.name().to_string()))?;

        // Stop the previous listener first so a fixed port can be rebound.
        self.stop();

        let port = self.config.port;
        let bind_err = |e| SourceError::SocketBind { port, source: e };
        let socket = StdUdpSocket::bind(("0.0.0.0", port)).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;
        let local_port = socket.local_addr().map_err(bind_err)?.port();

        let token = CancellationToken::new();
        *self.running.lock() = Some(token.clone());
        *self.bound_port.lock() = Some(local_port);

        info!(port = local_port, "NMEA listener started");
        handle.spawn(run_listener(socket, self.config.clone(), sink, token));
        Ok(())
    }

    fn stop(&self) {
        if let Some(token) = self.running.lock().take() {
            token.cancel();
        }
        self.bound_port.lock().take();
    }
}

/// Per-connection decoding state.
#[derive(Debug, Default)]
struct NmeaState {
    first_fix_sent: bool,
    gga_seen: bool,
    date: Option<NaiveDate>,
    sentences: u64,
    fixes: u64,
}

impl NmeaState {
    fn timestamp(&self, time: Option<NaiveTime>) -> DateTime<Utc> {
        match (self.date, time) {
            (Some(date), Some(time)) => date.and_time(time).and_utc(),
            (None, Some(time)) => Utc::now().date_naive().and_time(time).and_utc(),
            _ => Utc::now(),
        }
    }

    fn handle(&mut self, sentence: NmeaSentence, sink: &dyn FixSink) {
        self.sentences += 1;
        match sentence {
            NmeaSentence::Gga(gga) => {
                self.gga_seen = true;
                match (gga.has_fix(), gga.latitude, gga.longitude) {
                    (true, Some(lat), Some(lon)) => {
                        let altitude = gga.altitude.unwrap_or(0.0);
                        let fix = RawFix::at(lon, lat, altitude, self.timestamp(gga.time));
                        self.deliver(fix, sink);
                    }
                    _ => {
                        trace!(satellites = gga.satellites, "GGA without fix");
                        sink.on_status(GpsEvent::SatelliteStatus);
                    }
                }
            }
            NmeaSentence::Rmc(rmc) => {
                if rmc.date.is_some() {
                    self.date = rmc.date;
                }
                if self.gga_seen || !rmc.valid {
                    return;
                }
                if let (Some(lat), Some(lon)) = (rmc.latitude, rmc.longitude) {
                    let fix = RawFix::at(lon, lat, 0.0, self.timestamp(rmc.time));
                    self.deliver(fix, sink);
                }
            }
        }
    }

    fn deliver(&mut self, fix: RawFix, sink: &dyn FixSink) {
        self.fixes += 1;
        sink.on_fix(Some(fix));
        if !self.first_fix_sent {
            self.first_fix_sent = true;
            info!(
                lat = format!("{:.6}", fix.latitude),
                lon = format!("{:.6}", fix.longitude),
                "First NMEA fix"
            );
            sink.on_status(GpsEvent::FirstFix);
        }
        sink.on_status(GpsEvent::SatelliteStatus);
    }
}

async fn run_listener(
    socket: StdUdpSocket,
    config: NmeaSourceConfig,
    sink: Arc<dyn FixSink>,
    cancellation: CancellationToken,
) {
    let socket = match UdpSocket::from_std(socket) {
        Ok(socket) => socket,
        Err(e) => {
            warn!(error = %e, "Failed to register NMEA socket with the runtime");
            sink.on_status(GpsEvent::Stopped);
            return;
        }
    };

    let mut buffer = [0u8; MAX_PACKET_SIZE];
    let mut state = NmeaState::default();

    loop {
        let recv = tokio::select! {
            _ = cancellation.cancelled() => break,
            recv = tokio::time::timeout(config.recv_timeout, socket.recv(&mut buffer)) => recv,
        };

        match recv {
            Ok(Ok(len)) => {
                let text = String::from_utf8_lossy(&buffer[..len]);
                for line in text.lines() {
                    match parse_sentence(line) {
                        Some(sentence) => state.handle(sentence, sink.as_ref()),
                        None => trace!(line = %line, "Skipping NMEA line"),
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "UDP receive error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Err(_) => {
                trace!("No NMEA data received (timeout)");
            }
        }
    }

    debug!(
        sentences = state.sentences,
        fixes = state.fixes,
        "NMEA listener stopped"
    );
}
