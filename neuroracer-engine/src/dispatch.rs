//! Cue dispatcher: one best-effort UDP datagram per cue.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Mutex;
use std::sync::PoisonError;

use neuroracer_core::{CueCommand, CueModality};
use tracing::{debug, error, warn};

use crate::error::{EngineError, EngineResult};

/// Delivers a fired cue to the presentation system. Must not block and must
/// not fail the caller. Returns the payload that went out, if any did.
pub trait CueSink: Send + Sync {
    fn dispatch(&self, modality: CueModality) -> Option<String>;
}

/// Encodes the wire object for a cue as compact UTF-8 JSON.
pub fn encode_cue(modality: CueModality) -> EngineResult<Vec<u8>> {
    Ok(serde_json::to_vec(&CueCommand::from(modality))?)
}

/// Sends cues to a fixed endpoint without waiting for acknowledgement and
/// without retrying.
pub struct UdpCueDispatcher {
    endpoint: String,
    socket: Option<UdpSocket>,
    target: Mutex<Option<SocketAddr>>,
}

impl UdpCueDispatcher {
    /// Binds an ephemeral local socket. A bind failure is logged and leaves a
    /// dispatcher that drops every cue.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .and_then(|s| s.set_nonblocking(true).map(|_| s))
            .map_err(|e| error!("Failed to bind cue socket: {}", e))
            .ok();
        Self {
            endpoint,
            socket,
            target: Mutex::new(None),
        }
    }

    fn target(&self) -> EngineResult<SocketAddr> {
        let mut cached = self.target.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(addr) = *cached {
            return Ok(addr);
        }
        let addrs: Vec<SocketAddr> = self.endpoint.to_socket_addrs()?.collect();
        // Prefer IPv4 so that "localhost" reaches listeners bound to 0.0.0.0.
        let addr = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| EngineError::Endpoint(self.endpoint.clone()))?;
        *cached = Some(addr);
        Ok(addr)
    }

    fn send(&self, modality: CueModality) -> EngineResult<String> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| EngineError::Endpoint("no local socket".to_string()))?;
        let payload = encode_cue(modality)?;
        let target = self.target()?;
        let sent = socket.send_to(&payload, target)?;
        debug!("{} bytes to {}", sent, target);
        Ok(String::from_utf8_lossy(&payload).into_owned())
    }
}

impl CueSink for UdpCueDispatcher {
    fn dispatch(&self, modality: CueModality) -> Option<String> {
        self.send(modality)
            .map_err(|e| warn!("Error sending {} cue to {}: {}", modality, self.endpoint, e))
            .ok()
    }
}
