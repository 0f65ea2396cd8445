use crate::{CanFrame, CanId, Result, TransportError};

/// Send side of a CAN interface.
///
/// Implementations must be callable from several contexts at once, so `send` takes
/// `&self`. A successful return means the frame was accepted for transmission, not that
/// any remote node received or acted on it.
pub trait CanBus: Send + Sync {
    /// Interface name (e.g., "can0", "mock0").
    fn name(&self) -> &str;

    /// Queue one frame for transmission.
    fn send(&self, frame: &CanFrame) -> Result<()>;

    /// Build an extended frame from a raw 29-bit identifier and send it. Payloads longer
    /// than a classic frame go out with FD framing.
    fn send_extended(&self, identifier: u32, payload: &[u8]) -> Result<()> {
        let id = CanId::extended(identifier).ok_or(TransportError::InvalidFrame("id"))?;
        let frame = CanFrame::fitting(id, payload).ok_or(TransportError::InvalidFrame("len"))?;
        self.send(&frame)
    }
}
