use core::fmt;
use time::OffsetDateTime;

/// Classic CAN carries at most eight data bytes per frame.
pub const MAX_DATA_LEN: usize = 8;

/// CAN FD raises the limit to 64.
pub const MAX_FD_DATA_LEN: usize = 64;

/// 11-bit or 29-bit CAN identifier
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct CanId {
    raw: u32,
    extended: bool,
}

impl CanId {
    pub fn standard(id11: u16) -> Option<Self> {
        if id11 <= 0x7FF {
            Some(Self {
                raw: id11 as u32,
                extended: false,
            })
        } else {
            None
        }
    }

    pub fn extended(id29: u32) -> Option<Self> {
        if id29 <= 0x1FFF_FFFF {
            Some(Self {
                raw: id29,
                extended: true,
            })
        } else {
            None
        }
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }
    pub fn is_extended(&self) -> bool {
        self.extended
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended {
            write!(f, "0x{raw:08X}", raw = self.raw)
        } else {
            write!(f, "0x{raw:03X}", raw = self.raw)
        }
    }
}

/// A CAN data frame; `fd` marks CAN FD framing (payloads up to 64 bytes).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CanFrame {
    pub id: CanId,
    pub len: u8,
    pub data: [u8; MAX_FD_DATA_LEN],
    pub fd: bool,
    pub timestamp: Option<Timestamp>,
}

impl CanFrame {
    /// Returns `None` when `data` does not fit in a classic frame.
    pub fn new(id: CanId, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DATA_LEN {
            return None;
        }
        Self::build(id, data, false)
    }

    /// CAN FD frame; returns `None` above 64 bytes.
    pub fn new_fd(id: CanId, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_FD_DATA_LEN {
            return None;
        }
        Self::build(id, data, true)
    }

    /// Classic framing when the payload fits, FD otherwise.
    pub fn fitting(id: CanId, data: &[u8]) -> Option<Self> {
        Self::new(id, data).or_else(|| Self::new_fd(id, data))
    }

    fn build(id: CanId, data: &[u8], fd: bool) -> Option<Self> {
        let mut buf = [0u8; MAX_FD_DATA_LEN];
        buf.get_mut(..data.len())?.copy_from_slice(data);
        Some(Self {
            id,
            len: u8::try_from(data.len()).ok()?,
            data: buf,
            fd,
            timestamp: None,
        })
    }

    /// The `len` meaningful bytes of `data`.
    pub fn payload(&self) -> &[u8] {
        let len = usize::from(self.len).min(MAX_FD_DATA_LEN);
        &self.data[..len]
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }
}
