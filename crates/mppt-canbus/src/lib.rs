//! mppt-canbus: discovery, telemetry and charge control for MPPT solar chargers on a
//! ThingSet-style CAN bus

pub mod cbor;
pub mod protocol;

mod types;
pub use types::{DeviceRecord, DeviceStatus, Telemetry};

mod error;
pub use error::{CommandError, DecodeError, EncodeError, RegistryError};

mod clock;
pub use clock::{Clock, ManualClock, MonotonicClock};

mod rules;
pub use rules::{RuleFlag, RuleOutcome};

mod config;
pub use config::{load_config_file, MpptConfig, TelemetryConfig, TelemetryMode};

mod registry;
pub use registry::DeviceRegistry;

mod decode;
pub use decode::{apply_sample, classify, ingest, DropReason, FrameDisposition, TelemetrySample};

mod encode;
pub use encode::{
    discovery_command, encode_absorption_voltage, encode_enable, encode_float_voltage,
    encode_max_current, encode_target_voltage, Command,
};

mod source;
pub use source::{SyntheticGenerator, TelemetrySource};

mod metrics;
pub use metrics::{MetricsHub, MpptMetrics};

mod manager;
pub use manager::{MpptManager, TickReport};

mod interlock;

mod status;
pub use status::{ControlRequest, DeviceView, StatusReport};
