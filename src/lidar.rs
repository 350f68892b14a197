// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common types shared by every HFL decoding stage.
//!
//! This module holds the error taxonomy, the logical channel tags used to
//! route received datagrams, and the model/version capability table that
//! selects protocol layout constants when a driver is constructed.

use clap::ValueEnum;
use std::fmt;

/// Common error type for HFL decoding.
///
/// Decode steps never panic on packet content; every failure surfaces as
/// one of these variants.
#[derive(Debug)]
pub enum Error {
    /// A read of `width` bytes at `offset` does not fit in a `len` byte
    /// buffer. Nothing was written to any output structure.
    Bounds {
        offset: usize,
        width: usize,
        len: usize,
    },
    /// A frame row arrived out of order. The in-flight frame was discarded.
    Sequencing { expected: u32, received: u32 },
    /// The fragment field of a frame packet addresses a row outside the
    /// grid. The in-flight frame was discarded.
    RowOutOfRange(u32),
    /// An object fragment arrived after the batch already held the maximum
    /// number of fragments without a final flag. The batch was discarded.
    BatchOverflow { fragments: usize },
    /// No layout is known for the requested model and version.
    UnsupportedModel(String),
    /// Malformed capture or packet source data.
    InvalidPacket(String),
    /// I/O error from a packet source.
    Io(std::io::Error),
    /// System time error
    SystemTime(std::time::SystemTimeError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Bounds { offset, width, len } => write!(
                f,
                "read of {} bytes at offset {} exceeds {} byte packet",
                width, offset, len
            ),
            Error::Sequencing { expected, received } => write!(
                f,
                "unexpected packet (dropped packet?) expecting row {}, received row {}",
                expected, received
            ),
            Error::RowOutOfRange(fragment) => write!(f, "fragment {} is outside the frame", fragment),
            Error::BatchOverflow { fragments } => write!(
                f,
                "object batch already holds {} fragments without a final flag",
                fragments
            ),
            Error::UnsupportedModel(model) => write!(f, "unsupported sensor model: {}", model),
            Error::InvalidPacket(msg) => write!(f, "invalid packet: {}", msg),
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::SystemTime(err) => write!(f, "system time error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(err: std::time::SystemTimeError) -> Self {
        Error::SystemTime(err)
    }
}

impl Error {
    /// True for faults that discarded an in-flight frame or object batch.
    pub fn is_sequencing(&self) -> bool {
        matches!(
            self,
            Error::Sequencing { .. } | Error::RowOutOfRange(_) | Error::BatchOverflow { .. }
        )
    }
}

/// Logical channel a datagram was received on.
///
/// The sensor emits each stream on its own UDP port; mapping ports to
/// channels happens outside the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Depth, intensity and classification rows
    Frame,
    /// Object track lists
    Object,
    /// Sensor health
    Telemetry,
    /// Slice data (accepted, not decoded)
    Slice,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Channel::Frame => write!(f, "frame"),
            Channel::Object => write!(f, "object"),
            Channel::Telemetry => write!(f, "telemetry"),
            Channel::Slice => write!(f, "slice"),
        }
    }
}

/// A received datagram tagged with its logical channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPacket {
    pub channel: Channel,
    pub data: Vec<u8>,
}

impl RawPacket {
    pub fn new(channel: Channel, data: Vec<u8>) -> Self {
        Self { channel, data }
    }
}

/// Byte offsets and dimensions of one sensor protocol revision.
///
/// Every decoder reads its constants from here rather than hard coding
/// them, so supporting another revision means adding a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Grid rows, one packet per row
    pub rows: usize,
    /// Grid columns
    pub columns: usize,
    /// Returns per pixel
    pub returns: usize,
    /// Frame counter (BE u32)
    pub frame_counter_offset: usize,
    /// Row fragment index (BE u32)
    pub fragment_offset: usize,
    /// First calibration float
    pub calibration_offset: usize,
    /// First pixel byte of the row
    pub pixel_base: usize,
    /// Intensity block relative to `pixel_base`
    pub intensity_offset: usize,
    /// Classification block relative to `pixel_base`
    pub classification_offset: usize,
    /// Bytes per column in the range and intensity blocks
    pub column_stride: usize,
    /// First object record
    pub object_start: usize,
    /// Bytes per object record
    pub object_stride: usize,
    /// Continuation flag word (BE u32, bit 0)
    pub object_flag_offset: usize,
    /// Records accepted from the first fragment of a batch
    pub objects_first_fragment: usize,
    /// Maximum records per batch
    pub objects_per_batch: usize,
    /// Fragments per batch
    pub fragments_per_batch: usize,
    /// Serial number field in the telemetry packet
    pub serial_offset: usize,
    /// Serial number length
    pub serial_len: usize,
}

impl FrameLayout {
    /// Pixels in one frame.
    pub const fn pixels(&self) -> usize {
        self.rows * self.columns
    }

    /// Point records produced per frame.
    pub const fn points(&self) -> usize {
        self.pixels() * self.returns
    }

    /// Smallest frame packet that holds a full row.
    pub const fn min_frame_packet(&self) -> usize {
        self.pixel_base + self.classification_offset + self.columns
    }

    /// Smallest telemetry packet.
    pub const fn min_telemetry_packet(&self) -> usize {
        self.serial_offset + self.serial_len
    }
}

/// HFL110DCU v1 layout.
pub const HFL110DCU_V1: FrameLayout = FrameLayout {
    rows: 32,
    columns: 128,
    returns: 2,
    frame_counter_offset: 12,
    fragment_offset: 16,
    calibration_offset: 20,
    pixel_base: 92,
    intensity_offset: 512,
    classification_offset: 1152,
    column_stride: 4,
    object_start: 14,
    object_stride: 129,
    object_flag_offset: 10,
    objects_first_fragment: 11,
    objects_per_batch: 20,
    fragments_per_batch: 2,
    serial_offset: 41,
    serial_len: 26,
};

/// Supported sensor model and firmware revision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SensorModel {
    /// Continental HFL110DCU, protocol v1
    #[default]
    #[value(name = "hfl110dcu-v1")]
    Hfl110dcuV1,
}

impl SensorModel {
    /// Look up a model by its name and version strings.
    pub fn lookup(model: &str, version: &str) -> Result<Self, Error> {
        match (model, version) {
            ("hfl110dcu", "v1") => Ok(SensorModel::Hfl110dcuV1),
            _ => Err(Error::UnsupportedModel(format!("{} {}", model, version))),
        }
    }

    /// Protocol constants for this model.
    pub fn layout(&self) -> &'static FrameLayout {
        match self {
            SensorModel::Hfl110dcuV1 => &HFL110DCU_V1,
        }
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SensorModel::Hfl110dcuV1 => write!(f, "hfl110dcu v1"),
        }
    }
}

/// Get current timestamp in nanoseconds.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` for best accuracy.
/// On other platforms, falls back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000_000 + tp.tv_nsec as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH)?;
    Ok(duration.as_nanos() as u64)
}

/// Wall-clock time in nanoseconds since the Unix epoch, or 0 if the
/// system clock is set before it.
pub fn system_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
