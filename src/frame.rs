// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Frame reassembly from row packets.
//!
//! A frame is 32 row packets sent in descending row order. The first
//! packet (row 31) also carries calibration. Each packet is laid out as:
//!
//! ```text
//! ┌────────────┬──────────┬──────────────┬────────────┬──────────────────┐
//! │ 0..12      │ 12: u32  │ 16: u32      │ 20..88     │ 92..             │
//! │ header     │ frame ctr│ fragment idx │ calibration│ pixel block      │
//! └────────────┴──────────┴──────────────┴────────────┴──────────────────┘
//!
//! pixel block (base = 92), column c:
//!   base + 4c        range_1   BE u16   (1/256 m)
//!   base + 4c + 2    range_2   BE u16
//!   base + 512 + 4c  intensity_1 / intensity_2   BE u16
//!   base + 1152 + c  classification byte
//! ```
//!
//! The fragment index counts up from 0 while rows count down, so row =
//! 31 - fragment. A row arriving out of order drops the whole in-flight
//! frame; assembly resumes at the next row-31 packet.

use crate::{
    buffer::{DoubleBuffer, Reset},
    calibration::{CalibrationModel, SensorCalibration},
    decoder::PacketDecoder,
    lidar::{Error, FrameLayout, system_timestamp, timestamp},
};
use ndarray::Array2;
use tracing::{debug, trace, warn};

/// Ranges beyond this are replaced with [`INVALID_RANGE`].
pub const MAX_RANGE: f64 = 49.0;

/// Sentinel stored for out-of-range samples.
pub const INVALID_RANGE: f32 = f32::NAN;

/// True unless `range` is the invalid-range sentinel.
#[inline]
pub fn is_valid_range(range: f32) -> bool {
    !range.is_nan()
}

/// Convert a raw range sample to meters.
///
/// `offset_raw` is the global range offset in raw units (1/256 m).
#[inline]
pub fn decode_range(raw: u16, offset_raw: f64) -> f32 {
    let range = (raw as f64 + offset_raw) / 256.0;
    if range > MAX_RANGE {
        INVALID_RANGE
    } else {
        range as f32
    }
}

/// One of the two echoes measured per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Return {
    First,
    Second,
}

impl Return {
    pub const ALL: [Return; 2] = [Return::First, Return::Second];

    /// Zero-based plane index.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Return::First => 0,
            Return::Second => 1,
        }
    }

    /// One-based number used in point records.
    #[inline]
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

/// Per-return classification flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flag {
    Crosstalk,
    Saturated,
    Superimposed,
}

impl Flag {
    pub const ALL: [Flag; 3] = [Flag::Crosstalk, Flag::Saturated, Flag::Superimposed];
}

/// Classification flags of one return.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelFlags {
    pub crosstalk: bool,
    pub saturated: bool,
    pub superimposed: bool,
}

impl PixelFlags {
    /// Unpack a classification byte. Bits 0, 1, 3 belong to the first
    /// return and bits 4, 5, 7 to the second.
    pub fn unpack(classification: u8) -> [PixelFlags; 2] {
        let bit = |n: u8| (classification >> n) & 1 == 1;
        [
            PixelFlags {
                crosstalk: bit(0),
                saturated: bit(1),
                superimposed: bit(3),
            },
            PixelFlags {
                crosstalk: bit(4),
                saturated: bit(5),
                superimposed: bit(7),
            },
        ]
    }

    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Crosstalk => self.crosstalk,
            Flag::Saturated => self.saturated,
            Flag::Superimposed => self.superimposed,
        }
    }
}

/// Decoded values of one pixel, both returns.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PixelSample {
    pub range: [f32; 2],
    pub intensity: [u16; 2],
    pub flags: [PixelFlags; 2],
}

#[derive(Debug, Clone)]
struct ReturnPlanes {
    range: Array2<f32>,
    intensity: Array2<u16>,
    crosstalk: Array2<bool>,
    saturated: Array2<bool>,
    superimposed: Array2<bool>,
}

impl ReturnPlanes {
    fn new(rows: usize, columns: usize) -> Self {
        Self {
            range: Array2::zeros((rows, columns)),
            intensity: Array2::zeros((rows, columns)),
            crosstalk: Array2::from_elem((rows, columns), false),
            saturated: Array2::from_elem((rows, columns), false),
            superimposed: Array2::from_elem((rows, columns), false),
        }
    }

    fn flag(&self, flag: Flag) -> &Array2<bool> {
        match flag {
            Flag::Crosstalk => &self.crosstalk,
            Flag::Saturated => &self.saturated,
            Flag::Superimposed => &self.superimposed,
        }
    }
}

/// One frame of range, intensity and classification images.
///
/// Images are `rows × columns`, indexed `[row, column]`.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    frame_counter: u32,
    timestamp: u64,
    calibration: SensorCalibration,
    returns: [ReturnPlanes; 2],
    rows_written: Vec<bool>,
}

impl FrameBuffer {
    pub fn new(layout: &FrameLayout) -> Self {
        Self {
            frame_counter: 0,
            timestamp: 0,
            calibration: SensorCalibration::default(),
            returns: [
                ReturnPlanes::new(layout.rows, layout.columns),
                ReturnPlanes::new(layout.rows, layout.columns),
            ],
            rows_written: vec![false; layout.rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows_written.len()
    }

    pub fn columns(&self) -> usize {
        self.returns[0].range.ncols()
    }

    /// Frame counter reported by the sensor.
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    /// Host timestamp (ns) taken when the start-of-frame packet arrived.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Calibration carried by this frame's first packet.
    pub fn calibration(&self) -> &SensorCalibration {
        &self.calibration
    }

    /// Range image in meters. Out-of-range samples hold [`INVALID_RANGE`].
    pub fn range(&self, ret: Return) -> &Array2<f32> {
        &self.returns[ret.index()].range
    }

    pub fn intensity(&self, ret: Return) -> &Array2<u16> {
        &self.returns[ret.index()].intensity
    }

    pub fn flag(&self, ret: Return, flag: Flag) -> &Array2<bool> {
        self.returns[ret.index()].flag(flag)
    }

    /// Classification flag rendered as an 8-bit mask image (0 or 255).
    pub fn mask(&self, ret: Return, flag: Flag) -> Array2<u8> {
        self.flag(ret, flag).mapv(|set| if set { 255 } else { 0 })
    }

    /// Decoded values at one pixel.
    pub fn pixel(&self, row: usize, col: usize) -> PixelSample {
        let mut sample = PixelSample::default();
        for ret in Return::ALL {
            let planes = &self.returns[ret.index()];
            let i = ret.index();
            sample.range[i] = planes.range[[row, col]];
            sample.intensity[i] = planes.intensity[[row, col]];
            sample.flags[i] = PixelFlags {
                crosstalk: planes.crosstalk[[row, col]],
                saturated: planes.saturated[[row, col]],
                superimposed: planes.superimposed[[row, col]],
            };
        }
        sample
    }

    /// True once every row has been written.
    pub fn is_complete(&self) -> bool {
        self.rows_written.iter().all(|&written| written)
    }

    fn begin(&mut self, frame_counter: u32, timestamp: u64, calibration: SensorCalibration) {
        self.reset();
        self.frame_counter = frame_counter;
        self.timestamp = timestamp;
        self.calibration = calibration;
    }

    fn write_row(&mut self, row: usize, samples: &[PixelSample]) {
        for ret in Return::ALL {
            let i = ret.index();
            let planes = &mut self.returns[i];
            for (col, sample) in samples.iter().enumerate() {
                planes.range[[row, col]] = sample.range[i];
                planes.intensity[[row, col]] = sample.intensity[i];
                planes.crosstalk[[row, col]] = sample.flags[i].crosstalk;
                planes.saturated[[row, col]] = sample.flags[i].saturated;
                planes.superimposed[[row, col]] = sample.flags[i].superimposed;
            }
        }
        self.rows_written[row] = true;
    }
}

impl Reset for FrameBuffer {
    /// Image data is not zeroed; `rows_written` tracks validity.
    fn reset(&mut self) {
        self.rows_written.iter_mut().for_each(|written| *written = false);
    }
}

/// Position in the row sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblerState {
    /// Waiting for a row-31 packet.
    AwaitingStart,
    /// A frame is in flight and `expected_row` is the next row.
    Accumulating { expected_row: u32 },
}

/// Reassembles frames from row packets.
///
/// The assembler exclusively owns its in-flight frame; a completed frame
/// is swapped into a ready buffer and handed out by reference, so a
/// partially written frame is never visible.
#[derive(Debug)]
pub struct FrameAssembler {
    layout: &'static FrameLayout,
    state: AssemblerState,
    frames: DoubleBuffer<FrameBuffer>,
    scratch: Vec<PixelSample>,
    completed: u64,
    dropped: u64,
}

impl FrameAssembler {
    pub fn new(layout: &'static FrameLayout) -> Self {
        Self {
            layout,
            state: AssemblerState::AwaitingStart,
            frames: DoubleBuffer::new(FrameBuffer::new(layout), FrameBuffer::new(layout)),
            scratch: vec![PixelSample::default(); layout.columns],
            completed: 0,
            dropped: 0,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Frames completed so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// In-flight frames discarded on sequencing faults.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Last completed frame.
    pub fn last_frame(&self) -> Option<&FrameBuffer> {
        match self.completed {
            0 => None,
            _ => Some(self.frames.ready()),
        }
    }

    /// Drop any in-flight frame and wait for the next start packet.
    pub fn reset(&mut self) {
        if matches!(self.state, AssemblerState::Accumulating { .. }) {
            self.dropped += 1;
        }
        self.frames.discard();
        self.state = AssemblerState::AwaitingStart;
    }

    fn max_row(&self) -> u32 {
        self.layout.rows as u32 - 1
    }

    /// Ingest one row packet.
    ///
    /// Returns the completed frame after row 0. A [`Error::Bounds`] leaves
    /// every buffer untouched; a sequencing fault discards the in-flight
    /// frame.
    pub fn ingest(
        &mut self,
        data: &[u8],
        calibration: &mut CalibrationModel,
        range_offset_raw: f64,
    ) -> Result<Option<&FrameBuffer>, Error> {
        let layout = self.layout;
        let decoder = PacketDecoder::with_min_len(data, layout.min_frame_packet())?;
        let frame_counter = decoder.read_be_u32(layout.frame_counter_offset)?;
        let fragment = decoder.read_be_u32(layout.fragment_offset)?;

        let max_row = self.max_row();
        if fragment > max_row {
            warn!("fragment {} outside frame, dropping frame", fragment);
            self.reset();
            return Err(Error::RowOutOfRange(fragment));
        }
        let row = max_row - fragment;

        let expected = match self.state {
            AssemblerState::AwaitingStart => max_row,
            AssemblerState::Accumulating { expected_row } => expected_row,
        };
        if row != expected {
            match self.state {
                AssemblerState::Accumulating { .. } => warn!(
                    "unexpected packet (dropped packet?) expecting: {}, received: {}",
                    expected, row
                ),
                AssemblerState::AwaitingStart => {
                    debug!("waiting for start of frame, skipping row {}", row)
                }
            }
            self.reset();
            return Err(Error::Sequencing {
                expected,
                received: row,
            });
        }

        // Decode everything before touching shared state.
        let start = if row == max_row {
            Some(SensorCalibration::decode(
                &decoder,
                layout.calibration_offset,
            )?)
        } else {
            None
        };
        decode_row(&decoder, layout, range_offset_raw, &mut self.scratch)?;

        if let Some(cal) = start {
            calibration.refresh(&cal);
            let now = timestamp().unwrap_or_else(|err| {
                debug!("monotonic clock unavailable ({}), using system time", err);
                system_timestamp()
            });
            self.frames.filling_mut().begin(frame_counter, now, cal);
            trace!("frame {} started", frame_counter);
        }
        self.frames.filling_mut().write_row(row as usize, &self.scratch);

        if row == 0 {
            self.state = AssemblerState::AwaitingStart;
            self.completed += 1;
            debug_assert!(self.frames.filling().is_complete());
            return Ok(Some(self.frames.swap()));
        }

        self.state = AssemblerState::Accumulating {
            expected_row: row - 1,
        };
        Ok(None)
    }
}

/// Decode the pixel block of one row packet into `out`.
fn decode_row(
    decoder: &PacketDecoder,
    layout: &FrameLayout,
    range_offset_raw: f64,
    out: &mut [PixelSample],
) -> Result<(), Error> {
    let base = layout.pixel_base;
    for (col, sample) in out.iter_mut().enumerate().take(layout.columns) {
        let range_at = base + col * layout.column_stride;
        let intensity_at = base + layout.intensity_offset + col * layout.column_stride;

        sample.range = [
            decode_range(decoder.read_be_u16(range_at)?, range_offset_raw),
            decode_range(decoder.read_be_u16(range_at + 2)?, range_offset_raw),
        ];
        sample.intensity = [
            decoder.read_be_u16(intensity_at)?,
            decoder.read_be_u16(intensity_at + 2)?,
        ];
        sample.flags =
            PixelFlags::unpack(decoder.read_u8(base + layout.classification_offset + col)?);
    }
    Ok(())
}
