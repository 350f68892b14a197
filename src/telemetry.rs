// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sensor health telemetry.

use crate::{
    decoder::PacketDecoder,
    lidar::{Error, FrameLayout},
};
use serde::{Deserialize, Serialize};

/// Length of the serial number field.
pub const SERIAL_LEN: usize = 26;

/// Decoded telemetry packet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub hardware_revision: u32,
    /// Degrees Celsius
    pub sensor_temperature: f32,
    /// Degrees Celsius, sign corrected
    pub heater_temperature: f32,
    pub frame_counter: u32,
    pub adc_ubatt_sw: f32,
    pub adc_ubatt: f32,
    pub adc_heater_lens: f32,
    pub adc_heater_lens_high: f32,
    pub adc_temp0_lens: f32,
    pub acquisition_period: f32,
    pub temp_sensor_feedback: u8,
    /// Serial number bytes in forward order
    pub serial: [u8; SERIAL_LEN],
}

impl TelemetryRecord {
    /// Serial number as text, without trailing NULs.
    pub fn serial_string(&self) -> String {
        String::from_utf8_lossy(&self.serial)
            .trim_end_matches('\0')
            .to_string()
    }
}

/// Decodes telemetry packets, keeping the most recent record.
#[derive(Debug, Clone)]
pub struct TelemetryDecoder {
    layout: &'static FrameLayout,
    record: TelemetryRecord,
    received: u64,
}

impl TelemetryDecoder {
    pub fn new(layout: &'static FrameLayout) -> Self {
        Self {
            layout,
            record: TelemetryRecord::default(),
            received: 0,
        }
    }

    /// Most recent record, if any packet has been decoded.
    pub fn last(&self) -> Option<&TelemetryRecord> {
        match self.received {
            0 => None,
            _ => Some(&self.record),
        }
    }

    /// Decode a telemetry packet, replacing the stored record.
    ///
    /// The serial number is transmitted last byte first and is reversed
    /// into forward order.
    pub fn decode(&mut self, data: &[u8]) -> Result<&TelemetryRecord, Error> {
        let layout = self.layout;
        let decoder = PacketDecoder::with_min_len(data, layout.min_telemetry_packet())?;
        let serial_bytes = decoder.bytes(layout.serial_offset, layout.serial_len)?;

        let mut serial = [0u8; SERIAL_LEN];
        for (dst, src) in serial.iter_mut().zip(serial_bytes.iter().rev()) {
            *dst = *src;
        }

        self.record = TelemetryRecord {
            hardware_revision: decoder.read_be_u32(0)?,
            sensor_temperature: decoder.read_raw_f32(4)?,
            heater_temperature: -decoder.read_raw_f32(8)?,
            frame_counter: decoder.read_be_u32(12)?,
            adc_ubatt_sw: decoder.read_raw_f32(16)?,
            adc_ubatt: decoder.read_raw_f32(20)?,
            adc_heater_lens: decoder.read_raw_f32(24)?,
            adc_heater_lens_high: decoder.read_raw_f32(28)?,
            adc_temp0_lens: decoder.read_raw_f32(32)?,
            acquisition_period: decoder.read_raw_f32(36)?,
            temp_sensor_feedback: decoder.read_u8(40)?,
            serial,
        };
        self.received += 1;
        Ok(&self.record)
    }
}
