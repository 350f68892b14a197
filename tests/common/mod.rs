// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Synthetic HFL110DCU packets for integration tests.

#![allow(dead_code)]

pub const FRAME_PACKET_LEN: usize = 1372;
pub const PIXEL_BASE: usize = 92;

/// Builder for one frame row packet.
#[derive(Clone)]
pub struct RowPacket {
    data: Vec<u8>,
}

impl RowPacket {
    pub fn new(row: u32) -> Self {
        let mut data = vec![0u8; FRAME_PACKET_LEN];
        data[16..20].copy_from_slice(&(31 - row).to_be_bytes());
        Self { data }
    }

    pub fn frame_counter(mut self, counter: u32) -> Self {
        self.data[12..16].copy_from_slice(&counter.to_be_bytes());
        self
    }

    /// fx, fy, ux, uy, r1, r2, t1, t2, r4
    pub fn intrinsics(mut self, k: [f32; 9]) -> Self {
        for (i, v) in k.iter().enumerate() {
            self.set_f32(20 + i * 4, *v);
        }
        self
    }

    pub fn pose(mut self, x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Self {
        self.set_f32(64, yaw);
        self.set_f32(68, pitch);
        self.set_f32(72, roll);
        self.set_f32(76, z);
        self.set_f32(80, y);
        self.set_f32(84, x);
        self
    }

    pub fn range(mut self, col: usize, first: u16, second: u16) -> Self {
        let at = PIXEL_BASE + col * 4;
        self.data[at..at + 2].copy_from_slice(&first.to_be_bytes());
        self.data[at + 2..at + 4].copy_from_slice(&second.to_be_bytes());
        self
    }

    pub fn all_ranges(mut self, first: u16, second: u16) -> Self {
        for col in 0..128 {
            self = self.range(col, first, second);
        }
        self
    }

    pub fn intensity(mut self, col: usize, first: u16, second: u16) -> Self {
        let at = PIXEL_BASE + 512 + col * 4;
        self.data[at..at + 2].copy_from_slice(&first.to_be_bytes());
        self.data[at + 2..at + 4].copy_from_slice(&second.to_be_bytes());
        self
    }

    pub fn classification(mut self, col: usize, byte: u8) -> Self {
        self.data[PIXEL_BASE + 1152 + col] = byte;
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    fn set_f32(&mut self, at: usize, v: f32) {
        self.data[at..at + 4].copy_from_slice(&v.to_ne_bytes());
    }
}

pub const PINHOLE: [f32; 9] = [100.0, 100.0, 64.0, 16.0, 0.0, 0.0, 0.0, 0.0, 0.0];

/// A full frame of rows 31..=0 with uniform ranges.
pub fn frame(counter: u32, intrinsics: [f32; 9], first: u16, second: u16) -> Vec<Vec<u8>> {
    (0..32u32)
        .rev()
        .map(|row| {
            let packet = RowPacket::new(row)
                .frame_counter(counter)
                .all_ranges(first, second);
            if row == 31 {
                packet.intrinsics(intrinsics).build()
            } else {
                packet.build()
            }
        })
        .collect()
}

/// Object packet with `records` records; record `n` has x_rear_right = seed + n.
pub fn object_packet(records: usize, last: bool, seed: f32) -> Vec<u8> {
    let mut data = vec![0u8; 14];
    data[10..14].copy_from_slice(&(last as u32).to_be_bytes());
    for n in 0..records {
        let mut record = vec![0u8; 129];
        record[0..4].copy_from_slice(&(seed + n as f32).to_ne_bytes());
        record[124] = 2;
        record[127] = 1;
        record[128] = 80;
        data.extend(record);
    }
    data
}

/// Telemetry packet whose serial field holds `serial` in wire order.
pub fn telemetry_packet(wire_serial: &[u8; 26]) -> Vec<u8> {
    let mut data = vec![0u8; 41];
    data[0..4].copy_from_slice(&2u32.to_be_bytes());
    data[4..8].copy_from_slice(&35.0f32.to_ne_bytes());
    data[8..12].copy_from_slice(&(-20.0f32).to_ne_bytes());
    data[12..16].copy_from_slice(&77u32.to_be_bytes());
    data.extend_from_slice(wire_serial);
    data
}
