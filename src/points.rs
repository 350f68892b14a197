// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Depth-to-point projection.
//!
//! Points are expressed in the sensor's optical frame; the composed pose is
//! published alongside the cloud rather than applied to it.

use crate::{
    calibration::RayTable,
    frame::{Flag, FrameBuffer, Return},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// One projected return.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub intensity: u16,
    /// 1 or 2
    pub return_index: u8,
    pub crosstalk: bool,
    pub saturated: bool,
    pub superimposed: bool,
}

/// Projects completed frames into an ordered point sequence.
///
/// Output order is row-major over pixels with the first return of each
/// pixel immediately followed by its second return. Consumers index the
/// sequence positionally, so the order is part of the contract. Invalid
/// ranges are projected as-is and yield NaN coordinates.
#[derive(Debug, Clone, Default)]
pub struct PointCloudBuilder {
    points: Vec<PointRecord>,
}

impl PointCloudBuilder {
    /// Builder with room for `capacity` points.
    pub fn new(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Points from the last projection.
    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }

    /// Project `frame` through `rays`, replacing the previous points.
    #[instrument(skip_all)]
    pub fn project(&mut self, frame: &FrameBuffer, rays: &RayTable) -> &[PointRecord] {
        self.points.clear();

        let rows = frame.rows().min(rays.rows());
        let columns = frame.columns().min(rays.columns());
        for row in 0..rows {
            for col in 0..columns {
                let ray = rays.get(row, col);
                for ret in Return::ALL {
                    let range = frame.range(ret)[[row, col]];
                    self.points.push(PointRecord {
                        x: ray[0] * range,
                        y: ray[1] * range,
                        z: ray[2] * range,
                        intensity: frame.intensity(ret)[[row, col]],
                        return_index: ret.number(),
                        crosstalk: frame.flag(ret, Flag::Crosstalk)[[row, col]],
                        saturated: frame.flag(ret, Flag::Saturated)[[row, col]],
                        superimposed: frame.flag(ret, Flag::Superimposed)[[row, col]],
                    });
                }
            }
        }

        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calibration::{CalibrationModel, Intrinsics},
        frame::FrameAssembler,
        lidar::HFL110DCU_V1,
    };

    /// Packet for `row` where range_1 encodes the pixel index and range_2
    /// is fixed at 1 m.
    fn row_packet(row: u32) -> Vec<u8> {
        let mut data = vec![0u8; HFL110DCU_V1.min_frame_packet()];
        data[16..20].copy_from_slice(&(31 - row).to_be_bytes());
        for (i, v) in [100.0f32, 100.0, 64.0, 16.0].iter().enumerate() {
            data[20 + i * 4..24 + i * 4].copy_from_slice(&v.to_ne_bytes());
        }
        for col in 0..128usize {
            let r = 92 + col * 4;
            data[r..r + 2].copy_from_slice(&((row as u16) * 8 + 1).to_be_bytes());
            data[r + 2..r + 4].copy_from_slice(&256u16.to_be_bytes());
            let i = 92 + 512 + col * 4;
            data[i..i + 2].copy_from_slice(&(col as u16).to_be_bytes());
            data[i + 2..i + 4].copy_from_slice(&(row as u16).to_be_bytes());
            data[92 + 1152 + col] = if col % 2 == 0 { 0b0001_0000 } else { 0b0000_0010 };
        }
        data
    }

    fn assemble() -> (FrameBuffer, CalibrationModel) {
        let mut assembler = FrameAssembler::new(&HFL110DCU_V1);
        let mut calibration = CalibrationModel::new(&HFL110DCU_V1);
        let mut frame = None;
        for row in (0..=31).rev() {
            frame = assembler
                .ingest(&row_packet(row), &mut calibration, 0.0)
                .unwrap()
                .cloned();
        }
        (frame.unwrap(), calibration)
    }

    #[test]
    fn test_point_order() {
        let (frame, calibration) = assemble();
        let mut builder = PointCloudBuilder::new(HFL110DCU_V1.points());
        let points = builder.project(&frame, calibration.ray_table());
        assert_eq!(points.len(), 8192);

        for (i, point) in points.iter().enumerate() {
            let pixel = i / 2;
            let (row, col) = (pixel / 128, pixel % 128);
            assert_eq!(point.return_index as usize, i % 2 + 1);
            if point.return_index == 1 {
                assert_eq!(point.intensity as usize, col);
                assert!(!point.crosstalk);
                assert_eq!(point.saturated, col % 2 == 1);
            } else {
                assert_eq!(point.intensity as usize, row);
                assert_eq!(point.crosstalk, col % 2 == 0);
                assert!(!point.saturated);
                // Second return is exactly 1 m along the ray
                let n = (point.x * point.x + point.y * point.y + point.z * point.z).sqrt();
                assert!((n - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_projection_uses_ray_table() {
        let (frame, _) = assemble();
        let rays = RayTable::build(
            &Intrinsics {
                fx: 100.0,
                fy: 100.0,
                ux: 5.0,
                uy: 3.0,
                ..Default::default()
            },
            32,
            128,
        );
        let mut builder = PointCloudBuilder::default();
        let points = builder.project(&frame, &rays);

        // Principal point projects straight down the optical axis
        let p = points[(3 * 128 + 5) * 2];
        let range = frame.range(Return::First)[[3, 5]];
        assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6);
        assert!((p.z - range).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_ranges_projected() {
        let (frame, calibration) = assemble();
        let mut planes = frame;
        // Pixel (0, 0) first return is 50 m, past the valid limit
        let mut assembler = FrameAssembler::new(&HFL110DCU_V1);
        let mut model = calibration.clone();
        for row in (0..=31).rev() {
            let mut packet = row_packet(row);
            packet[92..94].copy_from_slice(&12800u16.to_be_bytes());
            if let Some(f) = assembler.ingest(&packet, &mut model, 0.0).unwrap() {
                planes = f.clone();
            }
        }

        let mut builder = PointCloudBuilder::new(8192);
        let points = builder.project(&planes, model.ray_table());
        assert_eq!(points.len(), 8192);
        assert!(points[0].x.is_nan() && points[0].z.is_nan());
        assert!(!points[1].z.is_nan());
        assert_eq!(builder.points().len(), 8192);
    }

    #[test]
    fn test_projection_reuses_allocation() {
        let (frame, calibration) = assemble();
        let mut builder = PointCloudBuilder::new(8192);
        builder.project(&frame, calibration.ray_table());
        let ptr = builder.points().as_ptr();
        builder.project(&frame, calibration.ray_table());
        assert_eq!(ptr, builder.points().as_ptr());
    }
}
