// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Intrinsic and extrinsic calibration.
//!
//! The first row packet of every frame carries the sensor's intrinsics
//! (pinhole plus rational distortion) and its mounting pose. From the
//! intrinsics we build a per-pixel table of unit ray directions, so that
//! projecting a range sample is a single multiply:
//!
//! ```text
//! pixel (u, v) ──undistort──► (x', y', 1) ──normalize──► ray
//! point = ray * range
//! ```
//!
//! Building the table is the expensive part, so it is only redone when the
//! intrinsics reported by the sensor change.

use crate::{
    decoder::PacketDecoder,
    extrinsics::ExtrinsicStore,
    lidar::{Error, FrameLayout},
};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use tracing::info;

/// Fixed-point iterations used to invert the distortion model.
const UNDISTORT_ITERATIONS: usize = 5;

/// Pinhole intrinsics and distortion coefficients reported by the sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Focal length X (pixels)
    pub fx: f32,
    /// Focal length Y (pixels)
    pub fy: f32,
    /// Principal point X (pixels)
    pub ux: f32,
    /// Principal point Y (pixels)
    pub uy: f32,
    /// Radial coefficient k1
    pub r1: f32,
    /// Radial coefficient k2
    pub r2: f32,
    /// Tangential coefficient p1
    pub t1: f32,
    /// Tangential coefficient p2
    pub t2: f32,
    /// Rational denominator coefficient k4
    pub r4: f32,
}

impl Intrinsics {
    fn to_bits(self) -> [u32; 9] {
        [
            self.fx.to_bits(),
            self.fy.to_bits(),
            self.ux.to_bits(),
            self.uy.to_bits(),
            self.r1.to_bits(),
            self.r2.to_bits(),
            self.t1.to_bits(),
            self.t2.to_bits(),
            self.r4.to_bits(),
        ]
    }

    /// Bitwise equality, so NaN fields compare equal to themselves.
    pub fn same_as(&self, other: &Intrinsics) -> bool {
        self.to_bits() == other.to_bits()
    }

    /// Coefficients in rational-polynomial order
    /// `[k1, k2, p1, p2, k3, k4, k5, k6]`.
    pub fn distortion(&self) -> [f64; 8] {
        [
            self.r1 as f64,
            self.r2 as f64,
            self.t1 as f64,
            self.t2 as f64,
            0.0,
            self.r4 as f64,
            0.0,
            0.0,
        ]
    }
}

/// Mounting pose reported by the sensor, in its own axis convention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorPose {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

/// Calibration block carried by the start-of-frame packet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorCalibration {
    pub intrinsics: Intrinsics,
    pub intrinsic_yaw: f32,
    pub intrinsic_pitch: f32,
    pub pose: SensorPose,
}

impl SensorCalibration {
    /// Bytes occupied by the calibration block.
    pub const LEN: usize = 68;

    /// Decode the calibration block starting at `offset`.
    ///
    /// All fields are native-order floats.
    pub fn decode(decoder: &PacketDecoder, offset: usize) -> Result<Self, Error> {
        decoder.require(offset, Self::LEN)?;
        let f = |rel: usize| decoder.read_raw_f32(offset + rel);

        Ok(SensorCalibration {
            intrinsics: Intrinsics {
                fx: f(0)?,
                fy: f(4)?,
                ux: f(8)?,
                uy: f(12)?,
                r1: f(16)?,
                r2: f(20)?,
                t1: f(24)?,
                t2: f(28)?,
                r4: f(32)?,
            },
            intrinsic_yaw: f(36)?,
            intrinsic_pitch: f(40)?,
            pose: SensorPose {
                yaw: f(44)?,
                pitch: f(48)?,
                roll: f(52)?,
                z: f(56)?,
                y: f(60)?,
                x: f(64)?,
            },
        })
    }
}

/// Composed sensor pose in world convention.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub translation: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl Pose {
    /// Rotation as `[x, y, z, w]`.
    pub fn quaternion(&self) -> [f64; 4] {
        let q = self.rotation.quaternion();
        [q.i, q.j, q.k, q.w]
    }
}

/// Per-pixel unit ray directions, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct RayTable {
    rows: usize,
    columns: usize,
    rays: Vec<[f32; 3]>,
}

impl RayTable {
    /// Table of zero rays, used until the sensor reports intrinsics.
    pub fn zeroed(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            rays: vec![[0.0; 3]; rows * columns],
        }
    }

    /// Build the table for a `rows` × `columns` grid.
    pub fn build(intrinsics: &Intrinsics, rows: usize, columns: usize) -> Self {
        let mut rays = Vec::with_capacity(rows * columns);
        for row in 0..rows {
            for col in 0..columns {
                let (x, y) = undistort(col as f64, row as f64, intrinsics);
                let ray = Vector3::new(x, y, 1.0).normalize();
                rays.push([ray.x as f32, ray.y as f32, ray.z as f32]);
            }
        }
        Self {
            rows,
            columns,
            rays,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> [f32; 3] {
        self.rays[row * self.columns + col]
    }

    pub fn as_slice(&self) -> &[[f32; 3]] {
        &self.rays
    }
}

/// Invert the rational distortion model for pixel `(u, v)`, returning
/// normalised image coordinates.
fn undistort(u: f64, v: f64, intrinsics: &Intrinsics) -> (f64, f64) {
    let k = intrinsics.distortion();
    let x0 = (u - intrinsics.ux as f64) / intrinsics.fx as f64;
    let y0 = (v - intrinsics.uy as f64) / intrinsics.fy as f64;
    let (mut x, mut y) = (x0, y0);

    for _ in 0..UNDISTORT_ITERATIONS {
        let r2 = x * x + y * y;
        let icdist = (1.0 + ((k[7] * r2 + k[6]) * r2 + k[5]) * r2)
            / (1.0 + ((k[4] * r2 + k[1]) * r2 + k[0]) * r2);
        if icdist < 0.0 {
            return (x0, y0);
        }
        let dx = 2.0 * k[2] * x * y + k[3] * (r2 + 2.0 * x * x);
        let dy = k[2] * (r2 + 2.0 * y * y) + 2.0 * k[3] * x * y;
        x = (x0 - dx) * icdist;
        y = (y0 - dy) * icdist;
    }

    (x, y)
}

/// Rotation from the sensor's axis convention to the world convention.
pub fn axis_remap() -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(-FRAC_PI_2, 0.0, -FRAC_PI_2)
}

/// Caches the ray table against the intrinsics it was built from.
#[derive(Debug, Clone)]
pub struct CalibrationModel {
    rows: usize,
    columns: usize,
    current: Option<SensorCalibration>,
    table: RayTable,
    rebuilds: usize,
}

impl CalibrationModel {
    pub fn new(layout: &FrameLayout) -> Self {
        Self {
            rows: layout.rows,
            columns: layout.columns,
            current: None,
            table: RayTable::zeroed(layout.rows, layout.columns),
            rebuilds: 0,
        }
    }

    /// Record the calibration from a start-of-frame packet, rebuilding the
    /// ray table only if the intrinsics differ from the cached ones.
    ///
    /// Returns `true` when the table was rebuilt.
    pub fn refresh(&mut self, calibration: &SensorCalibration) -> bool {
        let dirty = match &self.current {
            Some(current) => !current.intrinsics.same_as(&calibration.intrinsics),
            None => true,
        };

        if dirty {
            let k = &calibration.intrinsics;
            info!(
                "intrinsics received from sensor: fx {:.4} fy {:.4} ux {:.4} uy {:.4} \
                 r1 {:.4} r2 {:.4} t1 {:.4} t2 {:.4} r4 {:.4}",
                k.fx, k.fy, k.ux, k.uy, k.r1, k.r2, k.t1, k.t2, k.r4
            );
            let p = &calibration.pose;
            info!(
                "extrinsics received from sensor: x {} y {} z {} roll {} pitch {} yaw {}",
                p.x, p.y, p.z, p.roll, p.pitch, p.yaw
            );
            self.table = RayTable::build(k, self.rows, self.columns);
            self.rebuilds += 1;
        }

        self.current = Some(*calibration);
        dirty
    }

    /// Last calibration received from the sensor.
    pub fn current(&self) -> Option<&SensorCalibration> {
        self.current.as_ref()
    }

    pub fn intrinsics(&self) -> Option<&Intrinsics> {
        self.current.as_ref().map(|c| &c.intrinsics)
    }

    pub fn ray_table(&self) -> &RayTable {
        &self.table
    }

    /// Number of times the ray table has been built.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }

    /// Compose the sensor pose with the axis remap. When the store is
    /// reconfigured, each overridden component replaces the matching
    /// sensor-reported one.
    pub fn apply_extrinsics(sensor: &SensorPose, store: &ExtrinsicStore) -> Pose {
        let [x, y, z, roll, pitch, yaw] = store.resolve([
            sensor.x as f64,
            sensor.y as f64,
            sensor.z as f64,
            sensor.roll as f64,
            sensor.pitch as f64,
            sensor.yaw as f64,
        ]);
        let translation = Vector3::new(x, y, z);

        let orientation = UnitQuaternion::from_euler_angles(roll, pitch, yaw) * axis_remap();
        Pose {
            translation,
            rotation: UnitQuaternion::new_normalize(orientation.into_inner()),
        }
    }
}
