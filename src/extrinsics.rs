// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Externally configured pose offsets and global range offset.
//!
//! Values arrive through a configuration surface (CLI arguments, a
//! parameter server) and are read by the calibration stage on every frame.
//! The store performs no validation; bounds are the configuration
//! surface's responsibility.

use serde::{Deserialize, Serialize};

/// A set of override values as delivered by a configuration surface.
///
/// Fields left as `None` keep their current value in the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicOverride {
    /// Global range offset in meters
    pub global_range_offset: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
}

impl ExtrinsicOverride {
    /// True if any pose component is set.
    pub fn has_pose(&self) -> bool {
        self.x.is_some()
            || self.y.is_some()
            || self.z.is_some()
            || self.roll.is_some()
            || self.pitch.is_some()
            || self.yaw.is_some()
    }
}

/// Mutable pose-offset scalars with a "reconfigured" flag.
///
/// Each pose component is tracked separately. Only components that were
/// set replace the sensor-reported value, and only while the store is
/// reconfigured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtrinsicStore {
    global_range_offset: f64,
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    roll: Option<f64>,
    pitch: Option<f64>,
    yaw: Option<f64>,
    reconfigured: bool,
}

impl ExtrinsicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global range offset in meters.
    pub fn global_range_offset(&self) -> f64 {
        self.global_range_offset
    }

    /// Global range offset in raw range units (1/256 m).
    pub fn global_range_offset_raw(&self) -> f64 {
        self.global_range_offset * 256.0
    }

    pub fn set_global_range_offset(&mut self, offset: f64) {
        self.global_range_offset = offset;
    }

    /// Overridden x, y and z, `None` where the sensor value is kept.
    pub fn translation(&self) -> [Option<f64>; 3] {
        [self.x, self.y, self.z]
    }

    /// Overridden roll, pitch and yaw in radians.
    pub fn rotation(&self) -> [Option<f64>; 3] {
        [self.roll, self.pitch, self.yaw]
    }

    pub fn set_translation_x(&mut self, x: f64) {
        self.x = Some(x);
    }

    pub fn set_translation_y(&mut self, y: f64) {
        self.y = Some(y);
    }

    pub fn set_translation_z(&mut self, z: f64) {
        self.z = Some(z);
    }

    pub fn set_rotation_roll(&mut self, roll: f64) {
        self.roll = Some(roll);
    }

    pub fn set_rotation_pitch(&mut self, pitch: f64) {
        self.pitch = Some(pitch);
    }

    pub fn set_rotation_yaw(&mut self, yaw: f64) {
        self.yaw = Some(yaw);
    }

    /// Forget every pose override. The range offset is kept.
    pub fn clear_pose(&mut self) {
        self.x = None;
        self.y = None;
        self.z = None;
        self.roll = None;
        self.pitch = None;
        self.yaw = None;
        self.reconfigured = false;
    }

    /// When set, the overridden components replace the sensor-reported
    /// ones.
    pub fn reconfigured(&self) -> bool {
        self.reconfigured
    }

    pub fn set_reconfigured(&mut self, reconfigured: bool) {
        self.reconfigured = reconfigured;
    }

    /// Resolve a sensor-reported `[x, y, z, roll, pitch, yaw]` against the
    /// overrides.
    pub fn resolve(&self, sensor: [f64; 6]) -> [f64; 6] {
        if !self.reconfigured {
            return sensor;
        }
        let overrides = [self.x, self.y, self.z, self.roll, self.pitch, self.yaw];
        let mut pose = sensor;
        for (value, over) in pose.iter_mut().zip(overrides) {
            if let Some(over) = over {
                *value = over;
            }
        }
        pose
    }

    /// Apply an override set. Any pose component marks the store as
    /// reconfigured.
    pub fn apply(&mut self, config: &ExtrinsicOverride) {
        if let Some(offset) = config.global_range_offset {
            self.global_range_offset = offset;
        }
        self.x = config.x.or(self.x);
        self.y = config.y.or(self.y);
        self.z = config.z.or(self.z);
        self.roll = config.roll.or(self.roll);
        self.pitch = config.pitch.or(self.pitch);
        self.yaw = config.yaw.or(self.yaw);
        if config.has_pose() {
            self.reconfigured = true;
        }
    }
}
