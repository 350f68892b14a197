// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Object-track list reassembly.
//!
//! The sensor sends up to 20 tracked objects per cycle split across at most
//! two packets. Each packet starts with a small header followed by fixed
//! 129-byte records:
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────┬──────────────┬─────
//! │ 0..10    │ 10: BE u32   │ 14: record 0 │ 143: record 1│ ...
//! │ header   │ bit 0 = last │ 129 bytes    │ 129 bytes    │
//! └──────────┴──────────────┴──────────────┴──────────────┴─────
//! ```
//!
//! The first fragment contributes at most 11 records and the batch is
//! capped at 20. Records that do not fit completely in the packet are
//! skipped without error.

use crate::{
    buffer::DoubleBuffer,
    decoder::PacketDecoder,
    lidar::{Error, FrameLayout},
};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Track lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectState {
    Deleted,
    New,
    Measured,
    Predicted,
    DeletedForMerge,
    NewFromMerge,
    Unknown(u8),
}

impl From<u8> for ObjectState {
    fn from(value: u8) -> Self {
        match value {
            0 => ObjectState::Deleted,
            1 => ObjectState::New,
            2 => ObjectState::Measured,
            3 => ObjectState::Predicted,
            4 => ObjectState::DeletedForMerge,
            5 => ObjectState::NewFromMerge,
            other => ObjectState::Unknown(other),
        }
    }
}

/// Motion classification of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicProperty {
    Moving,
    Stationary,
    Oncoming,
    StationaryCandidate,
    Unknown,
    CrossingStationary,
    CrossingMoving,
    Stopped,
    Other(u8),
}

impl From<u8> for DynamicProperty {
    fn from(value: u8) -> Self {
        match value {
            0 => DynamicProperty::Moving,
            1 => DynamicProperty::Stationary,
            2 => DynamicProperty::Oncoming,
            3 => DynamicProperty::StationaryCandidate,
            4 => DynamicProperty::Unknown,
            5 => DynamicProperty::CrossingStationary,
            6 => DynamicProperty::CrossingMoving,
            7 => DynamicProperty::Stopped,
            other => DynamicProperty::Other(other),
        }
    }
}

/// Object class reported by the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectClass {
    Point,
    Car,
    Truck,
    Person,
    Motorcycle,
    Bicycle,
    Wide,
    Unclassified,
    OtherVehicle,
    TrafficLight,
    Unknown(u8),
}

impl From<u8> for ObjectClass {
    fn from(value: u8) -> Self {
        match value {
            0 => ObjectClass::Point,
            1 => ObjectClass::Car,
            2 => ObjectClass::Truck,
            3 => ObjectClass::Person,
            4 => ObjectClass::Motorcycle,
            5 => ObjectClass::Bicycle,
            6 => ObjectClass::Wide,
            7 => ObjectClass::Unclassified,
            8 => ObjectClass::OtherVehicle,
            9 => ObjectClass::TrafficLight,
            other => ObjectClass::Unknown(other),
        }
    }
}

/// Object footprint and placement, meters and radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x_rear_right: f32,
    pub y_rear_right: f32,
    pub x_rear_left: f32,
    pub y_rear_left: f32,
    pub x_front_left: f32,
    pub y_front_left: f32,
    pub height: f32,
    pub ground_offset: f32,
    pub dist_x: f32,
    pub dist_y: f32,
    pub yaw: f32,
}

/// Velocities, accelerations and their cross terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Kinematics {
    pub vabs_x: f32,
    pub vabs_y: f32,
    pub vrel_x: f32,
    pub vrel_y: f32,
    pub aabs_x: f32,
    pub dist_x_dist_y: f32,
    pub dist_x_vx: f32,
    pub dist_x_vy: f32,
    pub dist_x_ax: f32,
    pub dist_x_ay: f32,
    pub dist_y_vx: f32,
    pub dist_y_vy: f32,
    pub dist_y_ax: f32,
    pub dist_y_ay: f32,
    pub vx_vy: f32,
    pub vx_ax: f32,
    pub vx_ay: f32,
    pub vy_ax: f32,
    pub vy_ay: f32,
    pub ax_ay: f32,
}

/// One decoded object track.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub geometry: Geometry,
    pub kinematics: Kinematics,
    pub state: ObjectState,
    pub dynamic_property: DynamicProperty,
    pub quality: u8,
    pub classification: ObjectClass,
    /// Percent
    pub confidence: u8,
}

/// Oriented box derived from an object's corners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub center: [f32; 3],
    pub length: f32,
    pub width: f32,
    pub height: f32,
    pub yaw: f32,
}

impl ObjectRecord {
    /// Bytes per record.
    pub const LEN: usize = 129;

    /// Decode one record starting at `offset`.
    pub fn decode(decoder: &PacketDecoder, offset: usize) -> Result<Self, Error> {
        decoder.require(offset, Self::LEN)?;
        let f = |rel: usize| decoder.read_raw_f32(offset + rel);
        let b = |rel: usize| decoder.read_u8(offset + rel);

        Ok(ObjectRecord {
            geometry: Geometry {
                x_rear_right: f(0)?,
                y_rear_right: f(4)?,
                x_rear_left: f(8)?,
                y_rear_left: f(12)?,
                x_front_left: f(16)?,
                y_front_left: f(20)?,
                height: f(24)?,
                ground_offset: f(28)?,
                dist_x: f(32)?,
                dist_y: f(36)?,
                yaw: f(40)?,
            },
            kinematics: Kinematics {
                vabs_x: f(44)?,
                vabs_y: f(48)?,
                vrel_x: f(52)?,
                vrel_y: f(56)?,
                aabs_x: f(60)?,
                dist_x_dist_y: f(64)?,
                dist_x_vx: f(68)?,
                dist_x_vy: f(72)?,
                dist_x_ax: f(76)?,
                dist_x_ay: f(80)?,
                dist_y_vx: f(84)?,
                dist_y_vy: f(88)?,
                dist_y_ax: f(92)?,
                dist_y_ay: f(96)?,
                vx_vy: f(100)?,
                vx_ax: f(104)?,
                vx_ay: f(108)?,
                vy_ax: f(112)?,
                vy_ay: f(116)?,
                ax_ay: f(120)?,
            },
            state: b(124)?.into(),
            dynamic_property: b(125)?.into(),
            quality: b(126)?,
            classification: b(127)?.into(),
            confidence: b(128)?,
        })
    }

    /// Box centred between the rear-right and front-left corners, shifted
    /// by the position offset and resting on the ground offset.
    pub fn bounding_box(&self) -> BoundingBox {
        let g = &self.geometry;
        let length = (g.x_front_left - g.x_rear_left).hypot(g.y_front_left - g.y_rear_left);
        let width = (g.x_rear_right - g.x_rear_left).hypot(g.y_rear_right - g.y_rear_left);

        BoundingBox {
            center: [
                g.x_rear_right + 0.5 * (g.x_front_left - g.x_rear_right) + g.dist_x,
                g.y_rear_right + 0.5 * (g.y_front_left - g.y_rear_right) + g.dist_y,
                g.ground_offset + g.height / 2.0,
            ],
            length,
            width,
            height: g.height + g.ground_offset,
            yaw: g.yaw,
        }
    }
}

/// Reassembles object batches from fragment packets.
#[derive(Debug)]
pub struct ObjectListAssembler {
    layout: &'static FrameLayout,
    batches: DoubleBuffer<Vec<ObjectRecord>>,
    fragments: usize,
    emitted: u64,
}

impl ObjectListAssembler {
    pub fn new(layout: &'static FrameLayout) -> Self {
        Self {
            layout,
            batches: DoubleBuffer::new(
                Vec::with_capacity(layout.objects_per_batch),
                Vec::with_capacity(layout.objects_per_batch),
            ),
            fragments: 0,
            emitted: 0,
        }
    }

    /// Records accumulated for the batch in flight.
    pub fn pending(&self) -> &[ObjectRecord] {
        self.batches.filling()
    }

    /// Fragments accepted into the batch in flight.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Batches emitted so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Last emitted batch.
    pub fn last_batch(&self) -> Option<&[ObjectRecord]> {
        match self.emitted {
            0 => None,
            _ => Some(self.batches.ready().as_slice()),
        }
    }

    /// Drop the batch in flight.
    pub fn reset(&mut self) {
        self.batches.discard();
        self.fragments = 0;
    }

    /// Ingest one object packet.
    ///
    /// Returns the completed batch when the packet carries the final flag.
    pub fn ingest(&mut self, data: &[u8]) -> Result<Option<&[ObjectRecord]>, Error> {
        let layout = self.layout;
        let decoder = PacketDecoder::with_min_len(data, layout.object_start)?;
        let last = decoder.read_be_u32(layout.object_flag_offset)? & 1 == 1;

        if self.fragments >= layout.fragments_per_batch {
            let fragments = self.fragments;
            warn!(
                "object batch holds {} fragments without a final flag, dropping batch",
                fragments
            );
            self.reset();
            return Err(Error::BatchOverflow { fragments });
        }

        let limit = match self.fragments {
            0 => layout.objects_first_fragment,
            _ => layout.objects_per_batch,
        };

        let batch = self.batches.filling_mut();
        let mut offset = layout.object_start;
        while batch.len() < limit && decoder.require(offset, ObjectRecord::LEN).is_ok() {
            batch.push(ObjectRecord::decode(&decoder, offset)?);
            offset += layout.object_stride;
        }
        self.fragments += 1;
        trace!(
            "object fragment {} last={} total={}",
            self.fragments,
            last,
            batch.len()
        );

        if !last {
            return Ok(None);
        }

        self.fragments = 0;
        self.emitted += 1;
        Ok(Some(self.batches.swap().as_slice()))
    }
}
