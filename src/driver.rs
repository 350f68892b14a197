// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! HFL110DCU driver.
//!
//! One [`HflDriver`] per sensor connection owns every decoding stage and
//! exposes one ingest entry point per logical channel:
//!
//! | Channel   | Entry point                       | Output per completed unit   |
//! |-----------|-----------------------------------|-----------------------------|
//! | frame     | [`HflDriver::process_frame`]      | frame images, points, pose  |
//! | object    | [`HflDriver::process_objects`]    | up to 20 object records     |
//! | telemetry | [`HflDriver::process_telemetry`]  | one telemetry record        |
//! | slice     | [`HflDriver::process_slice`]      | nothing                     |
//!
//! Processing is synchronous and call-per-packet. Completed units are
//! returned by reference into the driver's ready buffers and stay valid
//! until the next call.

use crate::{
    calibration::{CalibrationModel, Intrinsics, Pose, SensorCalibration},
    extrinsics::{ExtrinsicOverride, ExtrinsicStore},
    frame::{FrameAssembler, FrameBuffer},
    lidar::{Channel, Error, FrameLayout, RawPacket, SensorModel},
    objects::{ObjectListAssembler, ObjectRecord},
    points::{PointCloudBuilder, PointRecord},
    telemetry::{TelemetryDecoder, TelemetryRecord},
};
use tracing::trace;

/// Everything produced by a completed frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameOutput<'a> {
    pub frame: &'a FrameBuffer,
    pub points: &'a [PointRecord],
    pub pose: Pose,
}

/// Output of [`HflDriver::process`].
#[derive(Debug, Clone, Copy)]
pub enum Output<'a> {
    Frame(FrameOutput<'a>),
    Objects(&'a [ObjectRecord]),
    Telemetry(&'a TelemetryRecord),
}

/// Decoder for a single HFL sensor connection.
#[derive(Debug)]
pub struct HflDriver {
    model: SensorModel,
    frames: FrameAssembler,
    calibration: CalibrationModel,
    extrinsics: ExtrinsicStore,
    points: PointCloudBuilder,
    objects: ObjectListAssembler,
    telemetry: TelemetryDecoder,
}

impl HflDriver {
    pub fn new(model: SensorModel) -> Self {
        let layout = model.layout();
        Self {
            model,
            frames: FrameAssembler::new(layout),
            calibration: CalibrationModel::new(layout),
            extrinsics: ExtrinsicStore::new(),
            points: PointCloudBuilder::new(layout.points()),
            objects: ObjectListAssembler::new(layout),
            telemetry: TelemetryDecoder::new(layout),
        }
    }

    /// Create a driver from model and version strings, e.g.
    /// `("hfl110dcu", "v1")`.
    pub fn from_model(model: &str, version: &str) -> Result<Self, Error> {
        Ok(Self::new(SensorModel::lookup(model, version)?))
    }

    pub fn model(&self) -> SensorModel {
        self.model
    }

    pub fn layout(&self) -> &'static FrameLayout {
        self.model.layout()
    }

    /// Route a tagged packet to its channel's entry point.
    pub fn process(&mut self, packet: &RawPacket) -> Result<Option<Output<'_>>, Error> {
        match packet.channel {
            Channel::Frame => Ok(self.process_frame(&packet.data)?.map(Output::Frame)),
            Channel::Object => Ok(self.process_objects(&packet.data)?.map(Output::Objects)),
            Channel::Telemetry => Ok(Some(Output::Telemetry(
                self.process_telemetry(&packet.data)?,
            ))),
            Channel::Slice => {
                self.process_slice(&packet.data);
                Ok(None)
            }
        }
    }

    /// Ingest a frame row packet. After row 0 the completed frame is
    /// projected and returned with the composed sensor pose.
    pub fn process_frame(&mut self, data: &[u8]) -> Result<Option<FrameOutput<'_>>, Error> {
        let offset = self.extrinsics.global_range_offset_raw();
        let frame = match self.frames.ingest(data, &mut self.calibration, offset)? {
            Some(frame) => frame,
            None => return Ok(None),
        };

        let pose = CalibrationModel::apply_extrinsics(&frame.calibration().pose, &self.extrinsics);
        let points = self.points.project(frame, self.calibration.ray_table());
        trace!(
            "frame {} complete with {} points",
            frame.frame_counter(),
            points.len()
        );

        Ok(Some(FrameOutput {
            frame,
            points,
            pose,
        }))
    }

    /// Ingest an object packet, returning the batch once complete.
    pub fn process_objects(&mut self, data: &[u8]) -> Result<Option<&[ObjectRecord]>, Error> {
        self.objects.ingest(data)
    }

    pub fn process_telemetry(&mut self, data: &[u8]) -> Result<&TelemetryRecord, Error> {
        self.telemetry.decode(data)
    }

    /// Slice packets carry no decoded content.
    pub fn process_slice(&mut self, data: &[u8]) {
        trace!("ignoring {} byte slice packet", data.len());
    }

    /// Last calibration block received from the sensor.
    pub fn sensor_calibration(&self) -> Option<&SensorCalibration> {
        self.calibration.current()
    }

    pub fn intrinsics(&self) -> Option<&Intrinsics> {
        self.calibration.intrinsics()
    }

    /// Current composed pose, or `None` before the first start-of-frame.
    pub fn pose(&self) -> Option<Pose> {
        self.calibration
            .current()
            .map(|cal| CalibrationModel::apply_extrinsics(&cal.pose, &self.extrinsics))
    }

    pub fn calibration(&self) -> &CalibrationModel {
        &self.calibration
    }

    pub fn extrinsics(&self) -> &ExtrinsicStore {
        &self.extrinsics
    }

    pub fn extrinsics_mut(&mut self) -> &mut ExtrinsicStore {
        &mut self.extrinsics
    }

    /// Apply configuration overrides.
    pub fn configure(&mut self, config: &ExtrinsicOverride) {
        self.extrinsics.apply(config);
    }

    pub fn frames(&self) -> &FrameAssembler {
        &self.frames
    }

    pub fn objects(&self) -> &ObjectListAssembler {
        &self.objects
    }

    pub fn telemetry(&self) -> Option<&TelemetryRecord> {
        self.telemetry.last()
    }
}

impl Default for HflDriver {
    fn default() -> Self {
        Self::new(SensorModel::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_packet(row: u32, fx: f32) -> Vec<u8> {
        let mut data = vec![0u8; 1372];
        data[16..20].copy_from_slice(&(31 - row).to_be_bytes());
        for (i, v) in [fx, fx, 64.0f32, 16.0].iter().enumerate() {
            data[20 + i * 4..24 + i * 4].copy_from_slice(&v.to_ne_bytes());
        }
        // sensor x = 2.0
        data[84..88].copy_from_slice(&2.0f32.to_ne_bytes());
        for col in 0..128 {
            data[92 + col * 4..94 + col * 4].copy_from_slice(&2560u16.to_be_bytes());
        }
        data
    }

    #[test]
    fn test_from_model() {
        let driver = HflDriver::from_model("hfl110dcu", "v1").unwrap();
        assert_eq!(driver.model(), SensorModel::Hfl110dcuV1);
        assert_eq!(driver.layout().rows, 32);
        assert!(matches!(
            HflDriver::from_model("hfl110dcu", "v9"),
            Err(Error::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_frame_output() {
        let mut driver = HflDriver::default();
        assert!(driver.pose().is_none());
        for row in (1..=31).rev() {
            assert!(driver.process_frame(&row_packet(row, 100.0)).unwrap().is_none());
        }
        let output = driver.process_frame(&row_packet(0, 100.0)).unwrap().unwrap();
        assert_eq!(output.points.len(), 8192);
        assert_eq!(output.pose.translation.x, 2.0);
        assert!(output.frame.is_complete());

        assert_eq!(driver.intrinsics().unwrap().fx, 100.0);
        assert_eq!(driver.pose().unwrap().translation.x, 2.0);
    }

    #[test]
    fn test_override_pose() {
        let mut driver = HflDriver::default();
        driver.configure(&ExtrinsicOverride {
            x: Some(-1.0),
            ..Default::default()
        });
        let mut pose = None;
        for row in (0..=31).rev() {
            if let Some(output) = driver.process_frame(&row_packet(row, 100.0)).unwrap() {
                pose = Some(output.pose);
            }
        }
        assert_eq!(pose.unwrap().translation.x, -1.0);
    }

    #[test]
    fn test_range_offset() {
        let mut driver = HflDriver::default();
        driver.extrinsics_mut().set_global_range_offset(1.0);
        let mut range = None;
        for row in (0..=31).rev() {
            if let Some(output) = driver.process_frame(&row_packet(row, 100.0)).unwrap() {
                range = Some(output.frame.range(crate::frame::Return::First)[[0, 0]]);
            }
        }
        assert_eq!(range, Some(11.0));
    }

    #[test]
    fn test_process_dispatch() {
        let mut driver = HflDriver::default();

        let mut telemetry = vec![0u8; 67];
        telemetry[12..16].copy_from_slice(&99u32.to_be_bytes());
        match driver
            .process(&RawPacket::new(Channel::Telemetry, telemetry))
            .unwrap()
        {
            Some(Output::Telemetry(rec)) => assert_eq!(rec.frame_counter, 99),
            other => panic!("unexpected output {:?}", other),
        }

        let mut objects = vec![0u8; 14 + 129];
        objects[13] = 1;
        match driver
            .process(&RawPacket::new(Channel::Object, objects))
            .unwrap()
        {
            Some(Output::Objects(batch)) => assert_eq!(batch.len(), 1),
            other => panic!("unexpected output {:?}", other),
        }

        assert!(driver
            .process(&RawPacket::new(Channel::Slice, vec![1, 2, 3]))
            .unwrap()
            .is_none());
        assert!(driver
            .process(&RawPacket::new(Channel::Frame, row_packet(31, 100.0)))
            .unwrap()
            .is_none());
        assert!(driver.telemetry().is_some());
    }

    #[test]
    fn test_sequencing_fault_recovers() {
        let mut driver = HflDriver::default();
        driver.process_frame(&row_packet(31, 100.0)).unwrap();
        let err = driver.process_frame(&row_packet(29, 100.0)).unwrap_err();
        assert!(err.is_sequencing());
        assert_eq!(driver.frames().dropped(), 1);

        let mut completed = 0;
        for row in (0..=31).rev() {
            if driver.process_frame(&row_packet(row, 100.0)).unwrap().is_some() {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
    }
}
