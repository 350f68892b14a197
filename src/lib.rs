// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! EdgeFirst HFL110DCU Library
//!
//! Decoder for the UDP protocol of the Continental HFL110DCU flash lidar.
//! Row packets are reassembled into frames of range, intensity and
//! classification images, projected through a calibrated ray table into
//! point clouds, and published together with the sensor pose. Object-track
//! lists and telemetry are decoded from their own streams.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────────────────────────────┐
//! │  PacketSource   │     │                HflDriver                     │
//! │  (pcap / test)  │ ──► │  frame ──► FrameAssembler ──► PointCloud     │
//! │  tagged packets │     │                 │ calibration     Builder    │
//! └─────────────────┘     │                 ▼                  ▲         │
//!                         │          CalibrationModel ─────────┘         │
//!                         │                 ▲  ray table + pose          │
//!                         │          ExtrinsicStore                      │
//!                         │  object ──► ObjectListAssembler              │
//!                         │  telemetry ──► TelemetryDecoder              │
//!                         └──────────────────────────────────────────────┘
//! ```
//!
//! Processing is synchronous and call-per-packet. Each assembler owns its
//! in-flight unit exclusively and hands out a completed unit only once
//! fully assembled; a dropped or malformed packet discards the in-flight
//! unit and assembly resumes at the next start-of-unit packet.
//!
//! # Modules
//!
//! - [`lidar`]: Error type, channel tags and the sensor capability table
//! - [`decoder`]: Bounds-checked packet reader
//! - [`frame`]: Frame images and row reassembly
//! - [`calibration`]: Ray table and pose composition
//! - [`extrinsics`]: Configurable pose and range offsets
//! - [`points`]: Depth-to-point projection
//! - [`objects`]: Object-track lists
//! - [`telemetry`]: Sensor health
//! - [`driver`]: Per-connection driver tying the stages together
//! - [`buffer`]: Double buffering of completed frames and batches
//! - [`packet_source`]: Packet source abstraction and replay loop
//! - `pcap_source`: Capture replay (feature `pcap`)
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_hfl::{HflDriver, lidar::{Channel, RawPacket}, driver::Output};
//!
//! let mut driver = HflDriver::from_model("hfl110dcu", "v1")?;
//!
//! loop {
//!     let packet: RawPacket = next_packet();
//!     match driver.process(&packet) {
//!         Ok(Some(Output::Frame(frame))) => {
//!             let points = frame.points;      // 8192 records, row-major
//!             let pose = frame.pose;          // sensor → world
//!         }
//!         Ok(Some(Output::Objects(objects))) => { /* up to 20 tracks */ }
//!         Ok(Some(Output::Telemetry(telemetry))) => { /* health */ }
//!         Ok(None) => {}
//!         Err(err) => tracing::debug!("{}", err),
//!     }
//! }
//! ```

pub mod buffer;
pub mod calibration;
pub mod decoder;
pub mod driver;
pub mod extrinsics;
pub mod frame;
pub mod lidar;
pub mod objects;
pub mod packet_source;
#[cfg(feature = "pcap")]
pub mod pcap_source;
pub mod points;
pub mod telemetry;

// Re-exports for convenience
pub use calibration::{CalibrationModel, RayTable};
pub use decoder::PacketDecoder;
pub use driver::HflDriver;
pub use extrinsics::ExtrinsicStore;
pub use frame::{FrameAssembler, FrameBuffer};
pub use lidar::{Channel, Error, RawPacket, SensorModel};
pub use objects::{ObjectListAssembler, ObjectRecord};
pub use packet_source::PacketSource;
#[cfg(feature = "pcap")]
pub use pcap_source::PcapSource;
pub use points::{PointCloudBuilder, PointRecord};
pub use telemetry::{TelemetryDecoder, TelemetryRecord};
