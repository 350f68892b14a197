// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_hfl::{extrinsics::ExtrinsicOverride, lidar::SensorModel, pcap_source::PortMap};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// PCAP or PCAPNG capture of the sensor's UDP streams.
    #[arg(env)]
    pub pcap: PathBuf,

    /// Sensor model and protocol revision.
    #[arg(long, env, default_value = "hfl110dcu-v1")]
    pub model: SensorModel,

    /// UDP port carrying frame row packets
    #[arg(long, env, default_value = "57410")]
    pub frame_port: u16,

    /// UDP port carrying object packets
    #[arg(long, env, default_value = "57412")]
    pub object_port: u16,

    /// UDP port carrying telemetry packets
    #[arg(long, env, default_value = "57413")]
    pub telemetry_port: u16,

    /// UDP port carrying slice packets
    #[arg(long, env)]
    pub slice_port: Option<u16>,

    /// Range bias in meters added to every decoded range.
    #[arg(long, env, allow_negative_numbers = true)]
    pub global_range_offset: Option<f64>,

    /// Sensor translation "x y z" in meters, replacing the pose reported
    /// by the sensor.
    #[arg(
        long,
        env,
        value_delimiter = ' ',
        num_args = 3,
        allow_negative_numbers = true
    )]
    pub tf_vec: Option<Vec<f64>>,

    /// Sensor rotation "roll pitch yaw" in radians, replacing the pose
    /// reported by the sensor.
    #[arg(
        long,
        env,
        value_delimiter = ' ',
        num_args = 3,
        allow_negative_numbers = true
    )]
    pub tf_rpy: Option<Vec<f64>>,

    /// Print completed frames, object batches and telemetry as JSON lines
    #[arg(long, env)]
    pub json: bool,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}

impl Args {
    pub fn port_map(&self) -> PortMap {
        PortMap {
            frame: self.frame_port,
            object: self.object_port,
            telemetry: self.telemetry_port,
            slice: self.slice_port,
        }
    }

    /// Configuration overrides for the driver's extrinsic store.
    pub fn extrinsic_override(&self) -> ExtrinsicOverride {
        let component = |values: &Option<Vec<f64>>, i: usize| {
            values.as_ref().and_then(|v| v.get(i).copied())
        };

        ExtrinsicOverride {
            global_range_offset: self.global_range_offset,
            x: component(&self.tf_vec, 0),
            y: component(&self.tf_vec, 1),
            z: component(&self.tf_vec, 2),
            roll: component(&self.tf_rpy, 0),
            pitch: component(&self.tf_rpy, 1),
            yaw: component(&self.tf_rpy, 2),
        }
    }
}
