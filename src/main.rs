// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! `hfl-replay`: decode an HFL110DCU capture offline.

mod args;

use args::Args;
use clap::Parser;
use edgefirst_hfl::{
    HflDriver, PcapSource,
    driver::{FrameOutput, Output},
    frame::is_valid_range,
    packet_source::replay,
};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(args.rust_log.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut driver = HflDriver::new(args.model);
    driver.configure(&args.extrinsic_override());
    info!(
        "{} range offset {} m reconfigured {}",
        driver.model(),
        driver.extrinsics().global_range_offset(),
        driver.extrinsics().reconfigured()
    );

    let mut source = PcapSource::from_file(&args.pcap, &args.port_map())?;
    info!("loaded {} packets from {}", source.len(), args.pcap.display());

    let json = args.json;
    let stats = replay(&mut source, &mut driver, |output| report(output, json)).await?;

    info!(
        "{} packets: {} frames, {} object batches, {} telemetry, {} sequencing errors, {} short packets",
        stats.packets,
        stats.frames,
        stats.object_batches,
        stats.telemetry,
        stats.sequencing_errors,
        stats.bounds_errors
    );

    Ok(())
}

fn report(output: Output<'_>, json: bool) {
    match output {
        Output::Frame(frame) => report_frame(&frame, json),
        Output::Objects(objects) => {
            if json {
                let records: Vec<_> = objects
                    .iter()
                    .map(|o| json!({ "object": o, "bounding_box": o.bounding_box() }))
                    .collect();
                println!("{}", json!({ "type": "objects", "objects": records }));
            } else {
                info!("object batch with {} records", objects.len());
            }
        }
        Output::Telemetry(telemetry) => {
            if json {
                println!("{}", json!({ "type": "telemetry", "telemetry": telemetry }));
            } else {
                info!(
                    "telemetry serial {} sensor {:.1}C heater {:.1}C frame {}",
                    telemetry.serial_string(),
                    telemetry.sensor_temperature,
                    telemetry.heater_temperature,
                    telemetry.frame_counter
                );
            }
        }
    }
}

fn report_frame(output: &FrameOutput<'_>, json: bool) {
    let valid = output
        .points
        .iter()
        .filter(|p| is_valid_range(p.z))
        .count();
    let translation = output.pose.translation;

    if json {
        let line = json!({
            "type": "frame",
            "frame_counter": output.frame.frame_counter(),
            "timestamp": output.frame.timestamp(),
            "points": output.points.len(),
            "valid_points": valid,
            "calibration": output.frame.calibration(),
            "pose": {
                "translation": [translation.x, translation.y, translation.z],
                "rotation": output.pose.quaternion(),
            },
        });
        println!("{}", line);
    } else if valid == 0 {
        warn!("frame {} has no valid points", output.frame.frame_counter());
    } else {
        info!(
            "frame {} with {} of {} points valid",
            output.frame.frame_counter(),
            valid,
            output.points.len()
        );
    }
}
