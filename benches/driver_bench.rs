// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Benchmarks for HFL110DCU frame assembly and point cloud generation.
//!
//! Measures:
//! - Row packet decoding and frame assembly
//! - Ray table construction (the cost avoided by lazy calibration refresh)
//! - Depth-to-point projection
//! - The full frame pipeline through the driver
//!
//! Run with: cargo bench --bench driver_bench

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use edgefirst_hfl::{
    CalibrationModel, FrameAssembler, HflDriver, PointCloudBuilder, RayTable,
    calibration::Intrinsics, lidar::HFL110DCU_V1,
};

const INTRINSICS: [f32; 9] = [95.0, 96.0, 64.2, 16.1, -0.12, 0.03, 0.001, -0.002, 0.01];

/// One synthetic frame: 32 row packets with a ramp of ranges.
fn frame_packets() -> Vec<Vec<u8>> {
    (0..32u32)
        .rev()
        .map(|row| {
            let mut data = vec![0u8; HFL110DCU_V1.min_frame_packet()];
            data[16..20].copy_from_slice(&(31 - row).to_be_bytes());
            for (i, v) in INTRINSICS.iter().enumerate() {
                data[20 + i * 4..24 + i * 4].copy_from_slice(&v.to_ne_bytes());
            }
            for col in 0..128usize {
                let range = (256 + row as usize * 128 + col * 16) as u16;
                let r = 92 + col * 4;
                data[r..r + 2].copy_from_slice(&range.to_be_bytes());
                data[r + 2..r + 4].copy_from_slice(&(range * 2).to_be_bytes());
                let i = 92 + 512 + col * 4;
                data[i..i + 2].copy_from_slice(&(col as u16 * 100).to_be_bytes());
                data[92 + 1152 + col] = (col % 256) as u8;
            }
            data
        })
        .collect()
}

fn intrinsics() -> Intrinsics {
    let k = INTRINSICS;
    Intrinsics {
        fx: k[0],
        fy: k[1],
        ux: k[2],
        uy: k[3],
        r1: k[4],
        r2: k[5],
        t1: k[6],
        t2: k[7],
        r4: k[8],
    }
}

fn bench_assembly(c: &mut Criterion) {
    let packets = frame_packets();
    let total_bytes: usize = packets.iter().map(|p| p.len()).sum();

    let mut group = c.benchmark_group("hfl110dcu");
    group.throughput(Throughput::Bytes(total_bytes as u64));

    // Steady state: intrinsics unchanged so the ray table is cached
    group.bench_function("frame_assembly", |b| {
        let mut assembler = FrameAssembler::new(&HFL110DCU_V1);
        let mut calibration = CalibrationModel::new(&HFL110DCU_V1);
        b.iter(|| {
            let mut completed = 0;
            for packet in &packets {
                if let Ok(Some(frame)) = assembler.ingest(packet, &mut calibration, 0.0) {
                    completed += 1;
                    std::hint::black_box(frame.frame_counter());
                }
            }
            completed
        });
    });

    group.bench_function("full_pipeline", |b| {
        let mut driver = HflDriver::default();
        b.iter(|| {
            let mut points = 0;
            for packet in &packets {
                if let Ok(Some(output)) = driver.process_frame(packet) {
                    points += output.points.len();
                }
            }
            std::hint::black_box(points)
        });
    });

    group.finish();
}

fn bench_calibration(c: &mut Criterion) {
    let k = intrinsics();
    let mut group = c.benchmark_group("calibration");
    group.throughput(Throughput::Elements(HFL110DCU_V1.pixels() as u64));

    group.bench_function("ray_table_build", |b| {
        b.iter(|| std::hint::black_box(RayTable::build(&k, 32, 128)));
    });

    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let packets = frame_packets();
    let mut assembler = FrameAssembler::new(&HFL110DCU_V1);
    let mut calibration = CalibrationModel::new(&HFL110DCU_V1);
    let mut frame = None;
    for packet in &packets {
        if let Ok(Some(completed)) = assembler.ingest(packet, &mut calibration, 0.0) {
            frame = Some(completed.clone());
        }
    }
    let Some(frame) = frame else {
        eprintln!("Skipping projection benchmark: synthetic frame did not assemble");
        return;
    };

    let mut group = c.benchmark_group("projection");
    group.throughput(Throughput::Elements(HFL110DCU_V1.points() as u64));
    group.bench_function("project", |b| {
        let mut builder = PointCloudBuilder::new(HFL110DCU_V1.points());
        b.iter(|| {
            std::hint::black_box(builder.project(&frame, calibration.ray_table()).len());
        });
    });
    group.finish();
}

criterion_group!(benches, bench_assembly, bench_calibration, bench_projection);
criterion_main!(benches);
