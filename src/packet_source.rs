// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Sources of channel-tagged packets.
//!
//! A [`PacketSource`] yields datagrams that have already been received and
//! tagged with their logical [`Channel`]. Sockets and port demultiplexing
//! live outside the decoder; sources here cover test data and, with the
//! `pcap` feature, capture replay.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_hfl::{HflDriver, lidar::Channel, packet_source::{TestSource, replay}};
//!
//! let mut source = TestSource::tagged([(Channel::Telemetry, vec![0u8; 67])]);
//! let mut driver = HflDriver::default();
//! let stats = replay(&mut source, &mut driver, |output| println!("{:?}", output)).await?;
//! assert_eq!(stats.telemetry, 1);
//! ```

use crate::{
    driver::{HflDriver, Output},
    lidar::{Channel, Error, RawPacket},
};
use std::{future::Future, pin::Pin};
use tracing::{debug, warn};

/// Largest datagram a source is expected to deliver.
pub const MAX_PACKET_SIZE: usize = 65536;

/// Trait for packet sources.
pub trait PacketSource: Send {
    /// Receive the next packet into `buf`.
    ///
    /// # Returns
    /// - `Ok((channel, len))` - channel tag and number of bytes received
    /// - `Err` - I/O or source error
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(Channel, usize), Error>> + Send + 'a>>;

    /// Check if more packets are available.
    fn has_more(&self) -> bool;
}

/// In-memory source over [`RawPacket`]s, delivered in order once.
#[derive(Debug, Clone, Default)]
pub struct TestSource {
    queue: Vec<RawPacket>,
    next: usize,
}

impl TestSource {
    pub fn new(queue: Vec<RawPacket>) -> Self {
        Self { queue, next: 0 }
    }

    /// Build a source from `(channel, payload)` pairs.
    pub fn tagged<I>(packets: I) -> Self
    where
        I: IntoIterator<Item = (Channel, Vec<u8>)>,
    {
        Self::new(
            packets
                .into_iter()
                .map(|(channel, data)| RawPacket::new(channel, data))
                .collect(),
        )
    }

    /// Rewind to the first packet.
    pub fn rewind(&mut self) {
        self.next = 0;
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Packets already delivered.
    pub fn delivered(&self) -> usize {
        self.next
    }
}

impl PacketSource for TestSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(Channel, usize), Error>> + Send + 'a>> {
        Box::pin(async move {
            let packet = self.queue.get(self.next).ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "test source exhausted",
                ))
            })?;
            if packet.data.len() > buf.len() {
                return Err(Error::InvalidPacket(format!(
                    "{} byte {} packet exceeds {} byte buffer",
                    packet.data.len(),
                    packet.channel,
                    buf.len()
                )));
            }

            let len = packet.data.len();
            buf[..len].copy_from_slice(&packet.data);
            self.next += 1;
            Ok((packet.channel, len))
        })
    }

    fn has_more(&self) -> bool {
        self.next < self.queue.len()
    }
}

/// Counters collected by [`replay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub packets: u64,
    pub frames: u64,
    pub object_batches: u64,
    pub telemetry: u64,
    /// Frames or batches discarded on sequencing faults
    pub sequencing_errors: u64,
    /// Packets too short for their channel
    pub bounds_errors: u64,
}

/// Feed every packet from `source` through `driver`, handing completed
/// units to `on_output`.
///
/// Decode errors are counted and logged; processing continues with the
/// next packet. Only source errors end the replay early.
pub async fn replay<S, F>(
    source: &mut S,
    driver: &mut HflDriver,
    mut on_output: F,
) -> Result<ReplayStats, Error>
where
    S: PacketSource + ?Sized,
    F: FnMut(Output<'_>),
{
    let mut stats = ReplayStats::default();
    let mut buf = vec![0u8; MAX_PACKET_SIZE];

    while source.has_more() {
        let (channel, len) = source.recv(&mut buf).await?;
        stats.packets += 1;

        let result = match channel {
            Channel::Frame => driver.process_frame(&buf[..len]).map(|o| o.map(Output::Frame)),
            Channel::Object => driver
                .process_objects(&buf[..len])
                .map(|o| o.map(Output::Objects)),
            Channel::Telemetry => driver
                .process_telemetry(&buf[..len])
                .map(|t| Some(Output::Telemetry(t))),
            Channel::Slice => {
                driver.process_slice(&buf[..len]);
                Ok(None)
            }
        };

        match result {
            Ok(Some(output)) => {
                match output {
                    Output::Frame(_) => stats.frames += 1,
                    Output::Objects(_) => stats.object_batches += 1,
                    Output::Telemetry(_) => stats.telemetry += 1,
                }
                on_output(output);
            }
            Ok(None) => {}
            Err(err) if err.is_sequencing() => {
                debug!("{} packet: {}", channel, err);
                stats.sequencing_errors += 1;
            }
            Err(err @ Error::Bounds { .. }) => {
                warn!("{} packet: {}", channel, err);
                stats.bounds_errors += 1;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_source_delivers_in_order() {
        let mut source = TestSource::tagged([
            (Channel::Frame, vec![1, 2, 3, 4]),
            (Channel::Object, vec![5, 6, 7, 8, 9, 10]),
            (Channel::Telemetry, vec![11, 12]),
        ]);
        assert_eq!(source.len(), 3);

        let mut buf = [0u8; 16];
        let mut received = Vec::new();
        while source.has_more() {
            let (channel, len) = source.recv(&mut buf).await.unwrap();
            received.push((channel, buf[..len].to_vec()));
        }
        assert_eq!(
            received,
            vec![
                (Channel::Frame, vec![1, 2, 3, 4]),
                (Channel::Object, vec![5, 6, 7, 8, 9, 10]),
                (Channel::Telemetry, vec![11, 12]),
            ]
        );
        assert_eq!(source.delivered(), 3);
        assert!(matches!(source.recv(&mut buf).await, Err(Error::Io(_))));

        source.rewind();
        let (channel, _) = source.recv(&mut buf).await.unwrap();
        assert_eq!(channel, Channel::Frame);
    }

    #[tokio::test]
    async fn test_source_rejects_oversized_packet() {
        let mut source = TestSource::new(vec![RawPacket::new(Channel::Slice, vec![0u8; 32])]);
        let mut buf = [0u8; 8];
        assert!(matches!(
            source.recv(&mut buf).await,
            Err(Error::InvalidPacket(_))
        ));
        // Not consumed
        assert!(source.has_more());
    }

    #[tokio::test]
    async fn test_empty_source() {
        let mut source = TestSource::default();
        assert!(source.is_empty());
        assert!(!source.has_more());

        let mut driver = HflDriver::default();
        let stats = replay(&mut source, &mut driver, |_| {}).await.unwrap();
        assert_eq!(stats, ReplayStats::default());
    }

    #[tokio::test]
    async fn test_replay_counts_errors() {
        let mut objects = vec![0u8; 14];
        objects[13] = 1;
        let packets = vec![
            (Channel::Telemetry, vec![0u8; 67]),
            (Channel::Telemetry, vec![0u8; 10]),
            (Channel::Object, objects),
            (Channel::Slice, vec![0u8; 100]),
            // Row 30 without a start packet
            (Channel::Frame, {
                let mut row = vec![0u8; 1372];
                row[19] = 1;
                row
            }),
        ];
        let mut source = TestSource::tagged(packets);
        let mut driver = HflDriver::default();
        let mut outputs = 0;
        let stats = replay(&mut source, &mut driver, |_| outputs += 1)
            .await
            .unwrap();

        assert_eq!(outputs, 2);
        assert_eq!(
            stats,
            ReplayStats {
                packets: 5,
                frames: 0,
                object_batches: 1,
                telemetry: 1,
                sequencing_errors: 1,
                bounds_errors: 1,
            }
        );
    }
}
