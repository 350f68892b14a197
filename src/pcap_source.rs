// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! PCAP file packet source for offline replay.
//!
//! [`PcapSource`] reads UDP datagrams from PCAP/PCAPNG captures and tags
//! each one with a logical [`Channel`] using a [`PortMap`]. Datagrams on
//! ports outside the map are skipped.
//!
//! # Example
//!
//! ```ignore
//! use edgefirst_hfl::{PcapSource, pcap_source::PortMap};
//! use edgefirst_hfl::packet_source::PacketSource;
//!
//! let mut source = PcapSource::from_file("hfl110.pcap", &PortMap::default())?;
//!
//! let mut buf = [0u8; 2048];
//! while source.has_more() {
//!     let (channel, len) = source.recv(&mut buf).await?;
//!     // Route buf[..len] by channel
//! }
//! ```

use crate::{
    lidar::{Channel, Error, RawPacket},
    packet_source::PacketSource,
};
use pcap_parser::traits::PcapReaderIterator;
use std::{future::Future, path::Path, pin::Pin};

/// UDP port of each logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMap {
    pub frame: u16,
    pub object: u16,
    pub telemetry: u16,
    pub slice: Option<u16>,
}

impl Default for PortMap {
    fn default() -> Self {
        Self {
            frame: 57410,
            object: 57412,
            telemetry: 57413,
            slice: Some(57414),
        }
    }
}

impl PortMap {
    /// Channel for a single port.
    pub fn channel(&self, port: u16) -> Option<Channel> {
        if port == self.frame {
            Some(Channel::Frame)
        } else if port == self.object {
            Some(Channel::Object)
        } else if port == self.telemetry {
            Some(Channel::Telemetry)
        } else if Some(port) == self.slice {
            Some(Channel::Slice)
        } else {
            None
        }
    }

    /// Channel for a datagram, matching the destination port first.
    pub fn channel_for(&self, src_port: u16, dst_port: u16) -> Option<Channel> {
        self.channel(dst_port).or_else(|| self.channel(src_port))
    }
}

/// PCAP file packet source.
///
/// Loads the entire capture into memory. Supports both legacy PCAP and
/// PCAPNG formats.
pub struct PcapSource {
    packets: Vec<RawPacket>,
    index: usize,
}

impl PcapSource {
    /// Load a capture from disk.
    pub fn from_file<P: AsRef<Path>>(path: P, ports: &PortMap) -> Result<Self, Error> {
        let data = std::fs::read(path.as_ref()).map_err(Error::Io)?;
        Self::from_bytes(&data, ports)
    }

    /// Load a capture from memory.
    pub fn from_bytes(data: &[u8], ports: &PortMap) -> Result<Self, Error> {
        let mut packets = Vec::new();

        // PCAPNG starts with the Section Header Block magic
        if data.len() >= 4 && data[0..4] == [0x0a, 0x0d, 0x0d, 0x0a] {
            Self::extract_pcapng(data, ports, &mut packets)?;
        } else {
            Self::extract_legacy_pcap(data, ports, &mut packets)?;
        }

        Ok(Self { packets, index: 0 })
    }

    fn extract_legacy_pcap(
        data: &[u8],
        ports: &PortMap,
        packets: &mut Vec<RawPacket>,
    ) -> Result<(), Error> {
        use pcap_parser::*;

        // Buffer must hold the whole capture to avoid Incomplete errors
        let mut reader = LegacyPcapReader::new(data.len().max(65536), data)
            .map_err(|e| Error::InvalidPacket(format!("Failed to create PCAP reader: {:?}", e)))?;

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    if let PcapBlockOwned::Legacy(packet) = block {
                        packets.extend(Self::extract_udp_payload(packet.data, ports));
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_)) => break,
                Err(e) => {
                    return Err(Error::InvalidPacket(format!("PCAP parse error: {:?}", e)));
                }
            }
        }

        Ok(())
    }

    fn extract_pcapng(
        data: &[u8],
        ports: &PortMap,
        packets: &mut Vec<RawPacket>,
    ) -> Result<(), Error> {
        use pcap_parser::*;

        let mut reader = PcapNGReader::new(data.len().max(65536), data).map_err(|e| {
            Error::InvalidPacket(format!("Failed to create PCAPNG reader: {:?}", e))
        })?;

        loop {
            match reader.next() {
                Ok((offset, block)) => {
                    match block {
                        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                            packets.extend(Self::extract_udp_payload(epb.data, ports));
                        }
                        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                            packets.extend(Self::extract_udp_payload(spb.data, ports));
                        }
                        _ => {}
                    }
                    reader.consume(offset);
                }
                Err(PcapError::Eof) => break,
                Err(PcapError::Incomplete(_)) => break,
                Err(e) => {
                    return Err(Error::InvalidPacket(format!("PCAPNG parse error: {:?}", e)));
                }
            }
        }

        Ok(())
    }

    /// Extract and tag the UDP payload of an Ethernet frame.
    fn extract_udp_payload(data: &[u8], ports: &PortMap) -> Option<RawPacket> {
        use etherparse::SlicedPacket;

        let packet = SlicedPacket::from_ethernet(data).ok()?;
        let udp = match packet.transport {
            Some(etherparse::TransportSlice::Udp(udp)) => udp,
            _ => return None,
        };

        let channel = ports.channel_for(udp.source_port(), udp.destination_port())?;
        let payload = udp.payload();
        if payload.is_empty() {
            return None;
        }

        Some(RawPacket::new(channel, payload.to_vec()))
    }

    /// Reset source to beginning for replay.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.index
    }

    pub fn remaining(&self) -> usize {
        self.packets.len().saturating_sub(self.index)
    }

    /// Packets extracted for `channel`.
    pub fn count(&self, channel: Channel) -> usize {
        self.packets.iter().filter(|p| p.channel == channel).count()
    }
}

impl PacketSource for PcapSource {
    fn recv<'a>(
        &'a mut self,
        buf: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<(Channel, usize), Error>> + Send + 'a>> {
        Box::pin(async move {
            if self.index >= self.packets.len() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "no more packets in PCAP",
                )));
            }

            let packet = &self.packets[self.index];
            let len = packet.data.len();
            if len > buf.len() {
                return Err(Error::InvalidPacket(format!(
                    "{} byte {} datagram exceeds {} byte buffer",
                    len,
                    packet.channel,
                    buf.len()
                )));
            }
            buf[..len].copy_from_slice(&packet.data);
            self.index += 1;
            Ok((packet.channel, len))
        })
    }

    fn has_more(&self) -> bool {
        self.index < self.packets.len()
    }
}
