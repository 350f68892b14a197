// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Bounds-checked, offset-addressed packet reader.
//!
//! HFL packets mix byte orders: integers are transmitted big-endian while
//! floats are transmitted in the sensor's native (little-endian) order and
//! must be copied without a swap. The two cases are separate, explicitly
//! named reads so the asymmetry stays visible at every call site.
//!
//! There is no checksum in the protocol. Corrupt fields decode to whatever
//! bit pattern is present.

use crate::lidar::Error;

/// Read-only view over a received datagram.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PacketDecoder<'a> {
    slice: &'a [u8],
}

impl<'a> PacketDecoder<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        PacketDecoder { slice }
    }

    /// Wrap `slice`, failing unless it holds at least `min_len` bytes.
    pub fn with_min_len(slice: &'a [u8], min_len: usize) -> Result<Self, Error> {
        let decoder = PacketDecoder { slice };
        decoder.require(0, min_len)?;
        Ok(decoder)
    }

    pub fn len(&self) -> usize {
        self.slice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slice.is_empty()
    }

    /// Check that `width` bytes at `offset` are inside the packet.
    #[inline]
    pub fn require(&self, offset: usize, width: usize) -> Result<(), Error> {
        match offset.checked_add(width) {
            Some(end) if end <= self.slice.len() => Ok(()),
            _ => Err(Error::Bounds {
                offset,
                width,
                len: self.slice.len(),
            }),
        }
    }

    #[inline]
    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], Error> {
        self.require(offset, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.slice[offset..offset + N]);
        Ok(out)
    }

    #[inline]
    pub fn read_u8(&self, offset: usize) -> Result<u8, Error> {
        Ok(self.array::<1>(offset)?[0])
    }

    /// Big-endian u16, swapped to host order.
    #[inline]
    pub fn read_be_u16(&self, offset: usize) -> Result<u16, Error> {
        Ok(u16::from_be_bytes(self.array(offset)?))
    }

    /// Big-endian u32, swapped to host order.
    #[inline]
    pub fn read_be_u32(&self, offset: usize) -> Result<u32, Error> {
        Ok(u32::from_be_bytes(self.array(offset)?))
    }

    /// Native-order f32, copied without a byte swap.
    #[inline]
    pub fn read_raw_f32(&self, offset: usize) -> Result<f32, Error> {
        Ok(f32::from_ne_bytes(self.array(offset)?))
    }

    /// Borrow `width` bytes at `offset`.
    pub fn bytes(&self, offset: usize, width: usize) -> Result<&'a [u8], Error> {
        self.require(offset, width)?;
        Ok(&self.slice[offset..offset + width])
    }
}
