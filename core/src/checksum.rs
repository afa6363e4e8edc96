//! # Internet Checksum Engine
//!
//! RFC 1071 16-bit one's-complement checksums, as used by IP, ICMP,
//! TCP and UDP headers. [`compute`] is pure and stateless; [`patch`]
//! writes a computed checksum into an outgoing buffer for the duration
//! of one send and guarantees the field is zeroed again afterwards so
//! the buffer can be reused with a different seed.

use rawsock_common::error::{Result, SocketError};

/// Computes the Internet checksum of `data`, optionally continuing
/// from a previous checksum.
///
/// A non-zero `seed` is taken to be the checksum of an earlier byte
/// range; the accumulator is re-seeded with its complement so that for
/// an even-length `a`:
///
/// `compute(compute(0, a), b) == compute(0, a ++ b)`
///
/// This is what allows a pseudo-header checksum to be layered with a
/// payload checksum.
pub fn compute(seed: u16, data: &[u8]) -> u16 {
    let mut sum: u32 = if seed == 0 { 0 } else { u32::from(!seed) };

    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
        if sum > 0xffff {
            // end-around carry fold
            sum -= 0xffff;
        }
    }
    if let [last] = words.remainder() {
        // trailing byte is the high byte of an implicit zero-padded word
        sum += u32::from(*last) << 8;
        if sum > 0xffff {
            sum -= 0xffff;
        }
    }

    !(sum as u16)
}

/// An outgoing buffer whose checksum field has been filled in for one
/// transmission.
///
/// Dropping the guard zeroes the two checksum bytes again, on every
/// exit path, so that the caller's buffer always holds a zeroed field
/// between sends.
#[derive(Debug)]
pub struct PatchedField<'a> {
    data: &'a mut [u8],
    offset: usize,
    checksum: u16,
}

impl PatchedField<'_> {
    /// The buffer with the checksum in place, ready to transmit.
    pub fn bytes(&self) -> &[u8] {
        self.data
    }

    /// The checksum that was written at the field offset.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }
}

impl Drop for PatchedField<'_> {
    fn drop(&mut self) {
        self.data[self.offset] = 0;
        self.data[self.offset + 1] = 0;
    }
}

/// Zeroes the two-byte field at `offset`, computes the checksum over
/// the whole of `data` (zeroed field included) and writes the result
/// back big-endian.
///
/// The bounds check happens before any mutation; an out-of-range
/// offset leaves the buffer untouched.
pub fn patch(data: &mut [u8], offset: usize) -> Result<PatchedField<'_>> {
    let in_bounds = offset
        .checked_add(2)
        .is_some_and(|end| end <= data.len());
    if !in_bounds {
        return Err(SocketError::ChecksumBounds {
            offset,
            length: data.len(),
        });
    }

    data[offset] = 0;
    data[offset + 1] = 0;
    let checksum = compute(0, data);
    data[offset..offset + 2].copy_from_slice(&checksum.to_be_bytes());

    Ok(PatchedField {
        data,
        offset,
        checksum,
    })
}
