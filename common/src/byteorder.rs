//! Host/network byte-order conversions. Thin wrappers over the integer
//! byte-swap primitives, kept only because they are part of the
//! engine's boundary.

pub fn htons(value: u16) -> u16 {
    value.to_be()
}

pub fn htonl(value: u32) -> u32 {
    value.to_be()
}

pub fn ntohs(value: u16) -> u16 {
    u16::from_be(value)
}

pub fn ntohl(value: u32) -> u32 {
    u32::from_be(value)
}
