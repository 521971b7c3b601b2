//! Frame checksum
//!
//! The checksum is the XOR of the `dataLen` bytes that follow the length
//! byte, i.e. the machine id and the payload. The protocol id and the
//! length byte itself are not covered.

use tracing::trace;

/// Calculate the frame checksum over `data`
///
/// # Examples
///
/// ```
/// use waterbridge_core::checksum;
///
/// assert_eq!(checksum::calculate(&[0x00, 0x00, 0xC8]), 0xC8);
/// assert_eq!(checksum::calculate(&[]), 0x00);
/// ```
pub fn calculate(data: &[u8]) -> u8 {
    let checksum = data.iter().fold(0u8, |acc, byte| acc ^ byte);

    trace!(
        data_len = data.len(),
        checksum = format!("0x{:02X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Verify checksum
pub fn verify(data: &[u8], expected: u8) -> bool {
    calculate(data) == expected
}
