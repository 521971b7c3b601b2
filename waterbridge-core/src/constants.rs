//! Protocol constants

/// First byte of every frame
pub const START_BYTE: u8 = 0x78;

/// Last byte of every frame
pub const STOP_BYTE: u8 = 0x79;

/// Bytes before the data section: start, protocol id, data length
pub const HEADER_SIZE: usize = 3;

/// Bytes after the data section: checksum, stop
pub const TRAILER_SIZE: usize = 2;

/// Accumulator size after which undecodable bytes are discarded
pub const DEFAULT_RX_MAX: usize = 128;

/// Hardware discovery probe interval (seconds)
pub const DEFAULT_PROBE_INTERVAL: u64 = 1;

/// Simulator timing and behavior defaults
pub mod simulation {
    /// Nominal water flow while the solenoid is open (cc/s)
    pub const DEFAULT_FLOW: u8 = 100;

    /// Status heartbeat interval (seconds)
    pub const STATUS_INTERVAL: u64 = 1;

    /// Card-detect cycle interval (seconds)
    pub const RFID_DETECT_INTERVAL: u64 = 60;

    /// Time a detected card stays on the reader (seconds)
    pub const RFID_REMOVAL_DELAY: u64 = 60;

    /// Result delay for cancel and RFID update (milliseconds)
    pub const SLOW_RESULT_DELAY_MS: u64 = 1000;

    /// Result delay for config and audio playback (milliseconds)
    pub const FAST_RESULT_DELAY_MS: u64 = 200;
}
