//! Stream reassembly
//!
//! The serial link delivers bytes in arbitrary chunks. A [`Reassembler`]
//! accumulates them and hands complete frames to the codec:
//! - frames split across several reads are held until complete
//! - several frames in one read are all emitted, in order
//! - undecodable bytes are handled by the configured [`ResyncPolicy`]

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::{
    codec::{Codec, Decoded},
    constants::{DEFAULT_RX_MAX, START_BYTE},
    error::Error,
    message::Message,
};

/// What to do with buffered bytes that do not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResyncPolicy {
    /// Keep the bytes and wait for more; discard everything once the
    /// buffer grows past its cap
    #[default]
    Truncate,

    /// Skip ahead to the next start byte and keep decoding
    Scan,
}

/// Counters describing what the reassembler has seen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    pub frames: u64,
    pub framing_errors: u64,
    pub checksum_errors: u64,
    pub malformed_payloads: u64,
    pub overflows: u64,
}

/// Byte accumulator for one transport
///
/// # Examples
///
/// ```
/// use waterbridge_core::{Codec, Command, Message, Reassembler};
///
/// let codec = Codec::default();
/// let frame = codec
///     .encode(&Message::from(Command::PlayAudio { machine_id: 0, audio_index: 1 }))
///     .unwrap();
///
/// let mut reassembler = Reassembler::new(codec);
/// assert!(reassembler.push(&frame[..3]).is_empty());
///
/// let messages = reassembler.push(&frame[3..]);
/// assert_eq!(messages.len(), 1);
/// assert_eq!(reassembler.buffered_len(), 0);
/// ```
#[derive(Debug)]
pub struct Reassembler {
    codec: Codec,
    buffer: BytesMut,
    max_len: usize,
    policy: ResyncPolicy,
    stats: ReassemblerStats,
}

impl Reassembler {
    /// Create a reassembler with the default cap and truncate policy
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            buffer: BytesMut::with_capacity(DEFAULT_RX_MAX * 2),
            max_len: DEFAULT_RX_MAX,
            policy: ResyncPolicy::default(),
            stats: ReassemblerStats::default(),
        }
    }

    /// Set the buffer size above which undecodable bytes are dropped
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// Set the resynchronization policy
    pub fn with_policy(mut self, policy: ResyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Append received bytes and return every frame they complete
    pub fn push(&mut self, data: &[u8]) -> Vec<Message> {
        self.buffer.extend_from_slice(data);

        trace!(
            "Received {} bytes, {} buffered: {}",
            data.len(),
            self.buffer.len(),
            hex::encode(data)
        );

        let mut messages = Vec::new();

        loop {
            match self.codec.decode(&self.buffer) {
                Ok(Decoded::Incomplete) => break,
                Ok(Decoded::Frame { message, consumed }) => {
                    self.buffer.advance(consumed);
                    self.stats.frames += 1;
                    messages.push(message);
                }
                Err(err) => {
                    self.record(&err);

                    match self.policy {
                        ResyncPolicy::Truncate => {
                            self.truncate_if_full(&err);
                            break;
                        }
                        ResyncPolicy::Scan => self.skip_to_next_start(&err),
                    }
                }
            }
        }

        messages
    }

    /// Number of bytes waiting for a complete frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Drop all buffered bytes
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn record(&mut self, err: &Error) {
        match err {
            Error::ChecksumMismatch { .. } => self.stats.checksum_errors += 1,
            Error::MalformedPayload { .. } => self.stats.malformed_payloads += 1,
            err if err.is_framing_error() => self.stats.framing_errors += 1,
            _ => {}
        }
    }

    fn truncate_if_full(&mut self, err: &Error) {
        if self.buffer.len() > self.max_len {
            let overflow = Error::BufferOverflow {
                len: self.buffer.len(),
                max: self.max_len,
            };
            warn!("{} after {}, discarding buffer", overflow, err);

            self.buffer.clear();
            self.stats.overflows += 1;
        } else {
            debug!(
                "Undecodable bytes ({}), keeping {} bytes",
                err,
                self.buffer.len()
            );
        }
    }

    fn skip_to_next_start(&mut self, err: &Error) {
        let skip = self.buffer[1..]
            .iter()
            .position(|&byte| byte == START_BYTE)
            .map_or(self.buffer.len(), |pos| pos + 1);

        debug!("Undecodable bytes ({}), skipping {} bytes", err, skip);

        self.buffer.advance(skip);
    }
}
