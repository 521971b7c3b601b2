//! Frame encoding/decoding

use bytes::{BufMut, BytesMut};
use tracing::trace;
use waterbridge_types::{CardData, CardDate, ErrorFlags, RfidRecord, RfidTag, StatusSnapshot};

use crate::{
    checksum,
    constants::{HEADER_SIZE, START_BYTE, STOP_BYTE, TRAILER_SIZE},
    error::{Error, Result},
    message::{Command, Event, Message},
    protocol::{Profile, ProtocolId, ResultCode},
};

/// Outcome of a successful [`Codec::decode`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A complete frame was parsed from the front of the window
    Frame {
        message: Message,
        /// Bytes occupied by the frame, trailer included
        consumed: usize,
    },

    /// The window holds the beginning of a frame but not all of it
    Incomplete,
}

/// Frame codec for one protocol profile
///
/// # Frame Structure
///
/// ```text
/// ┌───────┬─────────┬─────────┬───────────┬───────────┬──────────┬──────┐
/// │ START │ Proto   │ dataLen │ MachineId │ Payload   │ Checksum │ STOP │
/// │ 0x78  │ 1 byte  │ 1 byte  │ 1 byte    │ N bytes   │ 1 byte   │ 0x79 │
/// └───────┴─────────┴─────────┴───────────┴───────────┴──────────┴──────┘
///                              └──── dataLen bytes ───┘
/// ```
///
/// The checksum is the XOR of the `dataLen` bytes. Multi-byte fields are
/// big-endian. The stop byte is written but never checked on decode.
///
/// # Examples
///
/// ```
/// use waterbridge_core::{Codec, Command, Decoded, Message};
///
/// let codec = Codec::default();
/// let command = Message::from(Command::OpenVan { machine_id: 0, volume: 200 });
///
/// let frame = codec.encode(&command).unwrap();
/// assert_eq!(&frame[..], &[0x78, 0x41, 0x03, 0x00, 0x00, 0xC8, 0xC8, 0x79]);
///
/// let decoded = codec.decode(&frame).unwrap();
/// assert_eq!(decoded, Decoded::Frame { message: command, consumed: 8 });
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    profile: Profile,
}

impl Codec {
    pub fn new(profile: Profile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Encode a message into a complete frame
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileMismatch`] if the message kind or its card
    /// layout does not exist in this codec's profile.
    pub fn encode(&self, message: &Message) -> Result<BytesMut> {
        let id = message.protocol_id();
        self.ensure_supported(id)?;

        let mut data = BytesMut::with_capacity(24);
        data.put_u8(message.machine_id());

        match message {
            Message::Command(command) => self.put_command(&mut data, command)?,
            Message::Event(event) => self.put_event(&mut data, event)?,
        }

        // RFID payloads are the largest and stay well under 255 bytes
        let data_len = u8::try_from(data.len()).map_err(|_| Error::MalformedPayload {
            id,
            reason: format!("{} data bytes do not fit the length field", data.len()),
        })?;

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + data.len() + TRAILER_SIZE);
        frame.put_u8(START_BYTE);
        frame.put_u8(id.into());
        frame.put_u8(data_len);
        frame.put_slice(&data);
        frame.put_u8(checksum::calculate(&data));
        frame.put_u8(STOP_BYTE);

        trace!("Encoded {}: {}", id, hex::encode(&frame));

        Ok(frame)
    }

    /// Try to decode one frame starting at offset 0 of `window`
    ///
    /// Returns [`Decoded::Incomplete`] when more bytes are needed. Bytes
    /// past the end of the frame are left untouched.
    ///
    /// # Errors
    ///
    /// - [`Error::BadStartByte`] if the window does not begin with `START_BYTE`
    /// - [`Error::UnknownProtocolId`] if the id is not part of the profile
    /// - [`Error::ChecksumMismatch`] if the data bytes are corrupted
    /// - [`Error::MalformedPayload`] if the data does not fit the id's layout
    pub fn decode(&self, window: &[u8]) -> Result<Decoded> {
        let Some(&start) = window.first() else {
            return Ok(Decoded::Incomplete);
        };
        if start != START_BYTE {
            return Err(Error::BadStartByte(start));
        }

        let Some(&raw_id) = window.get(1) else {
            return Ok(Decoded::Incomplete);
        };
        let id = ProtocolId::from_wire(raw_id, self.profile)?;

        let Some(&data_len) = window.get(2) else {
            return Ok(Decoded::Incomplete);
        };
        let data_len = usize::from(data_len);

        let frame_len = HEADER_SIZE + data_len + TRAILER_SIZE;
        if window.len() < frame_len {
            return Ok(Decoded::Incomplete);
        }

        let data = &window[HEADER_SIZE..HEADER_SIZE + data_len];
        let received = window[HEADER_SIZE + data_len];
        let expected = checksum::calculate(data);
        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        let message = self.parse(id, data)?;

        trace!("Decoded {}: {}", id, hex::encode(&window[..frame_len]));

        Ok(Decoded::Frame {
            message,
            consumed: frame_len,
        })
    }

    fn ensure_supported(&self, id: ProtocolId) -> Result<()> {
        if id.is_supported_by(self.profile) {
            Ok(())
        } else {
            Err(Error::ProfileMismatch {
                id,
                profile: self.profile,
            })
        }
    }

    fn put_command(&self, buf: &mut BytesMut, command: &Command) -> Result<()> {
        match command {
            Command::Config { max_flow_allowed, .. } => buf.put_u8(*max_flow_allowed),
            Command::OpenVan { volume, .. } => buf.put_u16(*volume),
            Command::CancelOpenVan { .. } => {}
            Command::PlayAudio { audio_index, .. } => buf.put_u8(*audio_index),
            Command::UpdateRfid { record, .. } => {
                self.put_rfid(buf, record, ProtocolId::CommandUpdateRfid)?
            }
        }
        Ok(())
    }

    fn put_event(&self, buf: &mut BytesMut, event: &Event) -> Result<()> {
        match event {
            Event::Ack { .. } => {}
            Event::Result { result, .. } => buf.put_u8((*result).into()),
            Event::Status(status) => {
                buf.put_u8(status.object_placed.into());
                buf.put_u8(status.solenoid_open.into());
                buf.put_u8(status.water_flow);
                buf.put_u8(status.rfid_placed.into());
                buf.put_u8(status.errors.bits());
            }
            Event::RfidDetected { record, .. } => {
                self.put_rfid(buf, record, ProtocolId::RfidDetected)?
            }
        }
        Ok(())
    }

    fn put_rfid(&self, buf: &mut BytesMut, record: &RfidRecord, id: ProtocolId) -> Result<()> {
        // Tag length is bounded by RfidTag::MAX_LEN
        buf.put_u8(record.tag.len() as u8);
        buf.put_slice(record.tag.as_bytes());

        match (&record.data, self.profile) {
            (
                CardData::Prepaid {
                    balance,
                    issue_date,
                    expire_date,
                },
                Profile::Prepaid,
            ) => {
                buf.put_u16(*balance);
                buf.put_slice(&issue_date.to_bytes());
                buf.put_slice(&expire_date.to_bytes());
            }
            (
                CardData::Quota {
                    valid,
                    volume,
                    issue_date,
                },
                Profile::Quota,
            ) => {
                buf.put_u8((*valid).into());
                buf.put_u16(*volume);
                buf.put_slice(&issue_date.to_bytes());
            }
            _ => {
                return Err(Error::ProfileMismatch {
                    id,
                    profile: self.profile,
                })
            }
        }
        Ok(())
    }

    fn parse(&self, id: ProtocolId, data: &[u8]) -> Result<Message> {
        let mut reader = PayloadReader::new(id, data);
        let machine_id = reader.u8()?;

        let message = match id {
            ProtocolId::Config => Command::Config {
                machine_id,
                max_flow_allowed: reader.u8()?,
            }
            .into(),
            ProtocolId::CommandOpenVan => Command::OpenVan {
                machine_id,
                volume: reader.u16()?,
            }
            .into(),
            ProtocolId::CommandCancelOpenVan => Command::CancelOpenVan { machine_id }.into(),
            ProtocolId::CommandPlayAudio => Command::PlayAudio {
                machine_id,
                audio_index: reader.u8()?,
            }
            .into(),
            ProtocolId::CommandUpdateRfid => Command::UpdateRfid {
                machine_id,
                record: reader.rfid(self.profile)?,
            }
            .into(),
            ProtocolId::Status => Event::Status(StatusSnapshot {
                machine_id,
                object_placed: reader.bool()?,
                solenoid_open: reader.bool()?,
                water_flow: reader.u8()?,
                rfid_placed: reader.bool()?,
                errors: reader.error_flags()?,
            })
            .into(),
            ProtocolId::RfidDetected => Event::RfidDetected {
                machine_id,
                record: reader.rfid(self.profile)?,
            }
            .into(),
            reply => {
                let command = reply
                    .command_kind()
                    .ok_or_else(|| reader.malformed("not a command reply"))?;

                if reply.is_ack() {
                    Event::Ack { command, machine_id }.into()
                } else {
                    Event::Result {
                        command,
                        machine_id,
                        result: reader.result_code()?,
                    }
                    .into()
                }
            }
        };

        reader.finish()?;
        Ok(message)
    }
}

/// Bounds-checked cursor over the data section of a frame
struct PayloadReader<'a> {
    id: ProtocolId,
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(id: ProtocolId, data: &'a [u8]) -> Self {
        Self { id, data, pos: 0 }
    }

    fn malformed(&self, reason: impl Into<String>) -> Error {
        Error::MalformedPayload {
            id: self.id,
            reason: reason.into(),
        }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let data = self.data;
        let bytes = data
            .get(self.pos..self.pos + n)
            .ok_or_else(|| self.malformed(format!("truncated at byte {}", self.pos)))?;
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn bool(&mut self) -> Result<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.malformed(format!("invalid boolean 0x{:02X}", other))),
        }
    }

    fn date(&mut self) -> Result<CardDate> {
        let bytes = self.bytes(3)?;
        Ok(CardDate::from_bytes([bytes[0], bytes[1], bytes[2]]))
    }

    fn error_flags(&mut self) -> Result<ErrorFlags> {
        let mask = self.u8()?;
        ErrorFlags::from_bits(mask)
            .ok_or_else(|| self.malformed(format!("undefined error bits 0x{:02X}", mask)))
    }

    fn result_code(&mut self) -> Result<ResultCode> {
        let value = self.u8()?;
        ResultCode::try_from(value)
            .map_err(|_| self.malformed(format!("unknown result code 0x{:02X}", value)))
    }

    fn rfid(&mut self, profile: Profile) -> Result<RfidRecord> {
        let len = usize::from(self.u8()?);
        if len > RfidTag::MAX_LEN {
            return Err(self.malformed(format!(
                "RFID length {} exceeds {}",
                len,
                RfidTag::MAX_LEN
            )));
        }
        let tag = RfidTag::new(self.bytes(len)?)?;

        let data = match profile {
            Profile::Prepaid => CardData::Prepaid {
                balance: self.u16()?,
                issue_date: self.date()?,
                expire_date: self.date()?,
            },
            Profile::Quota => CardData::Quota {
                valid: self.bool()?,
                volume: self.u16()?,
                issue_date: self.date()?,
            },
        };

        Ok(RfidRecord::new(tag, data))
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.data.len() {
            Ok(())
        } else {
            Err(self.malformed(format!(
                "{} trailing bytes",
                self.data.len() - self.pos
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use waterbridge_types::MachineId;

    use crate::protocol::CommandKind;

    fn prepaid_record(tag: Vec<u8>) -> RfidRecord {
        RfidRecord::new(
            RfidTag::new(tag).unwrap(),
            CardData::Prepaid {
                balance: 20000,
                issue_date: CardDate::new(24, 1, 7),
                expire_date: CardDate::new(25, 1, 8),
            },
        )
    }

    fn quota_record(tag: Vec<u8>) -> RfidRecord {
        RfidRecord::new(
            RfidTag::new(tag).unwrap(),
            CardData::Quota {
                valid: true,
                volume: 1500,
                issue_date: CardDate::new(24, 1, 7),
            },
        )
    }

    fn round_trip(codec: Codec, message: Message) {
        let frame = codec.encode(&message).unwrap();
        let decoded = codec.decode(&frame).unwrap();

        assert_eq!(
            decoded,
            Decoded::Frame {
                message,
                consumed: frame.len()
            }
        );
    }

    fn all_kinds() -> [CommandKind; 5] {
        [
            CommandKind::Config,
            CommandKind::OpenVan,
            CommandKind::CancelOpenVan,
            CommandKind::PlayAudio,
            CommandKind::UpdateRfid,
        ]
    }

    #[test]
    fn test_encode_ack_layout() {
        let codec = Codec::default();
        let frame = codec
            .encode(&Event::ack(CommandKind::OpenVan, 5).into())
            .unwrap();

        // dataLen covers only the machine id
        assert_eq!(&frame[..], &[0x78, 0x42, 0x01, 0x05, 0x05, 0x79]);
    }

    #[test]
    fn test_encode_update_rfid_layout() {
        let codec = Codec::default();
        let command = Command::UpdateRfid {
            machine_id: 0,
            record: prepaid_record(vec![163, 52, 18, 8]),
        };
        let frame = codec.encode(&command.into()).unwrap();

        let data = [
            0x00, 0x04, 163, 52, 18, 8, 0x4E, 0x20, 24, 1, 7, 25, 1, 8,
        ];
        assert_eq!(&frame[..3], &[0x78, 0x61, data.len() as u8]);
        assert_eq!(&frame[3..3 + data.len()], &data);
        assert_eq!(frame[3 + data.len()], checksum::calculate(&data));
        assert_eq!(frame[frame.len() - 1], STOP_BYTE);
    }

    #[test]
    fn test_encode_status_layout() {
        let codec = Codec::default();
        let status = StatusSnapshot {
            machine_id: 1,
            object_placed: true,
            solenoid_open: true,
            water_flow: 100,
            rfid_placed: false,
            errors: ErrorFlags::FLOW_SENSOR | ErrorFlags::AUDIO,
        };
        let frame = codec.encode(&Event::Status(status).into()).unwrap();

        assert_eq!(
            &frame[..],
            &[0x78, 0x81, 0x06, 0x01, 0x01, 0x01, 100, 0x00, 0x0A, 0x01 ^ 0x01 ^ 0x01 ^ 100 ^ 0x0A, 0x79]
        );
    }

    #[test]
    fn test_round_trip_commands() {
        let codec = Codec::default();

        round_trip(codec, Command::Config { machine_id: 0, max_flow_allowed: 120 }.into());
        round_trip(codec, Command::OpenVan { machine_id: 1, volume: 0xFFFF }.into());
        round_trip(codec, Command::CancelOpenVan { machine_id: 2 }.into());
        round_trip(codec, Command::PlayAudio { machine_id: 3, audio_index: 7 }.into());
        round_trip(
            codec,
            Command::UpdateRfid {
                machine_id: 4,
                record: prepaid_record(vec![1, 2, 3, 4]),
            }
            .into(),
        );
    }

    #[test]
    fn test_round_trip_acks_and_results() {
        let codec = Codec::default();

        for kind in all_kinds() {
            round_trip(codec, Event::ack(kind, 9).into());
            round_trip(
                codec,
                Event::Result {
                    command: kind,
                    machine_id: 9,
                    result: ResultCode::RfidAuthenticationFailed,
                }
                .into(),
            );
        }
    }

    #[test]
    fn test_round_trip_rfid_boundary_lengths() {
        for tag in [Vec::new(), vec![0xAB; RfidTag::MAX_LEN]] {
            round_trip(
                Codec::new(Profile::Prepaid),
                Event::RfidDetected {
                    machine_id: 0,
                    record: prepaid_record(tag.clone()),
                }
                .into(),
            );
            round_trip(
                Codec::new(Profile::Quota),
                Event::RfidDetected {
                    machine_id: 0,
                    record: quota_record(tag),
                }
                .into(),
            );
        }
    }

    #[test]
    fn test_decode_incomplete() {
        let codec = Codec::default();
        let frame = codec
            .encode(&Command::OpenVan { machine_id: 0, volume: 200 }.into())
            .unwrap();

        for len in 0..frame.len() {
            assert_eq!(codec.decode(&frame[..len]).unwrap(), Decoded::Incomplete);
        }
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let codec = Codec::default();
        let mut window = codec
            .encode(&Event::ack(CommandKind::Config, 0).into())
            .unwrap();
        let frame_len = window.len();
        window.put_slice(&[0x78, 0x02]);

        match codec.decode(&window).unwrap() {
            Decoded::Frame { consumed, .. } => assert_eq!(consumed, frame_len),
            Decoded::Incomplete => panic!("Expected a frame"),
        }
    }

    #[test]
    fn test_decode_does_not_check_stop_byte() {
        let codec = Codec::default();
        let mut frame = codec
            .encode(&Event::ack(CommandKind::Config, 0).into())
            .unwrap();
        let last = frame.len() - 1;
        frame[last] = 0x00;

        assert!(matches!(codec.decode(&frame), Ok(Decoded::Frame { .. })));
    }

    #[test]
    fn test_decode_bad_start() {
        let result = Codec::default().decode(&[0x00, 0x42, 0x01, 0x00, 0x00, 0x79]);
        assert!(matches!(result, Err(Error::BadStartByte(0x00))));
    }

    #[test]
    fn test_decode_unknown_protocol_id() {
        let result = Codec::default().decode(&[0x78, 0x99]);
        assert!(matches!(result, Err(Error::UnknownProtocolId(0x99))));
    }

    #[test]
    fn test_decode_checksum_mismatch() {
        let codec = Codec::default();
        let mut frame = codec
            .encode(&Command::PlayAudio { machine_id: 1, audio_index: 2 }.into())
            .unwrap();
        frame[5] ^= 0xFF;

        let result = codec.decode(&frame);
        if let Err(Error::ChecksumMismatch { expected, received }) = result {
            assert_ne!(expected, received);
        } else {
            panic!("Expected ChecksumMismatch error");
        }
    }

    #[test]
    fn test_decode_empty_data_section() {
        // dataLen 0 leaves no room for the machine id
        let result = Codec::default().decode(&[0x78, 0x02, 0x00, 0x00, 0x79]);
        assert!(matches!(result, Err(Error::MalformedPayload { .. })));
    }

    #[test]
    fn test_decode_payload_length_mismatch() {
        // Ack with an extra byte
        let data = [0x00, 0x01];
        let frame = [0x78, 0x02, 0x02, data[0], data[1], checksum::calculate(&data), 0x79];

        let result = Codec::default().decode(&frame);
        assert!(matches!(
            result,
            Err(Error::MalformedPayload { id: ProtocolId::ConfigAck, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_invalid_status_values() {
        let codec = Codec::default();

        for data in [[0x00, 0x02, 0x00, 0x00, 0x00, 0x00], [0x00, 0x00, 0x00, 0x00, 0x00, 0x10]] {
            let mut frame = vec![0x78, 0x81, data.len() as u8];
            frame.extend_from_slice(&data);
            frame.push(checksum::calculate(&data));
            frame.push(0x79);

            assert!(matches!(codec.decode(&frame), Err(Error::MalformedPayload { .. })));
        }
    }

    #[test]
    fn test_decode_rejects_oversized_rfid() {
        let mut data = vec![0x00, 11];
        data.extend_from_slice(&[0; 11]);
        data.extend_from_slice(&[0; 8]);
        let mut frame = vec![0x78, 0xC1, data.len() as u8];
        frame.extend_from_slice(&data);
        frame.push(checksum::calculate(&data));
        frame.push(0x79);

        assert!(matches!(
            Codec::default().decode(&frame),
            Err(Error::MalformedPayload { id: ProtocolId::RfidDetected, .. })
        ));
    }

    #[test]
    fn test_quota_profile_rejects_cancel() {
        let codec = Codec::new(Profile::Quota);

        let result = codec.encode(&Command::CancelOpenVan { machine_id: 0 }.into());
        assert!(matches!(result, Err(Error::ProfileMismatch { .. })));

        let frame = Codec::new(Profile::Prepaid)
            .encode(&Command::CancelOpenVan { machine_id: 0 }.into())
            .unwrap();
        assert!(matches!(codec.decode(&frame), Err(Error::UnknownProtocolId(0x44))));
    }

    #[test]
    fn test_card_layout_must_match_profile() {
        let command = Message::from(Command::UpdateRfid {
            machine_id: 0,
            record: quota_record(vec![1, 2, 3, 4]),
        });

        assert!(matches!(
            Codec::new(Profile::Prepaid).encode(&command),
            Err(Error::ProfileMismatch { profile: Profile::Prepaid, .. })
        ));
        assert!(Codec::new(Profile::Quota).encode(&command).is_ok());
    }

    fn arb_date() -> impl Strategy<Value = CardDate> {
        any::<[u8; 3]>().prop_map(CardDate::from_bytes)
    }

    fn arb_prepaid_record() -> impl Strategy<Value = RfidRecord> {
        (
            prop::collection::vec(any::<u8>(), 0..=RfidTag::MAX_LEN),
            any::<u16>(),
            arb_date(),
            arb_date(),
        )
            .prop_map(|(tag, balance, issue_date, expire_date)| {
                RfidRecord::new(
                    RfidTag::new(tag).unwrap(),
                    CardData::Prepaid {
                        balance,
                        issue_date,
                        expire_date,
                    },
                )
            })
    }

    fn arb_message() -> impl Strategy<Value = Message> {
        prop_oneof![
            (any::<MachineId>(), any::<u8>()).prop_map(|(machine_id, max_flow_allowed)| {
                Command::Config { machine_id, max_flow_allowed }.into()
            }),
            (any::<MachineId>(), any::<u16>())
                .prop_map(|(machine_id, volume)| Command::OpenVan { machine_id, volume }.into()),
            any::<MachineId>().prop_map(|machine_id| Command::CancelOpenVan { machine_id }.into()),
            (any::<MachineId>(), any::<u8>()).prop_map(|(machine_id, audio_index)| {
                Command::PlayAudio { machine_id, audio_index }.into()
            }),
            (any::<MachineId>(), arb_prepaid_record())
                .prop_map(|(machine_id, record)| Command::UpdateRfid { machine_id, record }.into()),
            (any::<MachineId>(), any::<bool>(), any::<bool>(), any::<u8>(), any::<bool>(), 0u8..16).prop_map(
                |(machine_id, object_placed, solenoid_open, water_flow, rfid_placed, mask)| {
                    Event::Status(StatusSnapshot {
                        machine_id,
                        object_placed,
                        solenoid_open,
                        water_flow,
                        rfid_placed,
                        errors: ErrorFlags::from_bits_truncate(mask),
                    })
                    .into()
                }
            ),
            (any::<MachineId>(), arb_prepaid_record())
                .prop_map(|(machine_id, record)| Event::RfidDetected { machine_id, record }.into()),
        ]
    }

    proptest! {
        #[test]
        fn prop_round_trip(message in arb_message()) {
            let codec = Codec::default();
            let frame = codec.encode(&message).unwrap();

            prop_assert_eq!(
                codec.decode(&frame).unwrap(),
                Decoded::Frame { message, consumed: frame.len() }
            );
        }

        #[test]
        fn prop_single_bit_flip_is_rejected(
            message in arb_message(),
            offset in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let codec = Codec::default();
            let mut frame = codec.encode(&message).unwrap();

            // Flip a bit inside the machine id / payload bytes
            let data_len = usize::from(frame[2]);
            let target = HEADER_SIZE + offset.index(data_len);
            frame[target] ^= 1 << bit;

            prop_assert!(
                matches!(codec.decode(&frame), Err(Error::ChecksumMismatch { .. })),
                "Expected ChecksumMismatch error"
            );
        }
    }
}
