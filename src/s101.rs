/*
 *  Copyright (C) 2025 Michael Bachmann
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU Affero General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU Affero General Public License for more details.
 *
 *  You should have received a copy of the GNU Affero General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::error::{EmberResult, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "tracing")]
use tracing::warn;

pub const BOF: u8 = 0xFE;
pub const EOF: u8 = 0xFF;
pub const CE: u8 = 0xFD;
pub const XOR: u8 = 0x20;
pub const INV: u8 = 0xF8;
pub const CRC_SEED: u16 = 0xFFFF;
pub const CRC_CHECK: u16 = 0xF0B8;
pub const SLOT_IDENTIFIER: u8 = 0x00;
pub const MESSAGE_TYPE: u8 = 0x0E;
pub const COMMAND_EMBER_PACKET: u8 = 0x00;
pub const COMMAND_KEEPALIVE_REQUEST: u8 = 0x01;
pub const COMMAND_KEEPALIVE_RESPONSE: u8 = 0x02;
pub const VERSION: u8 = 0x01;
pub const DTD_GLOW: u8 = 0x01;
pub const DTD_VERSION_MAJOR: u8 = 0x02;
pub const DTD_VERSION_MINOR: u8 = 0x1F;
pub const FLAG_SINGLE_PACKET: u8 = 0xC0;
pub const FLAG_MULTI_PACKET_FIRST: u8 = 0x80;
pub const FLAG_MULTI_PACKET_LAST: u8 = 0x40;
pub const FLAG_EMPTY_PACKET: u8 = 0x20;
pub const FLAG_MULTI_PACKET: u8 = 0x00;
/// Escaped payload bytes per packet before the encoder cuts a new frame.
pub const MAX_PACKET_SIZE: usize = 1024;
pub const CRC_TABLE: &[u16] = &[
    0x0000, 0x1189, 0x2312, 0x329b, 0x4624, 0x57ad, 0x6536, 0x74bf, 0x8c48, 0x9dc1, 0xaf5a, 0xbed3,
    0xca6c, 0xdbe5, 0xe97e, 0xf8f7, 0x1081, 0x0108, 0x3393, 0x221a, 0x56a5, 0x472c, 0x75b7, 0x643e,
    0x9cc9, 0x8d40, 0xbfdb, 0xae52, 0xdaed, 0xcb64, 0xf9ff, 0xe876, 0x2102, 0x308b, 0x0210, 0x1399,
    0x6726, 0x76af, 0x4434, 0x55bd, 0xad4a, 0xbcc3, 0x8e58, 0x9fd1, 0xeb6e, 0xfae7, 0xc87c, 0xd9f5,
    0x3183, 0x200a, 0x1291, 0x0318, 0x77a7, 0x662e, 0x54b5, 0x453c, 0xbdcb, 0xac42, 0x9ed9, 0x8f50,
    0xfbef, 0xea66, 0xd8fd, 0xc974, 0x4204, 0x538d, 0x6116, 0x709f, 0x0420, 0x15a9, 0x2732, 0x36bb,
    0xce4c, 0xdfc5, 0xed5e, 0xfcd7, 0x8868, 0x99e1, 0xab7a, 0xbaf3, 0x5285, 0x430c, 0x7197, 0x601e,
    0x14a1, 0x0528, 0x37b3, 0x263a, 0xdecd, 0xcf44, 0xfddf, 0xec56, 0x98e9, 0x8960, 0xbbfb, 0xaa72,
    0x6306, 0x728f, 0x4014, 0x519d, 0x2522, 0x34ab, 0x0630, 0x17b9, 0xef4e, 0xfec7, 0xcc5c, 0xddd5,
    0xa96a, 0xb8e3, 0x8a78, 0x9bf1, 0x7387, 0x620e, 0x5095, 0x411c, 0x35a3, 0x242a, 0x16b1, 0x0738,
    0xffcf, 0xee46, 0xdcdd, 0xcd54, 0xb9eb, 0xa862, 0x9af9, 0x8b70, 0x8408, 0x9581, 0xa71a, 0xb693,
    0xc22c, 0xd3a5, 0xe13e, 0xf0b7, 0x0840, 0x19c9, 0x2b52, 0x3adb, 0x4e64, 0x5fed, 0x6d76, 0x7cff,
    0x9489, 0x8500, 0xb79b, 0xa612, 0xd2ad, 0xc324, 0xf1bf, 0xe036, 0x18c1, 0x0948, 0x3bd3, 0x2a5a,
    0x5ee5, 0x4f6c, 0x7df7, 0x6c7e, 0xa50a, 0xb483, 0x8618, 0x9791, 0xe32e, 0xf2a7, 0xc03c, 0xd1b5,
    0x2942, 0x38cb, 0x0a50, 0x1bd9, 0x6f66, 0x7eef, 0x4c74, 0x5dfd, 0xb58b, 0xa402, 0x9699, 0x8710,
    0xf3af, 0xe226, 0xd0bd, 0xc134, 0x39c3, 0x284a, 0x1ad1, 0x0b58, 0x7fe7, 0x6e6e, 0x5cf5, 0x4d7c,
    0xc60c, 0xd785, 0xe51e, 0xf497, 0x8028, 0x91a1, 0xa33a, 0xb2b3, 0x4a44, 0x5bcd, 0x6956, 0x78df,
    0x0c60, 0x1de9, 0x2f72, 0x3efb, 0xd68d, 0xc704, 0xf59f, 0xe416, 0x90a9, 0x8120, 0xb3bb, 0xa232,
    0x5ac5, 0x4b4c, 0x79d7, 0x685e, 0x1ce1, 0x0d68, 0x3ff3, 0x2e7a, 0xe70e, 0xf687, 0xc41c, 0xd595,
    0xa12a, 0xb0a3, 0x8238, 0x93b1, 0x6b46, 0x7acf, 0x4854, 0x59dd, 0x2d62, 0x3ceb, 0x0e70, 0x1ff9,
    0xf78f, 0xe606, 0xd49d, 0xc514, 0xb1ab, 0xa022, 0x92b9, 0x8330, 0x7bc7, 0x6a4e, 0x58d5, 0x495c,
    0x3de3, 0x2c6a, 0x1ef1, 0x0f78,
];

fn update_crc(crc: u16, b: u8) -> u16 {
    (crc >> 8) ^ CRC_TABLE[((crc ^ b as u16) & 0xFF) as usize]
}

/// CRC-16/CCITT over raw (already unescaped) bytes.
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(CRC_SEED, |crc, &b| update_crc(crc, b))
}

/// CRC-16/CCITT over an escaped body, unescaping CE pairs on the fly.
fn crc16_escaped(bytes: &[u8]) -> u16 {
    let mut crc = CRC_SEED;
    let mut iter = bytes.iter();
    while let Some(&b) = iter.next() {
        let b = if b == CE {
            match iter.next() {
                Some(&next) => next ^ XOR,
                None => break,
            }
        } else {
            b
        };
        crc = update_crc(crc, b);
    }
    crc
}

fn append_escaping(buf: &mut Vec<u8>, b: u8) {
    if b < INV {
        buf.push(b);
    } else {
        buf.push(CE);
        buf.push(b ^ XOR);
    }
}

fn finalize_frame(mut frame: Vec<u8>) -> Vec<u8> {
    let crc = !crc16_escaped(&frame[1..]);
    append_escaping(&mut frame, (crc & 0xFF) as u8);
    append_escaping(&mut frame, (crc >> 8) as u8);
    frame.push(EOF);
    frame
}

fn make_ember_frame(flags: u8, escaped_payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![
        BOF,
        SLOT_IDENTIFIER,
        MESSAGE_TYPE,
        COMMAND_EMBER_PACKET,
        VERSION,
        flags,
        DTD_GLOW,
        2, // number of application bytes
        DTD_VERSION_MINOR,
        DTD_VERSION_MAJOR,
    ];
    frame.extend_from_slice(escaped_payload);
    finalize_frame(frame)
}

/// Splits a BER payload into one or more wire frames.
///
/// The payload is escaped first; a new packet is cut whenever the escaped
/// chunk reaches [`MAX_PACKET_SIZE`] with more payload to come.
pub fn encode_message(payload: &[u8]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut encbuf = Vec::new();
    for (i, &b) in payload.iter().enumerate() {
        append_escaping(&mut encbuf, b);
        if encbuf.len() >= MAX_PACKET_SIZE && i < payload.len() - 1 {
            let flags = if frames.is_empty() {
                FLAG_MULTI_PACKET_FIRST
            } else {
                FLAG_MULTI_PACKET
            };
            frames.push(make_ember_frame(flags, &encbuf));
            encbuf.clear();
        }
    }
    let flags = if frames.is_empty() {
        FLAG_SINGLE_PACKET
    } else {
        FLAG_MULTI_PACKET_LAST
    };
    frames.push(make_ember_frame(flags, &encbuf));
    frames
}

pub fn keepalive_request() -> Vec<u8> {
    finalize_frame(vec![
        BOF,
        SLOT_IDENTIFIER,
        MESSAGE_TYPE,
        COMMAND_KEEPALIVE_REQUEST,
        VERSION,
    ])
}

pub fn keepalive_response() -> Vec<u8> {
    finalize_frame(vec![
        BOF,
        SLOT_IDENTIFIER,
        MESSAGE_TYPE,
        COMMAND_KEEPALIVE_RESPONSE,
        VERSION,
    ])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum S101Event {
    EmberMessage(Vec<u8>),
    KeepaliveRequest,
    KeepaliveResponse,
}

impl fmt::Display for S101Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string(self).map_err(|_| fmt::Error)?
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderStats {
    pub frames: u64,
    pub crc_errors: u64,
    pub reassembly_errors: u64,
}

impl DecoderStats {
    pub fn reset(&mut self) {
        *self = DecoderStats::default();
    }
}

/// Byte-at-a-time frame decoder with multi-packet reassembly.
///
/// Feed raw transport bytes in any chunking; completed messages and
/// keepalives come back as events. Invalid frames are dropped and counted,
/// they never abort decoding of subsequent frames.
#[derive(Debug, Default)]
pub struct S101Decoder {
    in_frame: bool,
    escaped: bool,
    inbuf: Vec<u8>,
    emberbuf: Vec<u8>,
    reassembling: bool,
    stats: DecoderStats,
}

impl S101Decoder {
    pub fn new() -> Self {
        S101Decoder::default()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Vec<S101Event> {
        let mut events = Vec::new();
        for &b in bytes {
            if self.escaped {
                self.escaped = false;
                if self.in_frame {
                    self.inbuf.push(b ^ XOR);
                }
            } else if b == CE {
                self.escaped = true;
            } else if b == BOF {
                self.inbuf.clear();
                self.escaped = false;
                self.in_frame = true;
            } else if b == EOF {
                if self.in_frame {
                    self.in_frame = false;
                    let frame = std::mem::take(&mut self.inbuf);
                    match self.handle_frame(&frame) {
                        Ok(Some(event)) => events.push(event),
                        Ok(None) => {}
                        Err(_e) => {
                            #[cfg(feature = "tracing")]
                            warn!("Dropping S101 frame: {_e}");
                        }
                    }
                }
            } else if self.in_frame {
                self.inbuf.push(b);
            }
        }
        events
    }

    fn handle_frame(&mut self, frame: &[u8]) -> EmberResult<Option<S101Event>> {
        if frame.len() < 6 {
            return Err(ErrorKind::Deserialization(format!(
                "truncated frame of {} bytes",
                frame.len()
            ))
            .into());
        }
        let crc = crc16(frame);
        if crc != CRC_CHECK {
            self.stats.crc_errors += 1;
            return Err(ErrorKind::FramingCrc { crc }.into());
        }
        let body = &frame[..frame.len() - 2];
        if body[0] != SLOT_IDENTIFIER || body[1] != MESSAGE_TYPE {
            return Err(ErrorKind::Deserialization(format!(
                "not an EmBER+ frame: slot {:#04x}, message {:#04x}",
                body[0], body[1]
            ))
            .into());
        }
        match body[2] {
            COMMAND_KEEPALIVE_REQUEST => {
                self.stats.frames += 1;
                Ok(Some(S101Event::KeepaliveRequest))
            }
            COMMAND_KEEPALIVE_RESPONSE => {
                self.stats.frames += 1;
                Ok(Some(S101Event::KeepaliveResponse))
            }
            COMMAND_EMBER_PACKET => self.handle_ember_frame(&body[3..]),
            command => Err(ErrorKind::Deserialization(format!(
                "unknown command byte {command:#04x}"
            ))
            .into()),
        }
    }

    fn handle_ember_frame(&mut self, body: &[u8]) -> EmberResult<Option<S101Event>> {
        // version flags dtd appBytesLen minor major
        if body.len() < 6 {
            return Err(
                ErrorKind::Deserialization("truncated EmBER+ packet header".to_owned()).into(),
            );
        }
        let flags = body[1];
        if body[2] != DTD_GLOW {
            return Err(ErrorKind::Deserialization(format!(
                "dropping frame with non-Glow DTD {:#04x}",
                body[2]
            ))
            .into());
        }
        if body[3] != 2 {
            return Err(ErrorKind::Deserialization(format!(
                "unsupported application byte count {}",
                body[3]
            ))
            .into());
        }
        self.stats.frames += 1;
        let payload = &body[6..];

        if flags & FLAG_MULTI_PACKET_FIRST != 0 {
            self.emberbuf.clear();
            self.reassembling = true;
        }
        if flags & FLAG_EMPTY_PACKET == 0 {
            if !self.reassembling {
                self.stats.reassembly_errors += 1;
                self.emberbuf.clear();
                return Err(ErrorKind::FramingReassembly(format!(
                    "packet with flags {flags:#04x} outside of a message"
                ))
                .into());
            }
            self.emberbuf.extend_from_slice(payload);
        }
        if flags & FLAG_MULTI_PACKET_LAST != 0 {
            if !self.reassembling {
                self.stats.reassembly_errors += 1;
                return Err(ErrorKind::FramingReassembly(format!(
                    "last packet with flags {flags:#04x} without a first"
                ))
                .into());
            }
            self.reassembling = false;
            return Ok(Some(S101Event::EmberMessage(std::mem::take(
                &mut self.emberbuf,
            ))));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn crc_matches_reference_values() {
        assert_eq!(50798, crc16(&[1, 2, 3, 4]));
        assert_eq!(10588, crc16(&[0, 14, 0, 1, 192, 1, 2, 31, 2, 1, 2, 3, 4]));
    }

    #[test]
    fn crc_closes_over_appended_checksum() {
        let frames = encode_message(&[1, 2, 3, 4]);
        let frame = &frames[0];
        // everything between BOF and EOF, CRC included
        assert_eq!(CRC_CHECK, crc16(&frame[1..frame.len() - 1]));
    }

    #[test]
    fn single_packet_encoding_works() {
        let frames = encode_message(&[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(1, frames.len());
        assert_eq!(
            vec![254, 0, 14, 0, 1, 192, 1, 2, 31, 2, 1, 2, 3, 4, 163, 214, 255],
            frames[0]
        );
    }

    #[test]
    fn single_packet_decoding_works() {
        let mut decoder = S101Decoder::new();
        let events = decoder.feed(&[
            254, 0, 14, 0, 1, 192, 1, 2, 31, 2, 1, 2, 3, 4, 163, 214, 255,
        ]);
        assert_eq!(vec![S101Event::EmberMessage(vec![1, 2, 3, 4])], events);
        assert_eq!(1, decoder.stats().frames);
    }

    #[test]
    fn multi_packet_roundtrip_works() {
        let payload: Vec<u8> = (0..3000u32).map(|i| (i % 256) as u8).collect();
        let frames = encode_message(&payload);
        assert!(frames.len() > 1);

        let mut decoder = S101Decoder::new();
        let mut events = Vec::new();
        for frame in &frames {
            events.extend(decoder.feed(frame));
        }
        assert_eq!(vec![S101Event::EmberMessage(payload)], events);
    }

    #[test]
    fn deframe_inverts_frame_regardless_of_chunking() {
        let payload: Vec<u8> = (0..2500u32).map(|i| (i * 7 % 256) as u8).collect();
        let wire: Vec<u8> = encode_message(&payload).concat();

        // trickle one byte at a time
        let mut decoder = S101Decoder::new();
        let mut events = Vec::new();
        for b in &wire {
            events.extend(decoder.feed(std::slice::from_ref(b)));
        }
        assert_eq!(vec![S101Event::EmberMessage(payload)], events);
    }

    #[test]
    fn frame_bodies_contain_no_unescaped_control_bytes() {
        let payload: Vec<u8> = (0xF0..=0xFFu8).chain(0x00..=0x20).collect();
        for frame in encode_message(&payload) {
            assert_eq!(BOF, frame[0]);
            assert_eq!(EOF, *frame.last().unwrap());
            let mut escaped = false;
            for &b in &frame[1..frame.len() - 1] {
                if escaped {
                    assert!(b < INV);
                    escaped = false;
                } else if b == CE {
                    escaped = true;
                } else {
                    assert!(b < INV, "unescaped byte {b:#04x} in frame body");
                }
            }
            assert!(!escaped);
        }
    }

    #[test]
    fn keepalive_frames_roundtrip() {
        let mut decoder = S101Decoder::new();
        assert_eq!(
            vec![S101Event::KeepaliveRequest],
            decoder.feed(&keepalive_request())
        );
        assert_eq!(
            vec![S101Event::KeepaliveResponse],
            decoder.feed(&keepalive_response())
        );
    }

    #[test]
    fn corrupted_frame_is_dropped() {
        let mut frame = encode_message(&[1, 2, 3, 4]).remove(0);
        frame[10] ^= 0x01;
        let mut decoder = S101Decoder::new();
        assert!(decoder.feed(&frame).is_empty());
        assert_eq!(1, decoder.stats().crc_errors);

        // the decoder recovers on the next frame
        let events = decoder.feed(&encode_message(&[5, 6]).remove(0));
        assert_eq!(vec![S101Event::EmberMessage(vec![5, 6])], events);
    }

    #[test]
    fn last_without_first_is_a_reassembly_error() {
        let frame = make_ember_frame(FLAG_MULTI_PACKET_LAST, &[1, 2, 3]);
        let mut decoder = S101Decoder::new();
        assert!(decoder.feed(&frame).is_empty());
        assert_eq!(1, decoder.stats().reassembly_errors);
    }

    #[test]
    fn middle_without_first_is_a_reassembly_error() {
        let frame = make_ember_frame(FLAG_MULTI_PACKET, &[1, 2, 3]);
        let mut decoder = S101Decoder::new();
        assert!(decoder.feed(&frame).is_empty());
        assert_eq!(1, decoder.stats().reassembly_errors);
    }

    #[test]
    fn empty_packet_contributes_nothing() {
        let mut decoder = S101Decoder::new();
        assert!(
            decoder
                .feed(&make_ember_frame(FLAG_EMPTY_PACKET, &[]))
                .is_empty()
        );
        assert_eq!(0, decoder.stats().reassembly_errors);
    }

    #[test]
    fn bytes_before_bof_are_ignored() {
        let mut wire = vec![0x42, 0x17, 0x00];
        wire.extend(encode_message(&[9, 9, 9]).remove(0));
        let mut decoder = S101Decoder::new();
        let events = decoder.feed(&wire);
        assert_eq!(vec![S101Event::EmberMessage(vec![9, 9, 9])], events);
    }
}
