use crate::frame::{fd_frame_length, CanFrame, CAN_MAX_LENGTH, CANFD_MAX_LENGTH};
use embedded_can::Id;
use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};
use tracing::trace;

/// Largest message length of the 12 bit first frame length field
pub const MAX_SHORT_LENGTH: usize = 0x0FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
enum PciType {
    Single = 0,
    First = 1,
    Consecutive = 2,
    FlowControl = 3,
}

/// Flow status of a flow control frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum FlowStatus {
    /// CTS, the sender may continue with the next block
    ContinueToSend = 0,
    /// The receiver needs more time
    Wait = 1,
    /// The message does not fit into the receive buffer
    Overflow = 2,
    /// Any other status nibble
    #[num_enum(catch_all)]
    Reserved(u8),
}

/// A decoded iso-tp protocol data unit, borrowing the payload of its can frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pdu<'a> {
    /// Complete message in one frame
    Single {
        /// The message
        data: &'a [u8],
    },
    /// Start of a segmented message
    First {
        /// Length of the whole message
        length: u32,
        /// First bytes of the message, including padding
        data: &'a [u8],
    },
    /// Continuation of a segmented message
    Consecutive {
        /// Serial number, 4 bit
        sequence_number: u8,
        /// Next bytes of the message, including padding
        data: &'a [u8],
    },
    /// Flow control of the receiver
    FlowControl {
        /// Flow status nibble
        status: FlowStatus,
        /// Consecutive frames per block, 0 means unlimited
        block_size: u8,
        /// Raw separation time byte
        st_min: u8,
    },
}

impl<'a> Pdu<'a> {
    /// Decodes the payload of a can frame, returns None for malformed frames
    pub fn decode(payload: &'a [u8]) -> Option<Self> {
        let pci = *payload.first()?;
        let pdu = match PciType::try_from(pci >> 4).ok()? {
            PciType::Single => {
                let (length, offset) = match pci & 0x0F {
                    // escape form, only valid in frames longer than 8 bytes
                    0 if payload.len() > CAN_MAX_LENGTH => (*payload.get(1)? as usize, 2),
                    0 => return None,
                    length => (length as usize, 1),
                };
                if length == 0 {
                    return None;
                }
                Pdu::Single {
                    data: payload.get(offset..offset + length)?,
                }
            }
            PciType::First => {
                let short = (((pci & 0x0F) as u32) << 8) | *payload.get(1)? as u32;
                if short != 0 {
                    Pdu::First {
                        length: short,
                        data: payload.get(2..)?,
                    }
                } else {
                    let bytes: [u8; 4] = payload.get(2..6)?.try_into().ok()?;
                    Pdu::First {
                        length: u32::from_be_bytes(bytes),
                        data: payload.get(6..)?,
                    }
                }
            }
            PciType::Consecutive => Pdu::Consecutive {
                sequence_number: pci & 0x0F,
                data: &payload[1..],
            },
            PciType::FlowControl => Pdu::FlowControl {
                status: FlowStatus::from(pci & 0x0F),
                block_size: *payload.get(1)?,
                st_min: *payload.get(2)?,
            },
        };
        trace!(?pdu, "decoded");
        Some(pdu)
    }

    /// Returns true if the payload starts with a flow control PCI
    pub fn is_flow_control(payload: &[u8]) -> bool {
        payload
            .first()
            .is_some_and(|pci| pci >> 4 == u8::from(PciType::FlowControl))
    }
}

/// Converts a raw STmin byte into milliseconds
///
/// Sub millisecond values are rounded up to one millisecond, reserved values mean no delay.
pub fn st_min_to_ms(st_min: u8) -> u32 {
    match st_min {
        0x00..=0x7F => st_min as u32,
        0xF1..=0xF9 => 1,
        _ => 0,
    }
}

/// Builds the can frames of one connection
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    /// Identifier of the frames
    pub id: Id,
    /// Build can fd frames
    pub fd: bool,
    /// Bit rate switch of can fd frames
    pub brs: bool,
    /// Fill byte for unused bytes
    pub padding: u8,
}

impl Encoder {
    fn frame_size(&self) -> usize {
        if self.fd {
            CANFD_MAX_LENGTH
        } else {
            CAN_MAX_LENGTH
        }
    }

    /// Largest message which fits into a single frame
    pub fn single_frame_capacity(&self) -> usize {
        self.frame_size() - if self.fd { 2 } else { 1 }
    }

    /// Largest message the first frame length field can announce
    pub fn max_message_length(&self) -> usize {
        if self.fd {
            u32::MAX as usize
        } else {
            MAX_SHORT_LENGTH
        }
    }

    /// Builds a single frame carrying all of `data`
    pub fn single(&self, data: &[u8]) -> CanFrame {
        let mut buf = [self.padding; CANFD_MAX_LENGTH];
        let used = if data.len() <= CAN_MAX_LENGTH - 1 {
            buf[0] = data.len() as u8;
            buf[1..1 + data.len()].copy_from_slice(data);
            1 + data.len()
        } else {
            buf[0] = 0;
            buf[1] = data.len() as u8;
            buf[2..2 + data.len()].copy_from_slice(data);
            2 + data.len()
        };
        self.finish(buf, used)
    }

    /// Builds a first frame from the start of `data`, returns the frame and the bytes consumed
    pub fn first(&self, length: usize, data: &[u8]) -> (CanFrame, usize) {
        let mut buf = [self.padding; CANFD_MAX_LENGTH];
        let header = if length <= MAX_SHORT_LENGTH {
            buf[0] = 0x10 | (length >> 8) as u8;
            buf[1] = length as u8;
            2
        } else {
            buf[0] = 0x10;
            buf[1] = 0;
            buf[2..6].copy_from_slice(&(length as u32).to_be_bytes());
            6
        };
        let count = data.len().min(self.frame_size() - header);
        buf[header..header + count].copy_from_slice(&data[..count]);
        (self.finish(buf, header + count), count)
    }

    /// Builds a consecutive frame from the start of `data`, returns the frame and the bytes consumed
    pub fn consecutive(&self, sequence_number: u8, data: &[u8]) -> (CanFrame, usize) {
        let mut buf = [self.padding; CANFD_MAX_LENGTH];
        buf[0] = 0x20 | (sequence_number & 0x0F);
        let count = data.len().min(self.frame_size() - 1);
        buf[1..1 + count].copy_from_slice(&data[..count]);
        (self.finish(buf, 1 + count), count)
    }

    /// Builds a flow control frame
    pub fn flow_control(&self, status: FlowStatus, block_size: u8, st_min: u8) -> CanFrame {
        let mut buf = [self.padding; CANFD_MAX_LENGTH];
        buf[0] = 0x30 | (u8::from(status) & 0x0F);
        buf[1] = block_size;
        buf[2] = st_min;
        self.finish(buf, 3)
    }

    /// Pads the used bytes to the frame length
    fn finish(&self, buf: [u8; CANFD_MAX_LENGTH], used: usize) -> CanFrame {
        let frame = if self.fd {
            CanFrame::Fd {
                id: self.id,
                len: fd_frame_length(used.max(CAN_MAX_LENGTH)) as u8,
                brs: self.brs,
                data: buf,
            }
        } else {
            let mut data = [0; CAN_MAX_LENGTH];
            data.copy_from_slice(&buf[..CAN_MAX_LENGTH]);
            CanFrame::Classic {
                id: self.id,
                len: CAN_MAX_LENGTH as u8,
                data,
            }
        };
        trace!(id = ?frame.id(), data = ?frame.data(), "encoded");
        frame
    }
}
