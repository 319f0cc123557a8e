use embedded_can::Id;

/// Maximum payload of a classic can frame
pub const CAN_MAX_LENGTH: usize = 8;
/// Maximum payload of a can fd frame
pub const CANFD_MAX_LENGTH: usize = 64;
/// Maximum data length code of a can fd frame
pub const CANFD_MAX_DLC: u8 = 15;

const DLC_TO_LENGTH: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Converts a data length code into the number of payload bytes
pub fn dlc_to_length(dlc: u8) -> usize {
    DLC_TO_LENGTH[(dlc & 0x0F) as usize] as usize
}

/// Converts a number of payload bytes into the smallest data length code which can carry them
pub fn length_to_dlc(length: usize) -> u8 {
    match length {
        0..=8 => length as u8,
        9..=12 => 9,
        13..=16 => 10,
        17..=20 => 11,
        21..=24 => 12,
        25..=32 => 13,
        33..=48 => 14,
        _ => CANFD_MAX_DLC,
    }
}

/// Rounds a payload length up to the next length a can fd frame can carry
pub fn fd_frame_length(length: usize) -> usize {
    dlc_to_length(length_to_dlc(length))
}

/// A raw can frame, either classic (up to 8 bytes) or can fd (up to 64 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanFrame {
    /// Classic can frame
    Classic { id: Id, len: u8, data: [u8; 8] },
    /// Can fd frame, `brs` selects the bit rate switch for the data phase
    Fd {
        id: Id,
        len: u8,
        brs: bool,
        data: [u8; 64],
    },
}

impl CanFrame {
    /// Creates a classic can frame, returns None if data is longer than 8 bytes
    pub fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > CAN_MAX_LENGTH {
            return None;
        }
        let mut buf = [0; 8];
        buf[..data.len()].copy_from_slice(data);
        Some(CanFrame::Classic {
            id: id.into(),
            len: data.len() as u8,
            data: buf,
        })
    }

    /// Creates a can fd frame
    /// Returns None if data is longer than 64 bytes or has no valid fd length
    pub fn new_fd(id: impl Into<Id>, data: &[u8], brs: bool) -> Option<Self> {
        if data.len() > CANFD_MAX_LENGTH || fd_frame_length(data.len()) != data.len() {
            return None;
        }
        let mut buf = [0; 64];
        buf[..data.len()].copy_from_slice(data);
        Some(CanFrame::Fd {
            id: id.into(),
            len: data.len() as u8,
            brs,
            data: buf,
        })
    }

    /// Returns the can identifier
    pub fn id(&self) -> Id {
        match self {
            CanFrame::Classic { id, .. } | CanFrame::Fd { id, .. } => *id,
        }
    }

    /// Returns a view of the payload
    pub fn data(&self) -> &[u8] {
        match self {
            CanFrame::Classic { len, data, .. } => &data[..*len as usize],
            CanFrame::Fd { len, data, .. } => &data[..*len as usize],
        }
    }

    /// Returns the payload length in bytes
    pub fn len(&self) -> usize {
        self.data().len()
    }

    /// Returns true if the frame carries no payload
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the data length code
    pub fn dlc(&self) -> u8 {
        length_to_dlc(self.len())
    }

    /// Returns true for can fd frames
    pub fn is_fd(&self) -> bool {
        matches!(self, CanFrame::Fd { .. })
    }

    /// Returns true if the frame uses an extended (29 bit) identifier
    pub fn is_extended(&self) -> bool {
        matches!(self.id(), Id::Extended(_))
    }

    /// Converts a frame received by an [embedded_can] driver
    pub fn from_can<F: embedded_can::Frame>(frame: &F) -> Option<Self> {
        if frame.is_remote_frame() {
            return None;
        }
        CanFrame::new(frame.id(), frame.data())
    }

    /// Converts the frame into the frame type of an [embedded_can] driver
    /// Can fd frames can not be represented and return None
    pub(crate) fn can<F: embedded_can::Frame>(&self) -> Option<F> {
        match self {
            CanFrame::Classic { .. } => F::new(self.id(), self.data()),
            CanFrame::Fd { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::frame::{ext_id, std_id, TestFrame};

    #[test]
    fn dlc_mapping() {
        assert_eq!(dlc_to_length(8), 8);
        assert_eq!(dlc_to_length(9), 12);
        assert_eq!(dlc_to_length(15), 64);
        assert_eq!(length_to_dlc(7), 7);
        assert_eq!(length_to_dlc(9), 9);
        assert_eq!(length_to_dlc(12), 9);
        assert_eq!(length_to_dlc(13), 10);
        assert_eq!(length_to_dlc(49), 15);
        assert_eq!(length_to_dlc(100), 15);
    }

    #[test]
    fn fd_lengths_snap_up() {
        assert_eq!(fd_frame_length(5), 5);
        assert_eq!(fd_frame_length(9), 12);
        assert_eq!(fd_frame_length(33), 48);
        assert_eq!(fd_frame_length(64), 64);
    }

    #[test]
    fn classic_frame() {
        let frame = CanFrame::new(std_id(0x7E0), &[1, 2, 3]).unwrap();
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert_eq!(frame.dlc(), 3);
        assert!(!frame.is_fd());
        assert!(!frame.is_extended());
        assert!(CanFrame::new(std_id(0x7E0), &[0; 9]).is_none());
    }

    #[test]
    fn fd_frame_needs_valid_length() {
        assert!(CanFrame::new_fd(ext_id(0x18DA00F1), &[0; 12], true).is_some());
        assert!(CanFrame::new_fd(ext_id(0x18DA00F1), &[0; 13], true).is_none());
        let frame = CanFrame::new_fd(ext_id(0x18DA00F1), &[0; 64], false).unwrap();
        assert_eq!(frame.dlc(), 15);
        assert!(frame.is_extended());
    }

    #[test]
    fn embedded_can_conversion() {
        let frame = CanFrame::new(std_id(0x7E8), &[0x02, 0x50, 0x01]).unwrap();
        let can: TestFrame = frame.can().unwrap();
        assert_eq!(embedded_can::Frame::data(&can), &[0x02, 0x50, 0x01]);
        assert_eq!(CanFrame::from_can(&can), Some(frame));

        let fd = CanFrame::new_fd(std_id(0x7E8), &[0; 12], true).unwrap();
        assert!(fd.can::<TestFrame>().is_none());
    }
}
