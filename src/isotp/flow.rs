use super::pdu::FlowStatus;
use crate::buffer::{Buffer, MemPool};

/// State of one direction of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    /// No transfer in progress
    #[default]
    Idle,
    /// Single frame handed to the interface
    TxSf,
    /// First frame handed to the interface
    TxFf,
    /// Consecutive frames are being sent
    TxCf,
    /// Flow control frame handed to the interface
    TxFc,
    /// Waiting for the next consecutive frame of the peer
    WaitCf,
    /// Waiting for a flow control frame of the peer
    WaitFc,
}

/// Segmentation or reassembly state of one direction
#[derive(Debug, Default)]
pub struct Flow {
    pub state: FlowState,
    pub buffer: Option<Buffer>,
    /// Bytes not yet sent or received
    pub remaining: usize,
    pub total_length: usize,
    /// Serial number of the next consecutive frame
    pub cf_sn: u8,
    /// Flow status sent (receive flow) or last received (send flow)
    pub fs: Option<FlowStatus>,
    pub bs: u8,
    /// Separation time in milliseconds
    pub st: u32,
    /// Consecutive frames in the current block
    pub block_count: u8,
    /// Remaining WAIT frames accepted in the current block
    pub n_wft: u8,
    /// A frame was handed to the interface and is not yet confirmed
    pub awaiting_confirmation: bool,
}

impl Flow {
    pub fn is_idle(&self) -> bool {
        self.state == FlowState::Idle
    }

    /// Offset of the next byte to send or receive
    pub fn offset(&self) -> usize {
        self.total_length - self.remaining
    }

    pub fn next_sequence_number(&mut self) {
        self.cf_sn = (self.cf_sn + 1) & 0x0F;
    }

    /// Returns true if the current block is complete, a block size of 0 never completes
    pub fn block_complete(&self) -> bool {
        self.bs != 0 && self.block_count >= self.bs
    }

    /// Releases the buffer and forces the flow to idle
    pub fn reset(&mut self, mem: &mut MemPool) {
        if let Some(buffer) = self.buffer.take() {
            mem.free(buffer);
        }
        *self = Flow::default();
    }
}
