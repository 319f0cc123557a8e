use crate::error::{Error, Result};
use crate::time::Duration;

/// Configuration of a [crate::stack::Stack]
///
/// The defaults match common ISO-TP tester settings.
/// Pool sizes are fixed for the lifetime of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Byte budget shared by all message buffers
    pub mem_size: usize,
    /// Number of iso-tp connections
    pub max_connections: usize,
    /// Number of raw frame subscriptions
    pub max_raw_connections: usize,
    /// Number of can interfaces
    pub max_interfaces: usize,
    /// Number of concurrently armed timers
    pub max_timeouts: usize,
    /// Fill byte for unused bytes of a frame
    pub padding: u8,
    /// Block size announced in our flow control frames, 0 means unlimited
    pub receive_block_size: u8,
    /// Separation time announced in our flow control frames (raw STmin byte)
    pub receive_st_min: u8,
    /// Number of WAIT flow control frames accepted per block, 0 means WAIT is not allowed
    pub n_wft: u8,
    /// Time for the interface to confirm a frame of the send flow
    pub n_as: Duration,
    /// Time for the interface to confirm a flow control frame of the receive flow
    pub n_ar: Duration,
    /// Time to wait for a flow control frame of the peer
    pub n_bs: Duration,
    /// Time to wait for the next consecutive frame of the peer
    pub n_cr: Duration,
    /// Use the bit rate switch on can fd connections
    pub fd_brs: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mem_size: 4096,
            max_connections: 2,
            max_raw_connections: 2,
            max_interfaces: 2,
            max_timeouts: 10,
            padding: 0xAA,
            receive_block_size: 0,
            receive_st_min: 0,
            n_wft: 0,
            n_as: Duration::from_ticks(1000),
            n_ar: Duration::from_ticks(1000),
            n_bs: Duration::from_ticks(1000),
            n_cr: Duration::from_ticks(1000),
            fd_brs: true,
        }
    }
}

impl Options {
    /// Rejects configurations the stack can not run with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0
            || self.max_interfaces == 0
            || self.max_timeouts == 0
            || self.mem_size == 0
        {
            return Err(Error::Argument);
        }
        // handles and interface indexes are stored in 16 and 8 bits
        if self.max_connections > u16::MAX as usize
            || self.max_raw_connections > u16::MAX as usize
            || self.max_timeouts > u16::MAX as usize
            || self.max_interfaces > u8::MAX as usize
        {
            return Err(Error::Argument);
        }
        Ok(())
    }
}

/// Configuration of a [crate::uds::UdsClient]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdsOptions {
    /// Default server response time
    pub p2: Duration,
    /// Extended server response time after a response pending answer
    pub p2_star: Duration,
    /// Session timeout of a non default session
    pub s3: Duration,
    /// Send tester present when S3 expires instead of falling back to the default session
    pub keep_session: bool,
    /// Sub function used for the keep alive tester present, 0x80 suppresses the response
    pub tester_present_sub_function: u8,
    /// Capacity of the event queue
    pub event_queue: usize,
}

impl Default for UdsOptions {
    fn default() -> Self {
        Self {
            p2: Duration::from_ticks(50),
            p2_star: Duration::from_ticks(500),
            s3: Duration::from_ticks(9000),
            keep_session: false,
            tester_present_sub_function: 0x80,
            event_queue: 8,
        }
    }
}
