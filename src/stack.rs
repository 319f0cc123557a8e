use crate::error::{Error, Result};
use crate::frame::CanFrame;
use crate::interface::{CanInterface, InterfaceIndex, Interfaces};
use crate::isotp::{
    Confirmation, ConnectionHandle, FlowState, IsoTp, IsoTpAddress, Link, TimerEvent,
};
use crate::options::Options;
use crate::raw::{Raw, RawHandle};
use crate::time::TimerDriver;
use crate::timeouts::Timeouts;
use alloc::boxed::Box;
use crossbeam_queue::ArrayQueue;
use tracing::trace;

/// Represents a single can diagnostics stack
/// The stack owns its can interfaces, iso-tp connections, raw subscriptions and timers.
/// Frames enter through [Stack::input] or by polling the interfaces in [Stack::process],
/// transmit confirmations of asynchronous interfaces through [Stack::sent].
/// The stacks process() function must be called on a regular basis to handle timeouts.
pub struct Stack<TimeDriver: TimerDriver> {
    options: Options,
    interfaces: Interfaces,
    isotp: IsoTp,
    raw: Raw,
    timeouts: Timeouts<TimerEvent>,
    confirmations: ArrayQueue<Confirmation>,
    time: TimeDriver,
}

impl<TimeDriver: TimerDriver> Stack<TimeDriver> {
    /// Creates a new stack, all pools are sized by `options`
    pub fn new(options: Options, time: TimeDriver) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            interfaces: Interfaces::with_capacity(options.max_interfaces),
            isotp: IsoTp::new(&options),
            raw: Raw::new(options.max_raw_connections),
            timeouts: Timeouts::with_capacity(options.max_timeouts),
            // every flow has at most one unconfirmed frame
            confirmations: ArrayQueue::new(options.max_connections * 2),
            options,
            time,
        })
    }

    /// Options the stack was created with
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Current time of the stack
    pub fn now(&self) -> crate::time::Instant {
        self.time.now()
    }

    /// Polls every interface for received frames and handles expired timers
    /// should be called periodically
    pub fn process(&mut self) {
        let indexes: smallvec::SmallVec<[InterfaceIndex; 4]> = self.interfaces.indexes().collect();
        for index in indexes {
            while let Some(frame) = self
                .interfaces
                .get_mut(index)
                .and_then(|interface| interface.receive())
            {
                self.input(index, &frame);
            }
        }
        self.check_timeouts();
    }

    /// Fires every timer which is due
    pub fn check_timeouts(&mut self) {
        let (isotp, mut link) = self.split();
        while let Some(event) = link.timeouts.pop_due(link.now) {
            trace!(?event, "timer expired");
            isotp.timeout(event, &mut link);
            drain_confirmations(isotp, &mut link);
        }
    }

    /// Deadline of the earliest armed timer
    /// No timer fires before it, so the embedder may sleep until then unless a frame arrives.
    pub fn next_timeout(&self) -> Option<crate::time::Instant> {
        self.timeouts.next_deadline()
    }

    // ---------------------- interfaces -----------------------------------------------------------
    /// Registers a can interface, the returned index starts at 1
    pub fn add_interface(&mut self, interface: impl CanInterface + 'static) -> Result<InterfaceIndex> {
        self.interfaces.add(Box::new(interface))
    }

    /// Removes a can interface, connections bound to it fail with [Error::NotConnected]
    pub fn remove_interface(&mut self, index: InterfaceIndex) -> Result<()> {
        self.interfaces.remove(index).map(|_| ())
    }

    /// Entry point for a frame received on an interface
    /// Raw subscriptions see the frame first, unconsumed frames are passed to iso-tp
    pub fn input(&mut self, index: InterfaceIndex, frame: &CanFrame) {
        trace!(?index, id = ?frame.id(), data = ?frame.data(), "frame received");
        if self.raw.input(index, frame) {
            return;
        }
        let (isotp, mut link) = self.split();
        isotp.input(index, frame, &mut link);
        drain_confirmations(isotp, &mut link);
    }

    /// Entry point for the transmit confirmation of an asynchronous interface
    pub fn sent(&mut self, index: InterfaceIndex, frame: &CanFrame) {
        if self.raw.sent(index, frame) {
            return;
        }
        let (isotp, mut link) = self.split();
        isotp.sent(index, frame, &mut link);
        drain_confirmations(isotp, &mut link);
    }

    // ---------------------- iso-tp ---------------------------------------------------------------
    /// Creates a new unbound iso-tp connection, None if the connection pool is exhausted
    pub fn isotp_new(&mut self) -> Option<ConnectionHandle> {
        self.isotp.open()
    }

    /// Sets the addressing of a connection, fails while a transfer is in progress
    /// or when can fd addressing is bound to a classic interface
    pub fn isotp_bind(&mut self, handle: ConnectionHandle, address: IsoTpAddress) -> Result<()> {
        self.isotp.bind(handle, address, &self.interfaces)
    }

    /// Closes a connection, transfers in progress are dropped without callback
    pub fn isotp_close(&mut self, handle: ConnectionHandle) -> Result<()> {
        let (isotp, mut link) = self.split();
        isotp.close(handle, &mut link)
    }

    /// Starts sending `data`, completion is reported to the sent callback
    pub fn isotp_send(&mut self, handle: ConnectionHandle, data: &[u8]) -> Result<()> {
        let (isotp, mut link) = self.split();
        let result = isotp.send(handle, data, &mut link);
        drain_confirmations(isotp, &mut link);
        result
    }

    /// Sets the callback for completely received messages
    pub fn isotp_set_receive_callback(
        &mut self,
        handle: ConnectionHandle,
        callback: impl FnMut(ConnectionHandle, &[u8]) + 'static,
    ) -> Result<()> {
        self.isotp.connection_mut(handle)?.on_receive = Some(Box::new(callback));
        Ok(())
    }

    /// Sets the callback for completely sent messages
    pub fn isotp_set_sent_callback(
        &mut self,
        handle: ConnectionHandle,
        callback: impl FnMut(ConnectionHandle, usize) + 'static,
    ) -> Result<()> {
        self.isotp.connection_mut(handle)?.on_sent = Some(Box::new(callback));
        Ok(())
    }

    /// Sets the callback for aborted transfers
    pub fn isotp_set_error_callback(
        &mut self,
        handle: ConnectionHandle,
        callback: impl FnMut(ConnectionHandle, Error) + 'static,
    ) -> Result<()> {
        self.isotp.connection_mut(handle)?.on_error = Some(Box::new(callback));
        Ok(())
    }

    /// Returns the state of the send and the receive flow
    pub fn isotp_flow_states(&self, handle: ConnectionHandle) -> Result<(FlowState, FlowState)> {
        self.isotp.flow_states(handle)
    }

    /// Number of open iso-tp connections
    pub fn isotp_connections(&self) -> usize {
        self.isotp.len()
    }

    /// Bytes of message memory held by transfers in progress
    pub fn memory_in_use(&self) -> usize {
        self.isotp.memory_in_use()
    }

    // ---------------------- raw ------------------------------------------------------------------
    /// Creates a raw subscription on `index`, None if the pool is exhausted
    pub fn raw_new(&mut self, index: InterfaceIndex) -> Option<RawHandle> {
        self.raw.open(index)
    }

    /// Moves a raw subscription to another interface
    pub fn raw_bind(&mut self, handle: RawHandle, index: InterfaceIndex) -> Result<()> {
        self.raw.bind(handle, index)
    }

    /// Releases a raw subscription
    pub fn raw_close(&mut self, handle: RawHandle) -> Result<()> {
        self.raw.close(handle)
    }

    /// Sends a frame on the interface of the subscription
    pub fn raw_send(&mut self, handle: RawHandle, frame: &CanFrame) -> Result<()> {
        self.raw.send(handle, frame, &mut self.interfaces)
    }

    /// The callback returns true to consume a frame, consumed frames are not passed to iso-tp
    pub fn raw_set_receive_callback(
        &mut self,
        handle: RawHandle,
        callback: impl FnMut(RawHandle, &CanFrame) -> bool + 'static,
    ) -> Result<()> {
        self.raw.set_receive_callback(handle, Box::new(callback))
    }

    /// Sets the callback for sent frames of the subscription
    pub fn raw_set_sent_callback(
        &mut self,
        handle: RawHandle,
        callback: impl FnMut(RawHandle, &CanFrame) + 'static,
    ) -> Result<()> {
        self.raw.set_sent_callback(handle, Box::new(callback))
    }

    // ------------------------private--------------------------------------------------------------
    fn split(&mut self) -> (&mut IsoTp, Link<'_>) {
        let now = self.time.now();
        (
            &mut self.isotp,
            Link {
                interfaces: &mut self.interfaces,
                timeouts: &mut self.timeouts,
                confirmations: &self.confirmations,
                options: &self.options,
                now,
            },
        )
    }
}

/// Handles synchronous transmit confirmations until no flow produces a new one
fn drain_confirmations(isotp: &mut IsoTp, link: &mut Link) {
    while let Some(confirmation) = link.confirmations.pop() {
        isotp.confirm(confirmation, link);
    }
}
