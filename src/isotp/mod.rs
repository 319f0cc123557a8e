//! ISO 15765-2 transport
//!
//! Every connection owns two independent flows, one sending and one receiving.
//! Both are driven by received frames, transmit confirmations and timer expiry.

mod connection;
mod flow;
/// Frame level coding of iso-tp protocol data units
pub mod pdu;

pub use connection::{
    ConnectionHandle, ErrorCallback, IsoTpAddress, ReceiveCallback, SentCallback,
};
pub use flow::FlowState;

use crate::buffer::MemPool;
use crate::error::{Error, Result};
use crate::frame::CanFrame;
use crate::interface::{InterfaceIndex, Interfaces};
use crate::options::Options;
use crate::pool::SlotPool;
use crate::time::{Duration, Instant};
use crate::timeouts::Timeouts;
use connection::Connection;
use crossbeam_queue::ArrayQueue;
use flow::Flow;
use pdu::{st_min_to_ms, Encoder, FlowStatus, Pdu};
use tracing::{debug, trace, warn};

/// Timers armed by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerEvent {
    /// N_As or N_Bs of the send flow
    OutputTimeout(ConnectionHandle),
    /// N_Ar or N_Cr of the receive flow
    InputTimeout(ConnectionHandle),
    /// Separation time before the next consecutive frame
    SeparationTime(ConnectionHandle),
}

impl TimerEvent {
    fn connection(&self) -> ConnectionHandle {
        match self {
            TimerEvent::OutputTimeout(handle)
            | TimerEvent::InputTimeout(handle)
            | TimerEvent::SeparationTime(handle) => *handle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Output,
    Input,
}

/// A frame of a flow which was confirmed by its interface
#[derive(Debug, Clone, Copy)]
pub(crate) struct Confirmation {
    pub connection: ConnectionHandle,
    pub direction: Direction,
}

/// Parts of the stack the transport needs while handling an event
pub(crate) struct Link<'a> {
    pub interfaces: &'a mut Interfaces,
    pub timeouts: &'a mut Timeouts<TimerEvent>,
    pub confirmations: &'a ArrayQueue<Confirmation>,
    pub options: &'a Options,
    pub now: Instant,
}

impl Link<'_> {
    fn arm(&mut self, delay: Duration, event: TimerEvent) {
        self.timeouts.cancel(event);
        if self.timeouts.schedule(self.now, delay, event).is_err() {
            warn!(?event, "timer pool exhausted");
        }
    }

    fn disarm(&mut self, handle: ConnectionHandle, direction: Direction) {
        match direction {
            Direction::Output => {
                self.timeouts.cancel(TimerEvent::OutputTimeout(handle));
                self.timeouts.cancel(TimerEvent::SeparationTime(handle));
            }
            Direction::Input => self.timeouts.cancel(TimerEvent::InputTimeout(handle)),
        }
    }
}

/// Connection pool and buffer memory of the transport
pub(crate) struct IsoTp {
    connections: SlotPool<Connection>,
    mem: MemPool,
}

impl IsoTp {
    pub fn new(options: &Options) -> Self {
        Self {
            connections: SlotPool::with_capacity(options.max_connections),
            mem: MemPool::with_capacity(options.mem_size),
        }
    }

    pub fn open(&mut self) -> Option<ConnectionHandle> {
        let handle = self.connections.alloc(Connection::default()).map(ConnectionHandle);
        debug!(?handle, "connection opened");
        handle
    }

    /// Sets the addressing, can fd addressing needs an interface which supports it
    pub fn bind(
        &mut self,
        handle: ConnectionHandle,
        address: IsoTpAddress,
        interfaces: &Interfaces,
    ) -> Result<()> {
        let conn = self.connections.get_mut(handle.0).ok_or(Error::Argument)?;
        if !conn.output.is_idle() || !conn.input.is_idle() {
            return Err(Error::InProgress);
        }
        if address.fd
            && interfaces.contains(address.interface)
            && !interfaces.is_fd(address.interface)
        {
            warn!(?handle, interface = ?address.interface, "interface does not support can fd");
            return Err(Error::Argument);
        }
        conn.binding = Some(address);
        debug!(?handle, ?address, "connection bound");
        Ok(())
    }

    /// Frees the connection, its buffers and its timers
    pub fn close(&mut self, handle: ConnectionHandle, link: &mut Link) -> Result<()> {
        let mut conn = self.connections.free(handle.0).ok_or(Error::Argument)?;
        conn.output.reset(&mut self.mem);
        conn.input.reset(&mut self.mem);
        link.timeouts.cancel_all(|event| event.connection() == handle);
        debug!(?handle, "connection closed");
        Ok(())
    }

    pub fn connection_mut(&mut self, handle: ConnectionHandle) -> Result<&mut Connection> {
        self.connections.get_mut(handle.0).ok_or(Error::Argument)
    }

    pub fn flow_states(&self, handle: ConnectionHandle) -> Result<(FlowState, FlowState)> {
        self.connections
            .get(handle.0)
            .map(|conn| (conn.output.state, conn.input.state))
            .ok_or(Error::Argument)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn memory_in_use(&self) -> usize {
        self.mem.in_use()
    }

    /// Starts sending a message, fails if the send flow is busy
    pub fn send(&mut self, handle: ConnectionHandle, data: &[u8], link: &mut Link) -> Result<()> {
        let conn = self.connections.get_mut(handle.0).ok_or(Error::Argument)?;
        if data.is_empty() {
            return Err(Error::Argument);
        }
        let (binding, encoder) = conn
            .binding
            .zip(conn.encoder(link.options.padding, link.options.fd_brs))
            .ok_or(Error::NotConnected)?;
        if !link.interfaces.contains(binding.interface) {
            return Err(Error::NotConnected);
        }
        // the interface may have been replaced after binding
        if binding.fd && !link.interfaces.is_fd(binding.interface) {
            return Err(Error::Argument);
        }
        if data.len() > encoder.max_message_length() {
            return Err(Error::Argument);
        }
        if !conn.output.is_idle() {
            return Err(Error::InProgress);
        }
        let mut buffer = self.mem.alloc(data.len()).ok_or(Error::Memory)?;
        buffer.copy_to(0, data);

        let state = if data.len() <= encoder.single_frame_capacity() {
            FlowState::TxSf
        } else {
            FlowState::TxFf
        };
        conn.output = Flow {
            state,
            buffer: Some(buffer),
            remaining: data.len(),
            total_length: data.len(),
            cf_sn: 1,
            n_wft: link.options.n_wft,
            ..Flow::default()
        };
        debug!(?handle, length = data.len(), ?state, "send started");

        if let Err(error) = self.transmit(handle, Direction::Output, link) {
            if let Some(conn) = self.connections.get_mut(handle.0) {
                conn.output.reset(&mut self.mem);
            }
            link.disarm(handle, Direction::Output);
            return Err(error);
        }
        Ok(())
    }

    /// Handles a frame received on `interface`
    pub fn input(&mut self, interface: InterfaceIndex, frame: &CanFrame, link: &mut Link) {
        let Some(handle) = self.find(|conn| conn.receives(interface, frame.id())) else {
            return;
        };
        let Some(pdu) = Pdu::decode(frame.data()) else {
            warn!(?handle, data = ?frame.data(), "malformed frame dropped");
            return;
        };
        match pdu {
            Pdu::Single { data } => self.receive_single(handle, data),
            Pdu::First { length, data } => self.receive_first(handle, length as usize, data, link),
            Pdu::Consecutive {
                sequence_number,
                data,
            } => self.receive_consecutive(handle, sequence_number, data, link),
            Pdu::FlowControl {
                status,
                block_size,
                st_min,
            } => self.receive_flow_control(handle, status, block_size, st_min, link),
        }
    }

    /// Handles an asynchronous transmit confirmation of `interface`
    pub fn sent(&mut self, interface: InterfaceIndex, frame: &CanFrame, link: &mut Link) {
        let direction = if Pdu::is_flow_control(frame.data()) {
            Direction::Input
        } else {
            Direction::Output
        };
        let found = self.find(|conn| {
            let flow = match direction {
                Direction::Output => &conn.output,
                Direction::Input => &conn.input,
            };
            flow.awaiting_confirmation && conn.transmits(interface, frame.id())
        });
        if let Some(connection) = found {
            self.confirm(
                Confirmation {
                    connection,
                    direction,
                },
                link,
            );
        }
    }

    /// Advances a flow whose last frame left the interface
    pub fn confirm(&mut self, confirmation: Confirmation, link: &mut Link) {
        let handle = confirmation.connection;
        let Some(conn) = self.connections.get_mut(handle.0) else {
            return;
        };
        match confirmation.direction {
            Direction::Output => {
                let flow = &mut conn.output;
                if !flow.awaiting_confirmation {
                    return;
                }
                flow.awaiting_confirmation = false;
                link.timeouts.cancel(TimerEvent::OutputTimeout(handle));
                trace!(?handle, state = ?flow.state, "output confirmed");
                let state = flow.state;
                let complete = flow.remaining == 0;
                match state {
                    FlowState::TxSf => self.finish_send(handle),
                    FlowState::TxCf if complete => self.finish_send(handle),
                    FlowState::TxFf => {
                        flow.state = FlowState::WaitFc;
                        link.arm(link.options.n_bs, TimerEvent::OutputTimeout(handle));
                    }
                    FlowState::TxCf => {
                        flow.block_count = flow.block_count.saturating_add(1);
                        if flow.block_complete() {
                            flow.state = FlowState::WaitFc;
                            link.arm(link.options.n_bs, TimerEvent::OutputTimeout(handle));
                        } else if flow.st == 0 {
                            self.transmit_or_abort(handle, Direction::Output, link);
                        } else {
                            let delay = Duration::from_ticks(flow.st);
                            link.arm(delay, TimerEvent::SeparationTime(handle));
                        }
                    }
                    _ => {}
                }
            }
            Direction::Input => {
                let flow = &mut conn.input;
                if !flow.awaiting_confirmation {
                    return;
                }
                flow.awaiting_confirmation = false;
                link.timeouts.cancel(TimerEvent::InputTimeout(handle));
                trace!(?handle, state = ?flow.state, "flow control confirmed");
                if flow.state == FlowState::TxFc {
                    if flow.fs == Some(FlowStatus::Overflow) {
                        flow.reset(&mut self.mem);
                    } else {
                        flow.state = FlowState::WaitCf;
                        link.arm(link.options.n_cr, TimerEvent::InputTimeout(handle));
                    }
                }
            }
        }
    }

    /// Handles an expired timer
    pub fn timeout(&mut self, event: TimerEvent, link: &mut Link) {
        let handle = event.connection();
        let Some(conn) = self.connections.get(handle.0) else {
            return;
        };
        let output_busy = !conn.output.is_idle();
        let input_busy = !conn.input.is_idle();
        let separation_done =
            conn.output.state == FlowState::TxCf && !conn.output.awaiting_confirmation;
        match event {
            TimerEvent::OutputTimeout(_) if output_busy => {
                self.abort(handle, Direction::Output, Error::TransmitTimeout, link)
            }
            TimerEvent::InputTimeout(_) if input_busy => {
                self.abort(handle, Direction::Input, Error::ReceiveTimeout, link)
            }
            TimerEvent::SeparationTime(_) if separation_done => {
                self.transmit_or_abort(handle, Direction::Output, link)
            }
            _ => {}
        }
    }

    // ------------------------------ private ------------------------------------------------------

    fn find(&self, mut filter: impl FnMut(&Connection) -> bool) -> Option<ConnectionHandle> {
        self.connections
            .iter()
            .find(|(_, conn)| filter(conn))
            .map(|(handle, _)| ConnectionHandle(handle))
    }

    fn receive_single(&mut self, handle: ConnectionHandle, data: &[u8]) {
        let Some(conn) = self.connections.get_mut(handle.0) else {
            return;
        };
        if !conn.input.is_idle() {
            warn!(?handle, state = ?conn.input.state, "single frame dropped, reception in progress");
            return;
        }
        debug!(?handle, length = data.len(), "single frame received");
        conn.report_received(handle, data);
    }

    fn receive_first(
        &mut self,
        handle: ConnectionHandle,
        length: usize,
        data: &[u8],
        link: &mut Link,
    ) {
        let Some(conn) = self.connections.get_mut(handle.0) else {
            return;
        };
        if !conn.input.is_idle() {
            warn!(?handle, state = ?conn.input.state, "first frame dropped, reception in progress");
            return;
        }
        if length <= data.len() {
            warn!(?handle, length, "first frame carries the whole message, dropped");
            return;
        }
        match self.mem.alloc(length) {
            Some(mut buffer) => {
                let count = buffer.copy_to(0, data);
                conn.input = Flow {
                    state: FlowState::TxFc,
                    buffer: Some(buffer),
                    remaining: length - count,
                    total_length: length,
                    cf_sn: 1,
                    fs: Some(FlowStatus::ContinueToSend),
                    bs: link.options.receive_block_size,
                    ..Flow::default()
                };
                debug!(?handle, length, "reception started");
            }
            None => {
                conn.input = Flow {
                    state: FlowState::TxFc,
                    fs: Some(FlowStatus::Overflow),
                    ..Flow::default()
                };
                warn!(?handle, length, "no memory for message, sending overflow");
                conn.report_error(handle, Error::Memory);
            }
        }
        self.transmit_or_abort(handle, Direction::Input, link);
    }

    fn receive_consecutive(
        &mut self,
        handle: ConnectionHandle,
        sequence_number: u8,
        data: &[u8],
        link: &mut Link,
    ) {
        let Some(conn) = self.connections.get_mut(handle.0) else {
            return;
        };
        let flow = &mut conn.input;
        if flow.state != FlowState::WaitCf {
            trace!(?handle, state = ?flow.state, "unexpected consecutive frame dropped");
            return;
        }
        link.timeouts.cancel(TimerEvent::InputTimeout(handle));
        if sequence_number != flow.cf_sn {
            warn!(
                ?handle,
                expected = flow.cf_sn,
                received = sequence_number,
                "consecutive frame out of sequence"
            );
            self.abort(handle, Direction::Input, Error::FrameSequence, link);
            return;
        }

        let offset = flow.offset();
        let count = flow.remaining.min(data.len());
        if let Some(buffer) = flow.buffer.as_mut() {
            buffer.copy_to(offset, &data[..count]);
        }
        flow.remaining -= count;
        flow.next_sequence_number();

        if flow.remaining == 0 {
            let buffer = flow.buffer.take();
            flow.reset(&mut self.mem);
            if let Some(buffer) = buffer {
                debug!(?handle, length = buffer.len(), "message received");
                conn.report_received(handle, buffer.as_slice());
                self.mem.free(buffer);
            }
            return;
        }

        flow.block_count = flow.block_count.saturating_add(1);
        if flow.block_complete() {
            flow.block_count = 0;
            flow.state = FlowState::TxFc;
            self.transmit_or_abort(handle, Direction::Input, link);
        } else {
            link.arm(link.options.n_cr, TimerEvent::InputTimeout(handle));
        }
    }

    fn receive_flow_control(
        &mut self,
        handle: ConnectionHandle,
        status: FlowStatus,
        block_size: u8,
        st_min: u8,
        link: &mut Link,
    ) {
        let Some(conn) = self.connections.get_mut(handle.0) else {
            return;
        };
        let flow = &mut conn.output;
        if flow.state != FlowState::WaitFc {
            trace!(?handle, state = ?flow.state, "unexpected flow control dropped");
            return;
        }
        flow.fs = Some(status);
        match status {
            FlowStatus::ContinueToSend => {
                link.timeouts.cancel(TimerEvent::OutputTimeout(handle));
                flow.bs = block_size;
                flow.st = st_min_to_ms(st_min);
                flow.block_count = 0;
                flow.n_wft = link.options.n_wft;
                flow.state = FlowState::TxCf;
                trace!(?handle, block_size, st_min, "continue to send");
                self.transmit_or_abort(handle, Direction::Output, link);
            }
            FlowStatus::Wait if flow.n_wft > 0 => {
                flow.n_wft -= 1;
                trace!(?handle, budget = flow.n_wft, "peer asks to wait");
                link.arm(link.options.n_bs, TimerEvent::OutputTimeout(handle));
            }
            FlowStatus::Wait | FlowStatus::Overflow | FlowStatus::Reserved(_) => {
                self.abort(handle, Direction::Output, Error::FlowStatus, link);
            }
        }
    }

    fn finish_send(&mut self, handle: ConnectionHandle) {
        let Some(conn) = self.connections.get_mut(handle.0) else {
            return;
        };
        let length = conn.output.total_length;
        conn.output.reset(&mut self.mem);
        debug!(?handle, length, "message sent");
        conn.report_sent(handle, length);
    }

    /// Forces a flow to idle, releases its buffer and reports `error`
    fn abort(
        &mut self,
        handle: ConnectionHandle,
        direction: Direction,
        error: Error,
        link: &mut Link,
    ) {
        let Some(conn) = self.connections.get_mut(handle.0) else {
            return;
        };
        match direction {
            Direction::Output => conn.output.reset(&mut self.mem),
            Direction::Input => conn.input.reset(&mut self.mem),
        }
        link.disarm(handle, direction);
        warn!(?handle, ?direction, %error, "transfer aborted");
        conn.report_error(handle, error);
    }

    fn transmit_or_abort(&mut self, handle: ConnectionHandle, direction: Direction, link: &mut Link) {
        if let Err(error) = self.transmit(handle, direction, link) {
            self.abort(handle, direction, error, link);
        }
    }

    /// Builds the next frame of a flow and hands it to the interface
    fn transmit(
        &mut self,
        handle: ConnectionHandle,
        direction: Direction,
        link: &mut Link,
    ) -> Result<()> {
        let conn = self.connections.get_mut(handle.0).ok_or(Error::Argument)?;
        let (binding, encoder) = conn
            .binding
            .zip(conn.encoder(link.options.padding, link.options.fd_brs))
            .ok_or(Error::NotConnected)?;
        let (frame, flow) = match direction {
            Direction::Output => {
                let frame = next_output_frame(&mut conn.output, &encoder).ok_or(Error::Argument)?;
                (frame, &mut conn.output)
            }
            Direction::Input => {
                let flow = &mut conn.input;
                let status = flow.fs.unwrap_or(FlowStatus::ContinueToSend);
                let frame = encoder.flow_control(status, flow.bs, link.options.receive_st_min);
                (frame, flow)
            }
        };

        let confirmed = link.interfaces.output(binding.interface, &frame)?;
        flow.awaiting_confirmation = true;
        let confirmation = Confirmation {
            connection: handle,
            direction,
        };
        if confirmed {
            if link.confirmations.push(confirmation).is_err() {
                warn!(?handle, "confirmation queue full");
            }
        } else {
            match direction {
                Direction::Output => link.arm(link.options.n_as, TimerEvent::OutputTimeout(handle)),
                Direction::Input => link.arm(link.options.n_ar, TimerEvent::InputTimeout(handle)),
            }
        }
        Ok(())
    }
}

/// Builds the frame for the current state of a send flow and consumes its payload
fn next_output_frame(flow: &mut Flow, encoder: &Encoder) -> Option<CanFrame> {
    let offset = flow.offset();
    let data = flow.buffer.as_ref()?.as_slice();
    let (frame, count) = match flow.state {
        FlowState::TxSf => (encoder.single(data), data.len()),
        FlowState::TxFf => encoder.first(flow.total_length, data),
        FlowState::TxCf => {
            let (frame, count) = encoder.consecutive(flow.cf_sn, data.get(offset..)?);
            flow.next_sequence_number();
            (frame, count)
        }
        _ => return None,
    };
    flow.remaining -= count;
    Some(frame)
}
