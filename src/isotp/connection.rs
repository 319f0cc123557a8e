use super::flow::Flow;
use super::pdu::Encoder;
use crate::error::Error;
use crate::interface::InterfaceIndex;
use crate::pool::Handle;
use alloc::boxed::Box;
use embedded_can::Id;

/// Handle of an iso-tp connection, invalid after the connection was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub(crate) Handle);

/// Addressing of an iso-tp connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsoTpAddress {
    /// Interface the connection sends and receives on
    pub interface: InterfaceIndex,
    /// Identifier of frames we send
    pub tx_id: Id,
    /// Identifier of frames we receive
    pub rx_id: Id,
    /// Send can fd frames
    pub fd: bool,
}

/// Called with a completely received message
pub type ReceiveCallback = Box<dyn FnMut(ConnectionHandle, &[u8])>;
/// Called with the length of a completely sent message
pub type SentCallback = Box<dyn FnMut(ConnectionHandle, usize)>;
/// Called when a transfer was aborted
pub type ErrorCallback = Box<dyn FnMut(ConnectionHandle, Error)>;

#[derive(Default)]
pub(crate) struct Connection {
    pub binding: Option<IsoTpAddress>,
    pub output: Flow,
    pub input: Flow,
    pub on_receive: Option<ReceiveCallback>,
    pub on_sent: Option<SentCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl Connection {
    pub fn encoder(&self, padding: u8, brs: bool) -> Option<Encoder> {
        self.binding.map(|binding| Encoder {
            id: binding.tx_id,
            fd: binding.fd,
            brs: binding.fd && brs,
            padding,
        })
    }

    pub fn receives(&self, interface: InterfaceIndex, id: Id) -> bool {
        self.binding
            .is_some_and(|binding| binding.interface == interface && binding.rx_id == id)
    }

    pub fn transmits(&self, interface: InterfaceIndex, id: Id) -> bool {
        self.binding
            .is_some_and(|binding| binding.interface == interface && binding.tx_id == id)
    }

    pub fn report_error(&mut self, handle: ConnectionHandle, error: Error) {
        if let Some(callback) = self.on_error.as_mut() {
            callback(handle, error);
        }
    }

    pub fn report_sent(&mut self, handle: ConnectionHandle, length: usize) {
        if let Some(callback) = self.on_sent.as_mut() {
            callback(handle, length);
        }
    }

    pub fn report_received(&mut self, handle: ConnectionHandle, data: &[u8]) {
        if let Some(callback) = self.on_receive.as_mut() {
            callback(handle, data);
        }
    }
}
