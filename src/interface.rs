use crate::error::{Error, InterfaceError, Result};
use crate::frame::CanFrame;
use alloc::boxed::Box;
use alloc::vec::Vec;
use tracing::debug;

/// A can controller the stack can send frames on
pub trait CanInterface {
    /// Hands one frame to the controller for transmission
    fn output(&mut self, frame: &CanFrame) -> core::result::Result<(), InterfaceError>;

    /// Polls one received frame, used by [crate::stack::Stack::process]
    /// Interfaces which deliver frames through [crate::stack::Stack::input] keep the default
    fn receive(&mut self) -> Option<CanFrame> {
        None
    }

    /// If true a successful [CanInterface::output] is not yet a transmit confirmation,
    /// the embedder reports transmitted frames with [crate::stack::Stack::sent]
    fn confirms_asynchronously(&self) -> bool {
        false
    }

    /// Returns true if the controller can send can fd frames
    fn is_fd(&self) -> bool {
        false
    }
}

/// 1-based index of a registered can interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceIndex(u8);

impl InterfaceIndex {
    /// Returns None for index 0
    pub fn new(index: u8) -> Option<Self> {
        (index != 0).then_some(Self(index))
    }

    /// Raw index value
    pub fn get(&self) -> u8 {
        self.0
    }
}

/// Wraps a classic [embedded_can::blocking::Can] driver
///
/// The driver must be non-blocking on receive (return an error when no frame is pending),
/// otherwise [crate::stack::Stack::process] blocks until the next frame arrives.
pub struct BlockingCan<C>(pub C);

impl<C: embedded_can::blocking::Can> CanInterface for BlockingCan<C> {
    fn output(&mut self, frame: &CanFrame) -> core::result::Result<(), InterfaceError> {
        let frame: C::Frame = frame.can().ok_or(InterfaceError::Unsupported)?;
        self.0.transmit(&frame).map_err(|e| {
            debug!(kind = ?embedded_can::Error::kind(&e), "can transmit failed");
            InterfaceError::Driver
        })
    }

    fn receive(&mut self) -> Option<CanFrame> {
        let frame = self.0.receive().ok()?;
        CanFrame::from_can(&frame)
    }
}

/// Registry of can interfaces of a stack
pub(crate) struct Interfaces {
    slots: Vec<Option<Box<dyn CanInterface>>>,
}

impl Interfaces {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn add(&mut self, interface: Box<dyn CanInterface>) -> Result<InterfaceIndex> {
        let position = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(Error::InterfaceLimit)?;
        self.slots[position] = Some(interface);
        Ok(InterfaceIndex(position as u8 + 1))
    }

    pub fn remove(&mut self, index: InterfaceIndex) -> Result<Box<dyn CanInterface>> {
        self.slots
            .get_mut(index.0 as usize - 1)
            .and_then(Option::take)
            .ok_or(Error::Argument)
    }

    pub fn get_mut(&mut self, index: InterfaceIndex) -> Option<&mut (dyn CanInterface + 'static)> {
        self.slots
            .get_mut(index.0 as usize - 1)
            .and_then(|slot| slot.as_deref_mut())
    }

    pub fn contains(&self, index: InterfaceIndex) -> bool {
        matches!(self.slots.get(index.0 as usize - 1), Some(Some(_)))
    }

    /// Returns true if the interface is registered and can send can fd frames
    pub fn is_fd(&self, index: InterfaceIndex) -> bool {
        matches!(self.slots.get(index.0 as usize - 1), Some(Some(interface)) if interface.is_fd())
    }

    pub fn indexes(&self) -> impl Iterator<Item = InterfaceIndex> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(position, _)| InterfaceIndex(position as u8 + 1))
    }

    /// Transmits a frame, returns true if the frame is already confirmed
    pub fn output(&mut self, index: InterfaceIndex, frame: &CanFrame) -> Result<bool> {
        let interface = self.get_mut(index).ok_or(Error::NotConnected)?;
        interface.output(frame)?;
        Ok(!interface.confirms_asynchronously())
    }
}
