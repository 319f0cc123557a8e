use crate::error::{Error, Result};
use crate::frame::CanFrame;
use crate::interface::{InterfaceIndex, Interfaces};
use crate::pool::{Handle, SlotPool};
use alloc::boxed::Box;
use alloc::vec::Vec;
use tracing::{debug, trace};

/// Handle of a raw frame subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(Handle);

/// Called with every frame received on the bound interface, returns true to consume the frame
pub type RawReceiveCallback = Box<dyn FnMut(RawHandle, &CanFrame) -> bool>;
/// Called when a frame sent by the subscription left the interface
pub type RawSentCallback = Box<dyn FnMut(RawHandle, &CanFrame)>;

struct RawConnection {
    interface: InterfaceIndex,
    /// Frame handed to an interface which confirms asynchronously
    pending: Option<CanFrame>,
    on_receive: Option<RawReceiveCallback>,
    on_sent: Option<RawSentCallback>,
}

/// Raw frame subscriptions, consulted before the transport
pub(crate) struct Raw {
    connections: SlotPool<RawConnection>,
    /// Lookup order, subscriptions which consumed a frame move to the front
    order: Vec<Handle>,
}

impl Raw {
    pub fn new(capacity: usize) -> Self {
        Self {
            connections: SlotPool::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    pub fn open(&mut self, interface: InterfaceIndex) -> Option<RawHandle> {
        let handle = self.connections.alloc(RawConnection {
            interface,
            pending: None,
            on_receive: None,
            on_sent: None,
        })?;
        self.order.insert(0, handle);
        debug!(?handle, ?interface, "raw connection opened");
        Some(RawHandle(handle))
    }

    pub fn bind(&mut self, handle: RawHandle, interface: InterfaceIndex) -> Result<()> {
        let conn = self.connections.get_mut(handle.0).ok_or(Error::Argument)?;
        conn.interface = interface;
        conn.pending = None;
        Ok(())
    }

    pub fn close(&mut self, handle: RawHandle) -> Result<()> {
        self.connections.free(handle.0).ok_or(Error::Argument)?;
        self.order.retain(|h| *h != handle.0);
        debug!(?handle, "raw connection closed");
        Ok(())
    }

    pub fn set_receive_callback(
        &mut self,
        handle: RawHandle,
        callback: RawReceiveCallback,
    ) -> Result<()> {
        let conn = self.connections.get_mut(handle.0).ok_or(Error::Argument)?;
        conn.on_receive = Some(callback);
        Ok(())
    }

    pub fn set_sent_callback(&mut self, handle: RawHandle, callback: RawSentCallback) -> Result<()> {
        let conn = self.connections.get_mut(handle.0).ok_or(Error::Argument)?;
        conn.on_sent = Some(callback);
        Ok(())
    }

    pub fn send(
        &mut self,
        handle: RawHandle,
        frame: &CanFrame,
        interfaces: &mut Interfaces,
    ) -> Result<()> {
        let conn = self.connections.get_mut(handle.0).ok_or(Error::Argument)?;
        if conn.pending.is_some() {
            return Err(Error::InProgress);
        }
        if interfaces.output(conn.interface, frame)? {
            if let Some(callback) = conn.on_sent.as_mut() {
                callback(handle, frame);
            }
        } else {
            conn.pending = Some(*frame);
        }
        trace!(?handle, id = ?frame.id(), "raw frame sent");
        Ok(())
    }

    /// Offers a received frame to the subscriptions, returns true if one consumed it
    pub fn input(&mut self, interface: InterfaceIndex, frame: &CanFrame) -> bool {
        for position in 0..self.order.len() {
            let handle = self.order[position];
            let Some(conn) = self.connections.get_mut(handle) else {
                continue;
            };
            if conn.interface != interface {
                continue;
            }
            let Some(callback) = conn.on_receive.as_mut() else {
                continue;
            };
            if callback(RawHandle(handle), frame) {
                self.order.remove(position);
                self.order.insert(0, handle);
                return true;
            }
        }
        false
    }

    /// Matches an asynchronous transmit confirmation, returns true if a subscription sent the frame
    pub fn sent(&mut self, interface: InterfaceIndex, frame: &CanFrame) -> bool {
        let found = self.connections.iter().find_map(|(handle, conn)| {
            (conn.interface == interface && conn.pending.as_ref() == Some(frame)).then_some(handle)
        });
        let Some(conn) = found.and_then(|handle| self.connections.get_mut(handle)) else {
            return false;
        };
        conn.pending = None;
        if let (Some(callback), Some(handle)) = (conn.on_sent.as_mut(), found) {
            callback(RawHandle(handle), frame);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::can_driver::TestDriver;
    use crate::test_utils::frame::std_id;
    use alloc::rc::Rc;
    use core::cell::RefCell;

    fn setup() -> (Raw, Interfaces, TestDriver, InterfaceIndex) {
        let driver = TestDriver::new();
        let mut interfaces = Interfaces::with_capacity(2);
        let index = interfaces.add(Box::new(driver.clone())).unwrap();
        (Raw::new(2), interfaces, driver, index)
    }

    #[test]
    fn pool_limit() {
        let (mut raw, _, _, index) = setup();
        let a = raw.open(index).unwrap();
        raw.open(index).unwrap();
        assert!(raw.open(index).is_none());
        raw.close(a).unwrap();
        assert_eq!(raw.close(a), Err(Error::Argument));
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn consuming_subscription_moves_to_front() {
        let (mut raw, _, _, index) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let first = raw.open(index).unwrap();
        let second = raw.open(index).unwrap();
        // second is looked up first, it only observes
        let log = seen.clone();
        raw.set_receive_callback(
            second,
            Box::new(move |h, _| {
                log.borrow_mut().push(h);
                false
            }),
        )
        .unwrap();
        let log = seen.clone();
        raw.set_receive_callback(
            first,
            Box::new(move |h, _| {
                log.borrow_mut().push(h);
                true
            }),
        )
        .unwrap();

        let frame = CanFrame::new(std_id(0x100), &[1]).unwrap();
        assert!(raw.input(index, &frame));
        assert_eq!(*seen.borrow(), [second, first]);
        seen.borrow_mut().clear();
        assert!(raw.input(index, &frame));
        assert_eq!(*seen.borrow(), [first]);

        let other = InterfaceIndex::new(2).unwrap();
        assert!(!raw.input(other, &frame));
    }

    #[test]
    fn send_confirms_synchronously() {
        let (mut raw, mut interfaces, driver, index) = setup();
        let handle = raw.open(index).unwrap();
        let sent = Rc::new(RefCell::new(0));
        let counter = sent.clone();
        raw.set_sent_callback(handle, Box::new(move |_, _| *counter.borrow_mut() += 1))
            .unwrap();
        let frame = CanFrame::new(std_id(0x200), &[1, 2]).unwrap();
        raw.send(handle, &frame, &mut interfaces).unwrap();
        assert_eq!(driver.get_can_frame(), Some(frame));
        assert_eq!(*sent.borrow(), 1);
        assert!(!raw.sent(index, &frame));
    }

    #[test]
    fn send_confirms_asynchronously() {
        let driver = TestDriver::new_async();
        let mut interfaces = Interfaces::with_capacity(1);
        let index = interfaces.add(Box::new(driver.clone())).unwrap();
        let mut raw = Raw::new(1);
        let handle = raw.open(index).unwrap();
        let sent = Rc::new(RefCell::new(0));
        let counter = sent.clone();
        raw.set_sent_callback(handle, Box::new(move |_, _| *counter.borrow_mut() += 1))
            .unwrap();
        let frame = CanFrame::new(std_id(0x200), &[1, 2]).unwrap();
        raw.send(handle, &frame, &mut interfaces).unwrap();
        assert_eq!(*sent.borrow(), 0);
        assert_eq!(raw.send(handle, &frame, &mut interfaces), Err(Error::InProgress));
        assert!(raw.sent(index, &frame));
        assert_eq!(*sent.borrow(), 1);
        assert_eq!(driver.get_all_frames().len(), 1);
    }
}
