pub mod frame {
    use alloc::vec::Vec;
    use embedded_can::{ExtendedId, Id, StandardId};

    pub fn std_id(id: u16) -> Id {
        Id::Standard(StandardId::new(id).unwrap())
    }

    pub fn ext_id(id: u32) -> Id {
        Id::Extended(ExtendedId::new(id).unwrap())
    }

    #[derive(Debug, PartialEq)]
    pub struct TestFrame {
        id: Id,
        data: Vec<u8>,
    }

    impl embedded_can::Frame for TestFrame {
        fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
            Some(TestFrame {
                id: id.into(),
                data: Vec::from(data),
            })
        }

        fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
            None
        }

        fn is_extended(&self) -> bool {
            match self.id {
                Id::Standard(_) => false,
                Id::Extended(_) => true,
            }
        }

        fn is_remote_frame(&self) -> bool {
            false
        }

        fn id(&self) -> Id {
            self.id
        }

        fn dlc(&self) -> usize {
            self.data.len()
        }

        fn data(&self) -> &[u8] {
            &self.data
        }
    }
}

pub mod can_driver {
    use super::frame::TestFrame;
    use crate::error::InterfaceError;
    use crate::frame::CanFrame;
    use crate::interface::CanInterface;
    use alloc::collections::VecDeque;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    #[derive(Default)]
    struct State {
        transmitted: VecDeque<CanFrame>,
        received: VecDeque<CanFrame>,
        fail_output: bool,
    }

    /// Captures transmitted frames, clones share the same queues
    #[derive(Clone, Default)]
    pub struct TestDriver {
        state: Rc<RefCell<State>>,
        asynchronous: bool,
        fd: bool,
    }

    impl TestDriver {
        pub fn new() -> Self {
            Self::default()
        }

        /// Driver which leaves transmit confirmation to the test
        pub fn new_async() -> Self {
            Self {
                asynchronous: true,
                ..Self::default()
            }
        }

        pub fn new_fd() -> Self {
            Self {
                fd: true,
                ..Self::default()
            }
        }

        /// Oldest transmitted frame
        pub fn get_can_frame(&self) -> Option<CanFrame> {
            self.state.borrow_mut().transmitted.pop_front()
        }

        pub fn get_all_frames(&self) -> Vec<CanFrame> {
            self.state.borrow_mut().transmitted.drain(..).collect()
        }

        /// Queues a frame returned by the next receive poll
        pub fn push_can_frame(&self, frame: CanFrame) {
            self.state.borrow_mut().received.push_back(frame);
        }

        pub fn fail_output(&self, fail: bool) {
            self.state.borrow_mut().fail_output = fail;
        }
    }

    impl CanInterface for TestDriver {
        fn output(&mut self, frame: &CanFrame) -> Result<(), InterfaceError> {
            let mut state = self.state.borrow_mut();
            if state.fail_output {
                return Err(InterfaceError::Driver);
            }
            state.transmitted.push_back(*frame);
            Ok(())
        }

        fn receive(&mut self) -> Option<CanFrame> {
            self.state.borrow_mut().received.pop_front()
        }

        fn confirms_asynchronously(&self) -> bool {
            self.asynchronous
        }

        fn is_fd(&self) -> bool {
            self.fd
        }
    }

    /// Minimal [embedded_can::blocking::Can] driver
    #[derive(Clone, Default)]
    pub struct TestCan {
        state: Rc<RefCell<State>>,
    }

    impl TestCan {
        pub fn transmitted(&self) -> Vec<CanFrame> {
            self.state.borrow_mut().transmitted.drain(..).collect()
        }

        pub fn push_received(&self, frame: CanFrame) {
            self.state.borrow_mut().received.push_back(frame);
        }
    }

    impl embedded_can::blocking::Can for TestCan {
        type Frame = TestFrame;
        type Error = embedded_can::ErrorKind;

        fn transmit(&mut self, frame: &Self::Frame) -> Result<(), Self::Error> {
            let frame = CanFrame::from_can(frame).ok_or(embedded_can::ErrorKind::Other)?;
            self.state.borrow_mut().transmitted.push_back(frame);
            Ok(())
        }

        fn receive(&mut self) -> Result<Self::Frame, Self::Error> {
            let frame = self
                .state
                .borrow_mut()
                .received
                .pop_front()
                .ok_or(embedded_can::ErrorKind::Other)?;
            frame.can().ok_or(embedded_can::ErrorKind::Other)
        }
    }
}

pub mod testtime {
    use crate::time::Instant;
    use alloc::rc::Rc;
    use core::cell::Cell;

    /// Manually advanced clock, clones share the same time
    #[derive(Clone, Default)]
    pub struct TestTimer(Rc<Cell<u32>>);

    impl TestTimer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_time(&mut self, ms: u32) {
            self.0.set(ms);
        }

        pub fn advance(&mut self, ms: u32) {
            self.0.set(self.0.get().wrapping_add(ms));
        }
    }

    impl crate::time::TimerDriver for TestTimer {
        fn now(&self) -> Instant {
            Instant::from_ticks(self.0.get())
        }
    }
}
