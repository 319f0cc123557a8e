//! UDS (ISO 14229) diagnostic client on top of an iso-tp connection
//!
//! Requests are sent with the service methods, answers and failures are collected
//! as [UdsEvent]s which are returned by [UdsClient::next_event].
//! [UdsClient::process] must be called together with [Stack::process].

/// Service identifiers and response codes
pub mod service;

use crate::error::{Error, Result};
use crate::isotp::{ConnectionHandle, IsoTpAddress};
use crate::options::UdsOptions;
use crate::stack::Stack;
use crate::time::{Duration, Instant, TimerDriver};
use crate::timeouts::Timeouts;
use alloc::rc::Rc;
use alloc::vec::Vec;
use crossbeam_queue::ArrayQueue;
use service::*;
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Result of a request or a failure of the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UdsEvent {
    /// Positive response to a request
    PositiveResponse {
        /// Service id of the request
        sid: u8,
        /// Response bytes following the response service id
        data: Vec<u8>,
    },
    /// The server rejected a request
    NegativeResponse {
        /// Service id of the request
        sid: u8,
        /// Reason given by the server
        nrc: NegativeResponseCode,
    },
    /// Transport failure or missing response
    Error(Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Idle,
    WaitResponse { sid: u8 },
    ResponsePending { sid: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UdsTimer {
    P2,
    P2Star,
    S3,
}

enum TransportEvent {
    Received(Vec<u8>),
    Error(Error),
}

type Request = SmallVec<[u8; 8]>;

/// UDS client owning one iso-tp connection of a [Stack]
pub struct UdsClient {
    connection: ConnectionHandle,
    options: UdsOptions,
    transport: Rc<ArrayQueue<TransportEvent>>,
    events: ArrayQueue<UdsEvent>,
    timeouts: Timeouts<UdsTimer>,
    state: RequestState,
    session: u8,
    security_level: u8,
    p2: Duration,
    p2_star: Duration,
}

impl UdsClient {
    /// Allocates an iso-tp connection of `stack` for the client
    pub fn new<T: TimerDriver>(stack: &mut Stack<T>, options: UdsOptions) -> Result<Self> {
        let connection = stack.isotp_new().ok_or(Error::Memory)?;
        let capacity = options.event_queue.max(1);
        let transport = Rc::new(ArrayQueue::new(capacity));

        let queue = transport.clone();
        stack.isotp_set_receive_callback(connection, move |_, data| {
            if queue.push(TransportEvent::Received(data.to_vec())).is_err() {
                warn!("uds transport queue full, response dropped");
            }
        })?;
        let queue = transport.clone();
        stack.isotp_set_error_callback(connection, move |_, error| {
            if queue.push(TransportEvent::Error(error)).is_err() {
                warn!(%error, "uds transport queue full, error dropped");
            }
        })?;

        Ok(Self {
            connection,
            options,
            transport,
            events: ArrayQueue::new(capacity),
            timeouts: Timeouts::with_capacity(3),
            state: RequestState::Idle,
            session: DEFAULT_SESSION,
            security_level: 0,
            p2: options.p2,
            p2_star: options.p2_star,
        })
    }

    /// Releases the iso-tp connection
    pub fn close<T: TimerDriver>(self, stack: &mut Stack<T>) -> Result<()> {
        stack.isotp_close(self.connection)
    }

    /// Iso-tp connection used by the client
    pub fn connection(&self) -> ConnectionHandle {
        self.connection
    }

    /// Returns the next response or error
    pub fn next_event(&mut self) -> Option<UdsEvent> {
        self.events.pop()
    }

    /// Returns true while a response is outstanding
    pub fn is_busy(&self) -> bool {
        self.state != RequestState::Idle
    }

    /// Session reported by the last session control response
    pub fn active_session(&self) -> u8 {
        self.session
    }

    /// Security level unlocked by the caller
    pub fn security_level(&self) -> u8 {
        self.security_level
    }

    /// Records the security level after a successful key exchange
    pub fn set_security_level(&mut self, level: u8) {
        self.security_level = level;
    }

    /// Current P2 and P2* server response times
    /// Set from the options, the last session control response or the setters below
    pub fn timing(&self) -> (Duration, Duration) {
        (self.p2, self.p2_star)
    }

    /// Overrides P2 for the following requests
    pub fn set_p2(&mut self, p2: Duration) {
        self.p2 = p2;
    }

    /// Overrides P2* for the following requests
    pub fn set_p2_star(&mut self, p2_star: Duration) {
        self.p2_star = p2_star;
    }

    /// Handles received responses and expired timers
    pub fn process<T: TimerDriver>(&mut self, stack: &mut Stack<T>) {
        while let Some(event) = self.transport.pop() {
            match event {
                TransportEvent::Received(data) => self.handle_response(stack, &data),
                TransportEvent::Error(error) => {
                    self.finish_request();
                    self.push_event(UdsEvent::Error(error));
                }
            }
        }

        let now = stack.now();
        while let Some(timer) = self.timeouts.pop_due(now) {
            match timer {
                UdsTimer::P2 | UdsTimer::P2Star => {
                    debug!(?timer, "no response from server");
                    self.state = RequestState::Idle;
                    self.push_event(UdsEvent::Error(Error::ReceiveTimeout));
                }
                UdsTimer::S3 if self.options.keep_session => {
                    if let Err(error) =
                        self.tester_present(stack, self.options.tester_present_sub_function)
                    {
                        warn!(%error, "keep alive tester present failed");
                    }
                }
                UdsTimer::S3 => {
                    debug!(session = self.session, "session timed out");
                    self.session = DEFAULT_SESSION;
                    self.security_level = 0;
                }
            }
        }
    }

    // ---------------------- services -------------------------------------------------------------
    /// Binds the client to `address` and requests a diagnostic session
    pub fn start_diagnostic_session<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        address: IsoTpAddress,
        session: u8,
    ) -> Result<()> {
        self.check_idle()?;
        stack.isotp_bind(self.connection, address)?;
        self.request(
            stack,
            ServiceId::DiagnosticSessionControl,
            &[session],
        )
    }

    /// Requests a reset of the server
    pub fn ecu_reset<T: TimerDriver>(&mut self, stack: &mut Stack<T>, reset_type: u8) -> Result<()> {
        self.request(stack, ServiceId::EcuReset, &[reset_type])
    }

    /// Requests a seed (odd sub functions) or sends a key (even sub functions)
    pub fn security_access<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        sub_function: u8,
        parameter: &[u8],
    ) -> Result<()> {
        let mut data = Request::new();
        data.push(sub_function);
        data.extend_from_slice(parameter);
        self.request(stack, ServiceId::SecurityAccess, &data)
    }

    /// Sub functions with [SUPPRESS_POSITIVE_RESPONSE] set expect no answer
    pub fn tester_present<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        sub_function: u8,
    ) -> Result<()> {
        self.check_idle()?;
        let data = [ServiceId::TesterPresent.into(), sub_function];
        self.send(stack, &data, sub_function & SUPPRESS_POSITIVE_RESPONSE == 0)
    }

    /// Reads a record by its 8 bit local identifier
    pub fn read_data_by_local_identifier<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        identifier: u8,
    ) -> Result<()> {
        self.request(stack, ServiceId::ReadDataByLocalIdentifier, &[identifier])
    }

    /// Reads a data record
    pub fn read_data_by_identifier<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        identifier: u16,
    ) -> Result<()> {
        self.request(
            stack,
            ServiceId::ReadDataByIdentifier,
            &identifier.to_be_bytes(),
        )
    }

    /// Writes a data record
    pub fn write_data_by_identifier<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        identifier: u16,
        record: &[u8],
    ) -> Result<()> {
        let mut data = Request::from_slice(&identifier.to_be_bytes());
        data.extend_from_slice(record);
        self.request(stack, ServiceId::WriteDataByIdentifier, &data)
    }

    /// Starts, stops or queries a routine
    pub fn routine_control<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        sub_function: u8,
        routine: u16,
        option: &[u8],
    ) -> Result<()> {
        let mut data = Request::new();
        data.push(sub_function);
        data.extend_from_slice(&routine.to_be_bytes());
        data.extend_from_slice(option);
        self.request(stack, ServiceId::RoutineControl, &data)
    }

    /// Clears a group of dtcs, 0xFFFFFF selects all groups
    pub fn clear_dtc<T: TimerDriver>(&mut self, stack: &mut Stack<T>, group: u32) -> Result<()> {
        let bytes = group.to_be_bytes();
        self.request(stack, ServiceId::ClearDiagnosticInformation, &bytes[1..])
    }

    /// Reads stored dtcs, `sub_function` selects the report type
    pub fn read_dtc_information<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        sub_function: u8,
        status_mask: u8,
    ) -> Result<()> {
        self.request(
            stack,
            ServiceId::ReadDtcInformation,
            &[sub_function, status_mask],
        )
    }

    /// Controls an input or output of the server
    pub fn io_control_by_identifier<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        identifier: u16,
        parameter: u8,
        state: &[u8],
    ) -> Result<()> {
        let mut data = Request::from_slice(&identifier.to_be_bytes());
        data.push(parameter);
        data.extend_from_slice(state);
        self.request(stack, ServiceId::InputOutputControlByIdentifier, &data)
    }

    /// Sends an arbitrary request, the first byte is the service id
    pub fn send_request<T: TimerDriver>(&mut self, stack: &mut Stack<T>, request: &[u8]) -> Result<()> {
        if request.is_empty() {
            return Err(Error::Argument);
        }
        self.check_idle()?;
        self.send(stack, request, true)
    }

    // ------------------------private--------------------------------------------------------------
    fn check_idle(&self) -> Result<()> {
        if self.is_busy() {
            return Err(Error::InProgress);
        }
        Ok(())
    }

    fn request<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        sid: ServiceId,
        parameter: &[u8],
    ) -> Result<()> {
        self.check_idle()?;
        let mut data = Request::new();
        data.push(sid.into());
        data.extend_from_slice(parameter);
        self.send(stack, &data, true)
    }

    fn send<T: TimerDriver>(
        &mut self,
        stack: &mut Stack<T>,
        data: &[u8],
        expect_response: bool,
    ) -> Result<()> {
        stack.isotp_send(self.connection, data)?;
        let now = stack.now();
        debug!(sid = data[0], length = data.len(), "request sent");
        if expect_response {
            self.state = RequestState::WaitResponse { sid: data[0] };
            self.arm(now, self.p2, UdsTimer::P2);
        }
        if self.session != DEFAULT_SESSION {
            self.arm(now, self.options.s3, UdsTimer::S3);
        }
        Ok(())
    }

    fn arm(&mut self, now: Instant, delay: Duration, timer: UdsTimer) {
        self.timeouts.cancel(timer);
        if self.timeouts.schedule(now, delay, timer).is_err() {
            warn!(?timer, "uds timer pool exhausted");
        }
    }

    fn finish_request(&mut self) {
        self.timeouts.cancel(UdsTimer::P2);
        self.timeouts.cancel(UdsTimer::P2Star);
        self.state = RequestState::Idle;
    }

    fn push_event(&mut self, event: UdsEvent) {
        if let Err(event) = self.events.push(event) {
            warn!(?event, "uds event queue full");
        }
    }

    fn handle_response<T: TimerDriver>(&mut self, stack: &mut Stack<T>, data: &[u8]) {
        let outstanding = match self.state {
            RequestState::Idle => {
                debug!(?data, "unsolicited response dropped");
                return;
            }
            RequestState::WaitResponse { sid } | RequestState::ResponsePending { sid } => sid,
        };
        match *data {
            [NEGATIVE_RESPONSE_SID, sid, nrc, ..] if sid == outstanding => {
                match NegativeResponseCode::from(nrc) {
                    NegativeResponseCode::RequestCorrectlyReceivedResponsePending => {
                        debug!(sid, "response pending");
                        self.timeouts.cancel(UdsTimer::P2);
                        self.arm(stack.now(), self.p2_star, UdsTimer::P2Star);
                        self.state = RequestState::ResponsePending { sid };
                    }
                    nrc => {
                        self.finish_request();
                        self.push_event(UdsEvent::NegativeResponse { sid, nrc });
                    }
                }
            }
            [response, ref rest @ ..] if response == outstanding.wrapping_add(POSITIVE_RESPONSE_OFFSET) => {
                if outstanding == u8::from(ServiceId::DiagnosticSessionControl) {
                    self.session_changed(stack, rest);
                }
                self.finish_request();
                self.push_event(UdsEvent::PositiveResponse {
                    sid: outstanding,
                    data: rest.to_vec(),
                });
            }
            _ => warn!(?data, outstanding, "response does not match request"),
        }
    }

    /// Takes over session and timing of a session control response
    fn session_changed<T: TimerDriver>(&mut self, stack: &mut Stack<T>, record: &[u8]) {
        let Some(&session) = record.first() else {
            return;
        };
        self.session = session;
        if let [_, p2_hi, p2_lo, p2_star_hi, p2_star_lo, ..] = *record {
            self.p2 = Duration::from_ticks(u16::from_be_bytes([p2_hi, p2_lo]) as u32);
            // P2* is announced in units of 10 ms
            self.p2_star =
                Duration::from_ticks(u16::from_be_bytes([p2_star_hi, p2_star_lo]) as u32 * 10);
        }
        debug!(session, p2 = self.p2.ticks(), p2_star = self.p2_star.ticks(), "session changed");
        if session == DEFAULT_SESSION {
            self.timeouts.cancel(UdsTimer::S3);
        } else {
            self.arm(stack.now(), self.options.s3, UdsTimer::S3);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CanFrame;
    use crate::interface::InterfaceIndex;
    use crate::options::Options;
    use crate::test_utils::can_driver::TestDriver;
    use crate::test_utils::frame::std_id;
    use crate::test_utils::testtime::TestTimer;

    struct Setup {
        stack: Stack<TestTimer>,
        client: UdsClient,
        driver: TestDriver,
        timer: TestTimer,
        index: InterfaceIndex,
    }

    fn address(index: InterfaceIndex) -> IsoTpAddress {
        IsoTpAddress {
            interface: index,
            tx_id: std_id(0x7E0),
            rx_id: std_id(0x7E8),
            fd: false,
        }
    }

    fn setup_with(options: UdsOptions) -> Setup {
        let timer = TestTimer::new();
        let driver = TestDriver::new();
        let mut stack = Stack::new(Options::default(), timer.clone()).unwrap();
        let index = stack.add_interface(driver.clone()).unwrap();
        let client = UdsClient::new(&mut stack, options).unwrap();
        Setup {
            stack,
            client,
            driver,
            timer,
            index,
        }
    }

    fn setup() -> Setup {
        setup_with(UdsOptions::default())
    }

    impl Setup {
        fn respond(&mut self, data: &[u8]) {
            let frame = CanFrame::new(std_id(0x7E8), data).unwrap();
            self.stack.input(self.index, &frame);
            self.client.process(&mut self.stack);
        }

        fn tick(&mut self, ms: u32) {
            self.timer.set_time(ms);
            self.stack.process();
            self.client.process(&mut self.stack);
        }

        fn sent(&self) -> Vec<u8> {
            self.driver.get_can_frame().unwrap().data().to_vec()
        }

        fn open_session(&mut self) {
            let address = address(self.index);
            self.client
                .start_diagnostic_session(&mut self.stack, address, 0x03)
                .unwrap();
            self.sent();
            self.respond(&[0x06, 0x50, 0x03, 0x00, 0x32, 0x01, 0xF4]);
            self.client.next_event();
        }
    }

    #[test]
    fn session_control() {
        let mut s = setup();
        let address = address(s.index);
        s.client
            .start_diagnostic_session(&mut s.stack, address, 0x03)
            .unwrap();
        assert_eq!(s.sent(), [0x02, 0x10, 0x03, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA]);
        assert!(s.client.is_busy());
        s.respond(&[0x06, 0x50, 0x03, 0x00, 0x19, 0x01, 0xF4]);
        assert_eq!(
            s.client.next_event(),
            Some(UdsEvent::PositiveResponse {
                sid: 0x10,
                data: alloc::vec![0x03, 0x00, 0x19, 0x01, 0xF4]
            })
        );
        assert_eq!(s.client.active_session(), 0x03);
        assert_eq!(
            s.client.timing(),
            (Duration::from_ticks(25), Duration::from_ticks(5000))
        );
        assert!(!s.client.is_busy());
    }

    #[test]
    fn request_encodings() {
        let mut s = setup();
        let address = address(s.index);
        s.stack.isotp_bind(s.client.connection(), address).unwrap();

        s.client.read_data_by_identifier(&mut s.stack, 0xF190).unwrap();
        assert_eq!(&s.sent()[..4], &[0x03, 0x22, 0xF1, 0x90]);
        assert_eq!(
            s.client.ecu_reset(&mut s.stack, 0x01),
            Err(Error::InProgress)
        );
        s.respond(&[0x04, 0x62, 0xF1, 0x90, 0x41]);
        s.client.next_event();

        s.client
            .write_data_by_identifier(&mut s.stack, 0x0102, &[0xAB])
            .unwrap();
        assert_eq!(&s.sent()[..5], &[0x04, 0x2E, 0x01, 0x02, 0xAB]);
        s.respond(&[0x03, 0x6E, 0x01, 0x02]);

        s.client
            .routine_control(&mut s.stack, 0x01, 0xFF00, &[0x10])
            .unwrap();
        assert_eq!(&s.sent()[..6], &[0x05, 0x31, 0x01, 0xFF, 0x00, 0x10]);
        s.respond(&[0x04, 0x71, 0x01, 0xFF, 0x00]);

        s.client.clear_dtc(&mut s.stack, 0xFFFFFF).unwrap();
        assert_eq!(&s.sent()[..5], &[0x04, 0x14, 0xFF, 0xFF, 0xFF]);
        s.respond(&[0x01, 0x54]);

        s.client.read_dtc_information(&mut s.stack, 0x02, 0x08).unwrap();
        assert_eq!(&s.sent()[..4], &[0x03, 0x19, 0x02, 0x08]);
        s.respond(&[0x03, 0x59, 0x02, 0xFF]);

        s.client
            .io_control_by_identifier(&mut s.stack, 0x4711, 0x03, &[0x01])
            .unwrap();
        assert_eq!(&s.sent()[..6], &[0x05, 0x2F, 0x47, 0x11, 0x03, 0x01]);
        s.respond(&[0x04, 0x6F, 0x47, 0x11, 0x03]);

        s.client.security_access(&mut s.stack, 0x01, &[]).unwrap();
        assert_eq!(&s.sent()[..3], &[0x02, 0x27, 0x01]);
        s.respond(&[0x04, 0x67, 0x01, 0x12, 0x34]);

        s.client
            .read_data_by_local_identifier(&mut s.stack, 0x80)
            .unwrap();
        assert_eq!(&s.sent()[..3], &[0x02, 0x21, 0x80]);
        s.respond(&[0x02, 0x61, 0x80]);

        let mut sids = Vec::new();
        while let Some(event) = s.client.next_event() {
            if let UdsEvent::PositiveResponse { sid, .. } = event {
                sids.push(sid);
            }
        }
        assert_eq!(sids, [0x2E, 0x31, 0x14, 0x19, 0x2F, 0x27, 0x21]);
    }

    #[test]
    fn negative_response() {
        let mut s = setup();
        s.stack.isotp_bind(s.client.connection(), address(s.index)).unwrap();
        s.client.ecu_reset(&mut s.stack, 0x01).unwrap();
        s.respond(&[0x03, 0x7F, 0x11, 0x22]);
        assert_eq!(
            s.client.next_event(),
            Some(UdsEvent::NegativeResponse {
                sid: 0x11,
                nrc: NegativeResponseCode::ConditionsNotCorrect
            })
        );
        assert!(!s.client.is_busy());
    }

    #[test]
    fn response_pending_extends_timeout() {
        let mut s = setup();
        s.stack.isotp_bind(s.client.connection(), address(s.index)).unwrap();
        s.client.routine_control(&mut s.stack, 0x01, 0x0203, &[]).unwrap();
        s.timer.set_time(40);
        s.respond(&[0x03, 0x7F, 0x31, 0x78]);
        // P2 no longer applies
        s.tick(200);
        assert_eq!(s.client.next_event(), None);
        assert!(s.client.is_busy());
        s.respond(&[0x04, 0x71, 0x01, 0x02, 0x03]);
        assert_eq!(
            s.client.next_event(),
            Some(UdsEvent::PositiveResponse {
                sid: 0x31,
                data: alloc::vec![0x01, 0x02, 0x03]
            })
        );
    }

    #[test]
    fn p2_timeout() {
        let mut s = setup();
        s.stack.isotp_bind(s.client.connection(), address(s.index)).unwrap();
        s.client.read_data_by_identifier(&mut s.stack, 0xF190).unwrap();
        s.tick(49);
        assert_eq!(s.client.next_event(), None);
        s.tick(50);
        assert_eq!(
            s.client.next_event(),
            Some(UdsEvent::Error(Error::ReceiveTimeout))
        );
        // late responses are ignored
        s.respond(&[0x04, 0x62, 0xF1, 0x90, 0x41]);
        assert_eq!(s.client.next_event(), None);
        assert!(s.client.read_data_by_identifier(&mut s.stack, 0xF190).is_ok());
    }

    #[test]
    fn p2_star_timeout() {
        let mut s = setup();
        s.stack.isotp_bind(s.client.connection(), address(s.index)).unwrap();
        s.client.ecu_reset(&mut s.stack, 0x01).unwrap();
        s.respond(&[0x03, 0x7F, 0x11, 0x78]);
        s.tick(499);
        assert_eq!(s.client.next_event(), None);
        s.tick(500);
        assert_eq!(
            s.client.next_event(),
            Some(UdsEvent::Error(Error::ReceiveTimeout))
        );
    }

    #[test]
    fn timing_overrides() {
        let mut s = setup();
        s.client.set_p2(Duration::from_ticks(100));
        s.client.set_p2_star(Duration::from_ticks(2000));
        assert_eq!(
            s.client.timing(),
            (Duration::from_ticks(100), Duration::from_ticks(2000))
        );
        s.stack.isotp_bind(s.client.connection(), address(s.index)).unwrap();

        s.client.read_data_by_identifier(&mut s.stack, 0xF190).unwrap();
        s.tick(99);
        assert_eq!(s.client.next_event(), None);
        s.tick(100);
        assert_eq!(
            s.client.next_event(),
            Some(UdsEvent::Error(Error::ReceiveTimeout))
        );

        s.client.ecu_reset(&mut s.stack, 0x01).unwrap();
        s.respond(&[0x03, 0x7F, 0x11, 0x78]);
        s.tick(2099);
        assert_eq!(s.client.next_event(), None);
        s.tick(2100);
        assert_eq!(
            s.client.next_event(),
            Some(UdsEvent::Error(Error::ReceiveTimeout))
        );
    }

    #[test]
    fn s3_falls_back_to_default_session() {
        let mut s = setup();
        s.open_session();
        s.client.set_security_level(3);
        assert_eq!(s.client.security_level(), 3);
        s.tick(8999);
        assert_eq!(s.client.active_session(), 0x03);
        s.tick(9000);
        assert_eq!(s.client.active_session(), DEFAULT_SESSION);
        assert_eq!(s.client.security_level(), 0);
    }

    #[test]
    fn s3_keeps_session_alive() {
        let mut s = setup_with(UdsOptions {
            keep_session: true,
            ..UdsOptions::default()
        });
        s.open_session();
        s.tick(9000);
        assert_eq!(&s.sent()[..3], &[0x02, 0x3E, 0x80]);
        // suppressed response, no P2 timeout
        assert!(!s.client.is_busy());
        s.tick(9100);
        assert_eq!(s.client.next_event(), None);
        assert_eq!(s.client.active_session(), 0x03);
        // S3 was re-armed by the tester present
        s.tick(18000);
        assert_eq!(&s.sent()[..3], &[0x02, 0x3E, 0x80]);
    }

    #[test]
    fn transport_error_forwarded() {
        let mut s = setup();
        s.stack.isotp_bind(s.client.connection(), address(s.index)).unwrap();
        s.client
            .write_data_by_identifier(&mut s.stack, 0x0102, &[0; 10])
            .unwrap();
        // no flow control from the server, the transport error ends the request
        s.tick(1000);
        assert_eq!(
            s.client.next_event(),
            Some(UdsEvent::Error(Error::TransmitTimeout))
        );
        assert_eq!(s.client.next_event(), None);
        assert!(!s.client.is_busy());
    }

    #[test]
    fn close_releases_connection() {
        let mut s = setup();
        assert_eq!(s.stack.isotp_connections(), 1);
        s.client.close(&mut s.stack).unwrap();
        assert_eq!(s.stack.isotp_connections(), 0);
    }
}
