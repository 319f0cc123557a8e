use canstack::interface::BlockingCan;
use canstack::time::std::StdTimerDriver;
use canstack::uds::{UdsClient, UdsEvent};
use canstack::{IsoTpAddress, Options, Stack, UdsOptions};
use embedded_can::{Id, StandardId};
use socketcan::{CanSocket, Socket};

const EXTENDED_SESSION: u8 = 0x03;
const VIN: u16 = 0xF190;

fn main() {
    // create a socket and set to non blocking
    let socket = CanSocket::open("vcan0").unwrap();
    socket.set_nonblocking(true).unwrap();

    let mut stack = Stack::new(Options::default(), StdTimerDriver::new()).unwrap();
    let interface = stack.add_interface(BlockingCan(socket)).unwrap();
    let mut client = UdsClient::new(
        &mut stack,
        UdsOptions {
            keep_session: true,
            ..UdsOptions::default()
        },
    )
    .unwrap();

    let address = IsoTpAddress {
        interface,
        tx_id: Id::Standard(StandardId::new(0x7E0).unwrap()),
        rx_id: Id::Standard(StandardId::new(0x7E8).unwrap()),
        fd: false,
    };
    client
        .start_diagnostic_session(&mut stack, address, EXTENDED_SESSION)
        .unwrap();

    loop {
        stack.process();
        client.process(&mut stack);
        while let Some(event) = client.next_event() {
            match event {
                UdsEvent::PositiveResponse { sid: 0x10, .. } => {
                    println!("session {:#04x} active", client.active_session());
                    client.read_data_by_identifier(&mut stack, VIN).unwrap();
                }
                UdsEvent::PositiveResponse { data, .. } => {
                    // data starts with the echoed identifier
                    println!("VIN: {}", String::from_utf8_lossy(data.get(2..).unwrap_or(&[])));
                }
                other => println!("{other:?}"),
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
}
