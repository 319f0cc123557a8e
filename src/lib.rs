#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

//! A CAN diagnostics stack
//! ISO-TP (ISO 15765-2) transport over classic can and can fd with a UDS client on top.
//! Interfaces are plugged in through [interface::CanInterface],
//! [interface::BlockingCan] adapts any [embedded_can::blocking::Can] driver.

extern crate alloc;

/// Message buffers and the shared memory budget
pub mod buffer;
/// Error codes of the stack
pub mod error;
/// Classic and fd can frames
pub mod frame;
/// Can interface abstraction
pub mod interface;
/// ISO-TP connections and frame coding
pub mod isotp;
/// Stack configuration
pub mod options;
/// Fixed size slot pool with generation checked handles
pub mod pool;
/// Raw frame subscriptions
pub mod raw;
/// The stack
pub mod stack;
/// Time utilities for the stack
pub mod time;
/// Deadline ordered timer list
pub mod timeouts;
/// UDS client
pub mod uds;

#[cfg(test)]
mod test_utils;

pub use error::{Error, Result};
pub use frame::CanFrame;
pub use interface::{CanInterface, InterfaceIndex};
pub use isotp::{ConnectionHandle, IsoTpAddress};
pub use options::{Options, UdsOptions};
pub use stack::Stack;
