use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Errors reported by the stack
///
/// Misuse of the synchronous API is returned directly from the call.
/// Failures found while a transfer is in flight are delivered to the error callback of the connection,
/// after the affected flow was reset and its buffer released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, IntoPrimitive, TryFromPrimitive)]
#[repr(i8)]
pub enum Error {
    /// An argument was invalid (unknown handle, empty payload, payload too long)
    #[error("invalid argument")]
    Argument = -1,
    /// The can interface rejected a frame
    #[error("can interface failure")]
    Interface = -2,
    /// No more can interfaces can be registered
    #[error("can interface limit reached")]
    InterfaceLimit = -3,
    /// A pool or the buffer memory is exhausted
    #[error("out of memory")]
    Memory = -4,
    /// A frame was not confirmed or the peer did not send flow control in time
    #[error("transmit timeout")]
    TransmitTimeout = -5,
    /// The peer did not send the next frame in time
    #[error("receive timeout")]
    ReceiveTimeout = -6,
    /// The flow is busy with another transfer
    #[error("operation in progress")]
    InProgress = -7,
    /// The peer answered with overflow, an invalid flow status or too many wait frames
    #[error("unexpected flow status")]
    FlowStatus = -8,
    /// A consecutive frame arrived with an unexpected serial number
    #[error("frame sequence error")]
    FrameSequence = -9,
    /// The connection is not bound to an existing can interface
    #[error("not connected")]
    NotConnected = -10,
}

/// Result type of the stack
pub type Result<T> = core::result::Result<T, Error>;

/// Failure reported by a [crate::interface::CanInterface] when transmitting a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InterfaceError {
    /// The driver has no room for the frame right now
    #[error("transmit queue full")]
    WouldBlock,
    /// The frame can not be represented by the driver (e.g. FD frame on a classic controller)
    #[error("frame not supported by driver")]
    Unsupported,
    /// Any other driver error
    #[error("driver error")]
    Driver,
}

impl From<InterfaceError> for Error {
    fn from(_: InterfaceError) -> Self {
        Error::Interface
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(i8::from(Error::Argument), -1);
        assert_eq!(i8::from(Error::FrameSequence), -9);
        assert_eq!(Error::try_from(-6).ok(), Some(Error::ReceiveTimeout));
        assert!(Error::try_from(0).is_err());
    }

    #[test]
    fn interface_error_maps_to_interface() {
        assert_eq!(Error::from(InterfaceError::WouldBlock), Error::Interface);
    }
}
