use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// First byte of a negative response
pub const NEGATIVE_RESPONSE_SID: u8 = 0x7F;
/// Added to the service id in a positive response
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;
/// Sub function bit asking the server to suppress the positive response
pub const SUPPRESS_POSITIVE_RESPONSE: u8 = 0x80;
/// Session the server starts in
pub const DEFAULT_SESSION: u8 = 0x01;

/// Services the client can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ServiceId {
    /// Switches the diagnostic session
    DiagnosticSessionControl = 0x10,
    /// Resets the server
    EcuReset = 0x11,
    /// Clears stored dtcs
    ClearDiagnosticInformation = 0x14,
    /// Reads stored dtcs
    ReadDtcInformation = 0x19,
    /// Reads a record by 8 bit identifier (KWP2000)
    ReadDataByLocalIdentifier = 0x21,
    /// Reads a record by 16 bit identifier
    ReadDataByIdentifier = 0x22,
    /// Seed and key exchange
    SecurityAccess = 0x27,
    /// Writes a record by 16 bit identifier
    WriteDataByIdentifier = 0x2E,
    /// Overrides an input or output
    InputOutputControlByIdentifier = 0x2F,
    /// Starts, stops or queries a routine
    RoutineControl = 0x31,
    /// Keeps a non default session alive
    TesterPresent = 0x3E,
}

/// Negative response codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum NegativeResponseCode {
    /// No more specific code applies
    GeneralReject = 0x10,
    /// Unknown service id
    ServiceNotSupported = 0x11,
    /// Unknown sub function
    SubFunctionNotSupported = 0x12,
    /// Request length or format is wrong
    IncorrectMessageLengthOrInvalidFormat = 0x13,
    /// Response exceeds the transport limit
    ResponseTooLong = 0x14,
    /// Server is busy, the request may be repeated
    BusyRepeatRequest = 0x21,
    /// Preconditions of the server are not met
    ConditionsNotCorrect = 0x22,
    /// Request arrived in the wrong order
    RequestSequenceError = 0x24,
    /// Parameter outside the supported range
    RequestOutOfRange = 0x31,
    /// Required security level is not unlocked
    SecurityAccessDenied = 0x33,
    /// Key of the security access does not match
    InvalidKey = 0x35,
    /// Too many invalid keys
    ExceededNumberOfAttempts = 0x36,
    /// Security access is locked for a delay
    RequiredTimeDelayNotExpired = 0x37,
    /// Writing memory failed
    GeneralProgrammingFailure = 0x72,
    /// Request accepted, the response follows within P2*
    RequestCorrectlyReceivedResponsePending = 0x78,
    /// Sub function needs another session
    SubFunctionNotSupportedInActiveSession = 0x7E,
    /// Service needs another session
    ServiceNotSupportedInActiveSession = 0x7F,
    /// Code without a variant
    #[num_enum(catch_all)]
    Other(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_ids() {
        assert_eq!(u8::from(ServiceId::InputOutputControlByIdentifier), 0x2F);
        assert_eq!(ServiceId::try_from(0x3E).ok(), Some(ServiceId::TesterPresent));
        assert!(ServiceId::try_from(0x50).is_err());
    }

    #[test]
    fn negative_response_codes() {
        assert_eq!(
            NegativeResponseCode::from(0x78),
            NegativeResponseCode::RequestCorrectlyReceivedResponsePending
        );
        assert_eq!(NegativeResponseCode::from(0x99), NegativeResponseCode::Other(0x99));
        assert_eq!(u8::from(NegativeResponseCode::Other(0x99)), 0x99);
    }
}
