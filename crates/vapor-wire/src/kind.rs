//! Message kinds understood by this client
//!
//! The protocol defines far more kinds than the client ever touches.
//! Unknown values are preserved losslessly so they can be logged and
//! routed to the unsolicited path instead of failing decode.

use std::fmt;

/// Message kind carried in the frame prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgKind {
    /// Container for a batch of nested frames
    Multi,
    /// Periodic keep-alive sent by the client
    ClientHeartBeat,
    /// Client-initiated logoff
    ClientLogOff,
    /// Persona state / name change request
    ClientChangeStatus,
    /// Result of a classic logon attempt
    ClientLogOnResponse,
    /// Server-initiated logoff notification
    ClientLoggedOff,
    /// Persona state delta for one or more users
    ClientPersonaState,
    /// Friends list snapshot or delta
    ClientFriendsList,
    /// Own-account metadata (persona name)
    ClientAccountInfo,
    /// Entitlement (license) list snapshot
    ClientLicenseList,
    /// Request for persona facets of given users
    ClientRequestFriendData,
    /// Stats/achievements request
    ClientGetUserStats,
    /// Stats/achievements response
    ClientGetUserStatsResponse,
    /// Classic token logon request
    ClientLogon,
    /// Player nickname map
    ClientPlayerNicknameList,
    /// Authenticated named-service call
    ServiceMethodCallFromClient,
    /// Server-initiated named-service message
    ServiceMethod,
    /// Response to a named-service call
    ServiceMethodResponse,
    /// Package/app product-info request
    ClientPicsProductInfoRequest,
    /// Package/app product-info response
    ClientPicsProductInfoResponse,
    /// Unauthenticated named-service call
    ServiceMethodCallFromClientNonAuthed,
    /// Protocol handshake sent on connect
    ClientHello,
    /// Any kind this client does not interpret
    Unknown(u32),
}

impl MsgKind {
    /// Maps a raw kind value (protobuf flag already stripped) to a kind.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Multi,
            703 => Self::ClientHeartBeat,
            706 => Self::ClientLogOff,
            716 => Self::ClientChangeStatus,
            751 => Self::ClientLogOnResponse,
            757 => Self::ClientLoggedOff,
            766 => Self::ClientPersonaState,
            767 => Self::ClientFriendsList,
            768 => Self::ClientAccountInfo,
            780 => Self::ClientLicenseList,
            815 => Self::ClientRequestFriendData,
            818 => Self::ClientGetUserStats,
            819 => Self::ClientGetUserStatsResponse,
            5514 => Self::ClientLogon,
            5587 => Self::ClientPlayerNicknameList,
            5589 => Self::ServiceMethodCallFromClient,
            5594 => Self::ServiceMethod,
            5595 => Self::ServiceMethodResponse,
            8903 => Self::ClientPicsProductInfoRequest,
            8904 => Self::ClientPicsProductInfoResponse,
            9804 => Self::ServiceMethodCallFromClientNonAuthed,
            9805 => Self::ClientHello,
            other => Self::Unknown(other),
        }
    }

    /// Returns the raw wire value of this kind.
    pub fn as_raw(self) -> u32 {
        match self {
            Self::Multi => 1,
            Self::ClientHeartBeat => 703,
            Self::ClientLogOff => 706,
            Self::ClientChangeStatus => 716,
            Self::ClientLogOnResponse => 751,
            Self::ClientLoggedOff => 757,
            Self::ClientPersonaState => 766,
            Self::ClientFriendsList => 767,
            Self::ClientAccountInfo => 768,
            Self::ClientLicenseList => 780,
            Self::ClientRequestFriendData => 815,
            Self::ClientGetUserStats => 818,
            Self::ClientGetUserStatsResponse => 819,
            Self::ClientLogon => 5514,
            Self::ClientPlayerNicknameList => 5587,
            Self::ServiceMethodCallFromClient => 5589,
            Self::ServiceMethod => 5594,
            Self::ServiceMethodResponse => 5595,
            Self::ClientPicsProductInfoRequest => 8903,
            Self::ClientPicsProductInfoResponse => 8904,
            Self::ServiceMethodCallFromClientNonAuthed => 9804,
            Self::ClientHello => 9805,
            Self::Unknown(raw) => raw,
        }
    }

    /// Kinds that carry a named-service payload in either direction.
    pub fn is_service_method(self) -> bool {
        matches!(self, Self::ServiceMethod | Self::ServiceMethodResponse)
    }
}

impl fmt::Display for MsgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "Unknown({raw})"),
            other => write!(f, "{other:?}"),
        }
    }
}
