//! Unsolicited message categories
//!
//! Everything the receive loop cannot hand to the job correlator is
//! decoded into one of these variants and delivered over the session's
//! event channel, so all cache mutation happens at a single dispatch
//! site.

use bytes::Bytes;
use vapor_wire::proto::entitlements::{ClientLicenseList, ProductInfoResponse};
use vapor_wire::proto::friends::{
    ClientFriendsList, ClientPersonaState, ClientPlayerNicknameList,
};
use vapor_wire::proto::login::{ClientAccountInfo, ClientLogonResponse};
use vapor_wire::proto::stats::ClientGetUserStatsResponse;
use vapor_wire::{MsgKind, ResultCode};

/// One decoded unsolicited message
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Result of a classic logon attempt
    LogonResponse(ClientLogonResponse),
    /// Server terminated the authenticated session
    LoggedOff(ResultCode),
    /// Own-account metadata (persona name)
    AccountInfo(ClientAccountInfo),
    /// Friends list snapshot or delta
    FriendsList(ClientFriendsList),
    /// Persona facets for one or more users
    PersonaState(ClientPersonaState),
    /// Entitlement snapshot
    LicenseList(ClientLicenseList),
    /// Package/app metadata batch
    ProductInfo(ProductInfoResponse),
    /// Stats/achievements for one game
    UserStats(ClientGetUserStatsResponse),
    /// Player nickname map
    NicknameList(ClientPlayerNicknameList),
    /// Server-initiated named-service message
    ServiceMethod {
        /// Method name without the version suffix
        method: String,
        /// Undecoded payload
        body: Bytes,
    },
    /// A kind this client does not interpret, logged and surfaced
    /// for visibility only
    Unhandled {
        kind: MsgKind,
    },
}
