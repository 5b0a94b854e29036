//! Friends list, persona state and nickname payloads

/// Friends list snapshot or delta
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientFriendsList {
    /// True when this message only patches the previously sent list
    #[prost(bool, optional, tag = "1")]
    pub bincremental: Option<bool>,
    #[prost(message, repeated, tag = "2")]
    pub friends: Vec<client_friends_list::Friend>,
}

pub mod client_friends_list {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Friend {
        #[prost(fixed64, optional, tag = "1")]
        pub ulfriendid: Option<u64>,
        #[prost(uint32, optional, tag = "2")]
        pub efriendrelationship: Option<u32>,
    }
}

/// Persona state delta for one or more users
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientPersonaState {
    #[prost(uint32, optional, tag = "1")]
    pub status_flags: Option<u32>,
    #[prost(message, repeated, tag = "2")]
    pub friends: Vec<client_persona_state::Friend>,
}

pub mod client_persona_state {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Friend {
        #[prost(fixed64, optional, tag = "1")]
        pub friendid: Option<u64>,
        #[prost(uint32, optional, tag = "2")]
        pub persona_state: Option<u32>,
        #[prost(uint32, optional, tag = "3")]
        pub game_played_app_id: Option<u32>,
        #[prost(string, optional, tag = "15")]
        pub player_name: Option<String>,
        #[prost(bytes = "vec", optional, tag = "31")]
        pub avatar_hash: Option<Vec<u8>>,
        #[prost(string, optional, tag = "55")]
        pub game_name: Option<String>,
        #[prost(message, repeated, tag = "71")]
        pub rich_presence: Vec<RichPresenceEntry>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RichPresenceEntry {
        #[prost(string, optional, tag = "1")]
        pub key: Option<String>,
        #[prost(string, optional, tag = "2")]
        pub value: Option<String>,
    }
}

/// Own persona state / name change request
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientChangeStatus {
    #[prost(uint32, optional, tag = "1")]
    pub persona_state: Option<u32>,
    #[prost(string, optional, tag = "2")]
    pub player_name: Option<String>,
}

/// Request for persona facets of the given users
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientRequestFriendData {
    #[prost(uint32, optional, tag = "1")]
    pub persona_state_requested: Option<u32>,
    #[prost(fixed64, repeated, packed = "false", tag = "2")]
    pub friends: Vec<u64>,
}

/// Player nickname map, pushed after logon and on change
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientPlayerNicknameList {
    #[prost(bool, optional, tag = "1")]
    pub removal: Option<bool>,
    #[prost(bool, optional, tag = "2")]
    pub incremental: Option<bool>,
    #[prost(message, repeated, tag = "3")]
    pub nicknames: Vec<client_player_nickname_list::PlayerNickname>,
}

pub mod client_player_nickname_list {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PlayerNickname {
        #[prost(fixed64, optional, tag = "1")]
        pub steamid: Option<u64>,
        #[prost(string, optional, tag = "3")]
        pub nickname: Option<String>,
    }
}
