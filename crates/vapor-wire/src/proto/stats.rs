//! User stats and achievement payloads

/// Stats/achievements request for one game
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientGetUserStats {
    #[prost(fixed64, optional, tag = "1")]
    pub game_id: Option<u64>,
    #[prost(uint32, optional, tag = "2")]
    pub crc_stats: Option<u32>,
    #[prost(int32, optional, tag = "3")]
    pub schema_local_version: Option<i32>,
}

/// Stats/achievements response.
///
/// `schema` is a binary key-values blob describing stat and
/// achievement display data. Achievement unlocks arrive packed as
/// 32-bit blocks; bit `b` of block `n` is achievement `32 * (n-1) + b`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientGetUserStatsResponse {
    #[prost(fixed64, optional, tag = "1")]
    pub game_id: Option<u64>,
    #[prost(int32, optional, tag = "2")]
    pub eresult: Option<i32>,
    #[prost(uint32, optional, tag = "3")]
    pub crc_stats: Option<u32>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub schema: Option<Vec<u8>>,
    #[prost(message, repeated, tag = "5")]
    pub stats: Vec<client_get_user_stats_response::Stat>,
    #[prost(message, repeated, tag = "6")]
    pub achievement_blocks: Vec<client_get_user_stats_response::AchievementBlock>,
}

pub mod client_get_user_stats_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Stat {
        #[prost(uint32, optional, tag = "1")]
        pub stat_id: Option<u32>,
        #[prost(uint32, optional, tag = "2")]
        pub stat_value: Option<u32>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AchievementBlock {
        #[prost(uint32, optional, tag = "1")]
        pub achievement_id: Option<u32>,
        #[prost(uint32, repeated, packed = "false", tag = "2")]
        pub unlock_time: Vec<u32>,
    }
}
