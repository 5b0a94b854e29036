//! License list and product-info payloads

/// Entitlement snapshot pushed after logon and on purchase
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientLicenseList {
    #[prost(int32, optional, tag = "1")]
    pub eresult: Option<i32>,
    #[prost(message, repeated, tag = "2")]
    pub licenses: Vec<client_license_list::License>,
}

pub mod client_license_list {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct License {
        #[prost(uint32, optional, tag = "1")]
        pub package_id: Option<u32>,
        #[prost(uint32, optional, tag = "7")]
        pub flags: Option<u32>,
        #[prost(uint32, optional, tag = "12")]
        pub owner_id: Option<u32>,
        #[prost(uint64, optional, tag = "17")]
        pub access_token: Option<u64>,
    }
}

/// Batched package/app metadata request
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProductInfoRequest {
    #[prost(message, repeated, tag = "1")]
    pub apps: Vec<product_info_request::AppInfo>,
    #[prost(message, repeated, tag = "2")]
    pub packages: Vec<product_info_request::PackageInfo>,
    #[prost(bool, optional, tag = "3")]
    pub meta_data_only: Option<bool>,
}

pub mod product_info_request {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AppInfo {
        #[prost(uint32, optional, tag = "1")]
        pub appid: Option<u32>,
        #[prost(uint64, optional, tag = "2")]
        pub access_token: Option<u64>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PackageInfo {
        #[prost(uint32, optional, tag = "1")]
        pub packageid: Option<u32>,
        #[prost(uint64, optional, tag = "2")]
        pub access_token: Option<u64>,
    }
}

/// Batched package/app metadata response.
///
/// Package buffers carry binary key-values, app buffers carry text
/// key-values with a trailing NUL. `response_pending` means more
/// batches follow for the same request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProductInfoResponse {
    #[prost(message, repeated, tag = "1")]
    pub apps: Vec<product_info_response::AppInfo>,
    #[prost(uint32, repeated, packed = "false", tag = "2")]
    pub unknown_appids: Vec<u32>,
    #[prost(message, repeated, tag = "3")]
    pub packages: Vec<product_info_response::PackageInfo>,
    #[prost(uint32, repeated, packed = "false", tag = "4")]
    pub unknown_packageids: Vec<u32>,
    #[prost(bool, optional, tag = "6")]
    pub response_pending: Option<bool>,
}

pub mod product_info_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AppInfo {
        #[prost(uint32, optional, tag = "1")]
        pub appid: Option<u32>,
        #[prost(uint32, optional, tag = "2")]
        pub change_number: Option<u32>,
        #[prost(bytes = "vec", optional, tag = "5")]
        pub buffer: Option<Vec<u8>>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PackageInfo {
        #[prost(uint32, optional, tag = "1")]
        pub packageid: Option<u32>,
        #[prost(uint32, optional, tag = "2")]
        pub change_number: Option<u32>,
        #[prost(bytes = "vec", optional, tag = "5")]
        pub buffer: Option<Vec<u8>>,
    }
}
