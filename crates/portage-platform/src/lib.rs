//! HTTP plumbing for AWX and AAP control planes: an authenticated JSON
//! client with pagination, API discovery, and per-flavor resource registries.

pub mod client;
pub mod discovery;
pub mod error;
pub mod platform;
pub mod registry;

pub use client::ApiClient;
pub use discovery::{
    compare_versions, detect_api_prefix, discover_api_prefix, parse_api_root,
    parse_ping_response, ping_path, ping_paths, rewrite_paths, version_at_least, ApiRootResponse,
    PingResponse,
};
pub use error::PlatformError;
pub use platform::{new_platform, Platform};
