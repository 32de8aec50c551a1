//! # API Shared
//!
//! Shared utilities and definitions for the Alinea APIs.
//!
//! Contains:
//! - Protobuf-generated types (`pb` module, package `alinea.v1`)
//! - Shared services like `HealthService`
//! - API key checking used by the gRPC interceptor
//!
//! Used by `api-grpc` and `api-rest` for common functionality.

// Generated into OUT_DIR by the build script.
pub mod pb {
    tonic::include_proto!("alinea.v1");
}

pub mod auth;
pub mod health;

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("proto_descriptor");

pub use health::HealthService;
pub use pb::*;
