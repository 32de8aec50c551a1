//! # API gRPC
//!
//! gRPC server implementation for Alinea.
//!
//! Handles:
//! - The `alinea.v1.Alinea` service backed by `alinea-core`
//! - API key authentication through an interceptor
//! - Mapping core errors onto gRPC status codes
//!
//! Uses `api-shared` for the generated protobuf types.

#![warn(rust_2018_idioms)]

pub use service::{AlineaService, ApiKeyInterceptor};
pub use api_shared::pb;

pub mod service;
