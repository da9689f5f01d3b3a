pub mod api;
pub mod config;
pub mod grpc;
pub mod runtime;
