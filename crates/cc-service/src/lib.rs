//! Curbcall Service Library
//!
//! Backend for anonymous vehicle-owner calls: a visitor scans a rotating
//! QR tag and is bridged to the owner over WebRTC without either party
//! learning the other's phone number.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP middleware layers
//! - `models` - Data models and wire DTOs
//! - `observability` - Metrics definitions
//! - `relay` - WebSocket signaling relay
//! - `routes` - Router and application state
//! - `services` - Business logic layer

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod relay;
pub mod routes;
pub mod services;
