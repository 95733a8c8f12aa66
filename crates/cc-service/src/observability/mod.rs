//! Observability for the Curbcall service.
//!
//! Provides metrics definitions and the Prometheus recorder setup.

pub mod metrics;
