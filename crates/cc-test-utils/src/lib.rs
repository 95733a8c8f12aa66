//! Test utilities for Curbcall integration tests.

pub mod server_harness;

pub use server_harness::TestServer;
