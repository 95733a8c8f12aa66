//! Business logic: stores, issuers, and the scan orchestrator.

pub mod collaborators;
pub mod credential_issuer;
pub mod session_registry;
pub mod tag_store;
pub mod tag_view;
pub mod ticket_issuer;
