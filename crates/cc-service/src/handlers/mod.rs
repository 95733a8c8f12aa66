//! HTTP request handlers.

pub mod calls;
pub mod health;
pub mod ice;
pub mod relay_tickets;
pub mod tags;

pub use calls::{end_call, start_call};
pub use health::{health_check, metrics_handler};
pub use ice::get_ice_config;
pub use relay_tickets::verify_ticket;
pub use tags::{issue_or_rotate, tag_image, validate_by_value, view_tag};
