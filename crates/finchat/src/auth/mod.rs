//! Authentication and authorization

mod service;

pub use service::{AuthService, Claims};
