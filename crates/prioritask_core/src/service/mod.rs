//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own input validation that needs a clock or configuration.
//! - Keep the request-handling layer decoupled from storage details.

pub mod assignment_service;
pub mod room_service;
pub mod tag_service;
pub mod task_service;
