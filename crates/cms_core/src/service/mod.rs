//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep callers decoupled from storage details.

pub mod base_service;

pub use base_service::{
    BaseService, CreateInput, PageMeta, PaginateOptions, Paginated, ParentChange, ServiceOptions,
    UpdateInput,
};
