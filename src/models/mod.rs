//! Request and Response models for the management API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{PutEntryRequest, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
pub use responses::{
    CachesResponse, ClearResponse, DeleteEntryResponse, EntriesResponse, EntryResponse,
    ErrorResponse, HealthResponse, ParametersResponse, PutEntryResponse, StatsResponse,
    SweepResponse,
};
