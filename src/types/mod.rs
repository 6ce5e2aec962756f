//! Type definitions for the review sentiment service

pub mod response;
pub mod review;

pub use response::{
    ErrorResponse, HealthResponse, LocSegment, MessageResponse, Prediction, ValidationErrorResponse,
    ValidationIssue,
};
pub use review::ReviewRecord;
