//! Request protocol: guardrails applied to chat requests before they reach
//! retrieval, plus question validation and response formatting.

pub mod guardrails;
pub mod validation;

pub use guardrails::{
    GuardrailSettings, RejectReason, Screened, SecurityGuardrails, SecurityStats, Severity,
    Violation, ViolationKind,
};
pub use validation::{format_response, validate_question};
