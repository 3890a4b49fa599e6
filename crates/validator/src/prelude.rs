//! Prelude module for convenient imports.
//!
//! Provides a single `use forma_validator::prelude::*;` import that brings
//! in the validator, its collaborators, field and error types, and
//! `serde_json::json!` for building values.

// ============================================================================
// ORCHESTRATION
// ============================================================================

pub use crate::validator::{
    FieldResult, Targets, ValidateOptions, Validator, ValidatorBuilder, VerifyOptions,
    VerifyResult,
};
pub use crate::config::ValidatorConfig;
pub use crate::host::{Host, InlineHost};

// ============================================================================
// RULES
// ============================================================================

pub use crate::rules::{
    RuleOptions, RuleOutcome, RuleRegistry, RuleResult, RuleSet, RuleSpec, parse_rules,
};

// ============================================================================
// FIELDS AND ERRORS
// ============================================================================

pub use crate::error::{Error, Result};
pub use crate::error_bag::{ErrorBag, FieldError};
pub use crate::field::{Field, FieldFlags, FieldId, FieldMatcher, FieldOptions, FlagsPatch};

// ============================================================================
// MESSAGES
// ============================================================================

pub use crate::dictionary::{Dictionary, LocalePatch, Message, MessageArgs, MessageDictionary};

pub use serde_json::{Value, json};
