//! # forma-validator
//!
//! A rule-based field validation engine: named fields carry ordered rule
//! sets, a [`Validator`] runs them (synchronously or through deferred
//! outcomes) and records queryable, localizable errors in an [`ErrorBag`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use forma_validator::prelude::*;
//!
//! let validator = Validator::new(Arc::new(RuleRegistry::with_builtin_rules()));
//! validator
//!     .attach(FieldOptions::new("email").scope("signup").rules("required|email"))
//!     .await?;
//!
//! let valid = validator
//!     .validate(Some("signup.email"), Some(json!("nope")), ValidateOptions::new())
//!     .await?;
//! assert!(!valid);
//! assert_eq!(
//!     validator.errors().first("email", Some("signup")).as_deref(),
//!     Some("The email field must be a valid email."),
//! );
//! ```
//!
//! ## Custom Rules
//!
//! Register a bare function or a [`RuleSpec`] with a message generator
//! through [`Validator::extend`]. Rules may answer with a plain boolean, an
//! outcome carrying message data, several outcomes, or a deferred future
//! (see [`RuleResult`]).
//!
//! ## Selectors
//!
//! Fields and errors are addressed as `name`, `scope.name`, `scope.name:rule`,
//! `#id` or `scope.*`; see [`selector`].

pub mod config;
pub mod dictionary;
pub mod error;
pub mod error_bag;
pub mod field;
pub mod field_bag;
pub mod host;
pub mod prelude;
pub mod rules;
pub mod selector;
pub mod validator;

pub use config::ValidatorConfig;
pub use dictionary::{Dictionary, DictionaryPatch, LocalePatch, Message, MessageDictionary};
pub use error::{Error, Result};
pub use error_bag::{ErrorBag, FieldError};
pub use field::{Field, FieldFlags, FieldId, FieldMatcher, FieldOptions, FlagsPatch};
pub use field_bag::FieldBag;
pub use host::{Host, InlineHost};
pub use rules::{RuleOptions, RuleOutcome, RuleRegistry, RuleResult, RuleSet, RuleSpec, parse_rules};
pub use selector::Selector;
pub use validator::{
    FieldResult, Targets, ValidateOptions, Validator, ValidatorBuilder, VerifyOptions,
    VerifyResult,
};
