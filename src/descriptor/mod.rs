//! Descriptor documents, schemas and identifiers.
//!
//! # Architecture
//!
//! - **types**: `Descriptor`, `ValidationError`, and `DocumentSource` (path,
//!   raw text, parsed value, or auto-detected string)
//! - **schema**: `Schema`, a compiled JSON Schema that validates descriptors and
//!   doubles as a read-only nested mapping for templates
//! - **identifier**: `classify`, deriving the canonical PascalCase type name
//!   from a free-form tool name
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use taskforge::descriptor::{classify, Descriptor, Schema};
//!
//! let schema = Schema::builtin().unwrap();
//! let descriptor = Descriptor::from_value(json!({
//!     "name": "fsl_bet",
//!     "tool-version": "6.0.4",
//!     "command-line": "bet [INFILE] [MASK]"
//! }))
//! .unwrap();
//!
//! assert!(schema.validate(&descriptor).is_empty());
//! assert_eq!(classify(descriptor.name().unwrap()), "FslBet");
//! ```

pub mod identifier;
pub mod schema;
pub mod types;

pub use identifier::{classify, is_canonical, snake_case, UNNAMED_IDENTIFIER};
pub use schema::{Schema, BUILTIN_SCHEMA};
pub use types::{Descriptor, DocumentSource, ValidationError};
