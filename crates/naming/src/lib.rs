//! # textvar naming
//!
//! Turns text content (and optionally its place in the layer tree) into
//! deterministic, length-bounded variable names.
//!
//! ## Pipeline
//!
//! ```text
//! content / label / ancestors
//!     │
//!     ├──> Normalizer
//!     │      └─> identifier fragment  ([A-Za-z0-9_-], never empty)
//!     │
//!     ├──> Strategy (simple | hierarchical)
//!     │      └─> root/parent/own  or  Content_Fragment
//!     │
//!     └──> Truncation (max 50 chars)
//!            └─> variable name
//! ```
//!
//! ## Example
//!
//! ```
//! use textvar_naming::{normalize, strategy_for, NamingConfig, NamingSubject};
//! use textvar_protocol::NamingMode;
//!
//! assert_eq!(normalize("A & B @ 5%"), "a_and_b_at_5_percent");
//!
//! let naming = strategy_for(NamingMode::Simple, NamingConfig::default());
//! let name = naming
//!     .compose(&NamingSubject { content: "Sign Up", label: "CTA", ancestors: &[] })
//!     .unwrap();
//! assert_eq!(name, "Sign_Up");
//! ```

mod config;
mod error;
mod normalize;
mod strategy;
mod truncate;

pub use config::{NamingConfig, DEFAULT_MAX_NAME_LEN};
pub use error::{NamingError, Result};
pub use normalize::{normalize, normalize_with, CaseMode, FALLBACK_FRAGMENT, LEADING_MARKER};
pub use strategy::{
    is_generic_label, strategy_for, HierarchicalNaming, NamingStrategy, NamingSubject,
    SimpleNaming, StructuralAncestor,
};
pub use truncate::{truncate_name, PATH_SEPARATOR, SEPARATOR};
