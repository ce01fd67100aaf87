//! # KeyBox Testkit
//!
//! Test utilities for KeyBox.
//!
//! This crate provides:
//! - Fixture type models and a harness wiring schemas, registry and cache
//! - Property-based test generators using proptest
//! - Concurrency stress helpers
//! - Key envelope test vectors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keybox_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_orders() {
//!     let h = order_harness();
//!     let (customer, order) = scenarios::customer_order(&h, "ACME", 7);
//!     assert_eq!(h.ring(&order).get("Client").unwrap(), "ACME".into());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
pub use vectors::*;
