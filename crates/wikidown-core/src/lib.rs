#![forbid(unsafe_code)]

//! Document model, captured geometry and options shared by the wikidown crates.
//!
//! Design goals:
//! - no live DOM: every conversion reads an owned snapshot ([`dom::Element`])
//! - geometry is captured once (root-space boxes + cumulative transforms) and then only read
//! - pure, deterministic helpers that can be tested with synthetic fixtures

pub mod config;
pub mod dom;
pub mod error;
pub mod geom;

pub use config::{ConvertOptions, RecoveryOptions};
pub use dom::{ComputedStyle, Element, Node, parse_document};
pub use error::{Error, Result};
