//! URL handling module
//!
//! This module provides:
//! - Scheme-agnostic patterns and alternate-scheme URLs
//! - Allow/deny/domain link rules built from the configuration
//! - Allowed-domain host matching
//! - Link canonicalization and deduplication keys

mod matcher;
mod normalize;
mod rules;
mod scheme;

pub use matcher::matches_allowed_domain;
pub use normalize::{canonicalize_link, last_path_segment, same_url, url_key};
pub use rules::{compile_patterns, LinkRule, RuleSet};
pub use scheme::{alternate_schemes, to_scheme_agnostic, SchemeSet, DEFAULT_SCHEMES};
