// src/matching/mod.rs
pub mod domain;
pub mod resolver;
pub mod rules;

pub use domain::{extract_domain, initials, DomainNormalizer};
pub use resolver::MatchResolver;
pub use rules::{MatchRule, RuleVerdict};
