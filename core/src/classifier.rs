//! Failure classification for power operation errors
//!
//! Drivers report failures as free text. This module maps that text onto a
//! small taxonomy that drives retry and breaker decisions:
//!
//! - [`FailureType::Configuration`]: operator or setup error, never worth retrying
//! - [`FailureType::Transient`]: environmental or network error, a retry may succeed
//! - [`FailureType::Unknown`]: unrecognized text, no guidance implied
//!
//! Matching is a case-insensitive substring search over an ordered table.
//! Configuration patterns are always checked before transient ones, so a
//! message that matches both classifies as configuration.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

/// Classification of a power operation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureType {
    /// Configuration error, retrying will not help
    Configuration,
    /// Transient error, retrying may succeed
    Transient,
    /// Unrecognized error text
    Unknown,
}

impl FailureType {
    /// Lowercase name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureType::Configuration => "configuration",
            FailureType::Transient => "transient",
            FailureType::Unknown => "unknown",
        }
    }

    /// Configuration failures are terminal: no retry can fix them
    pub fn is_terminal(&self) -> bool {
        matches!(self, FailureType::Configuration)
    }

    // Lower value is checked first
    fn precedence(&self) -> u8 {
        match self {
            FailureType::Configuration => 0,
            FailureType::Transient => 1,
            FailureType::Unknown => 2,
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in patterns, in match order. All entries are lowercase.
pub const DEFAULT_PATTERNS: &[(&str, FailureType)] = &[
    ("no rack controllers can access", FailureType::Configuration),
    ("no bmc is defined", FailureType::Configuration),
    ("unconfigured power type", FailureType::Configuration),
    ("unknown power type", FailureType::Configuration),
    ("power type not set", FailureType::Configuration),
    ("no power type", FailureType::Configuration),
    ("bmc is not accessible", FailureType::Configuration),
    ("cannot start commissioning", FailureType::Configuration),
    ("timeout", FailureType::Transient),
    ("connection refused", FailureType::Transient),
    ("connection reset", FailureType::Transient),
    ("network unreachable", FailureType::Transient),
    ("host unreachable", FailureType::Transient),
    ("temporary failure", FailureType::Transient),
    ("try again", FailureType::Transient),
    ("temporarily unavailable", FailureType::Transient),
];

/// Classify raw failure text using the built-in pattern table
///
/// Total and deterministic: text that matches nothing is
/// [`FailureType::Unknown`].
///
/// ```rust
/// use power_breaker::{classify, FailureType};
///
/// assert_eq!(classify("Connection Refused by host"), FailureType::Transient);
/// assert_eq!(classify("timeout: unknown power type"), FailureType::Configuration);
/// assert_eq!(classify("disk full"), FailureType::Unknown);
/// ```
pub fn classify(message: &str) -> FailureType {
    match_table(
        &message.to_lowercase(),
        DEFAULT_PATTERNS.iter().map(|(p, t)| (*p, *t)),
    )
}

/// Classify an error value by its `Display` text
pub fn classify_error(error: &dyn Error) -> FailureType {
    classify(&error.to_string())
}

fn match_table<'a>(
    lowered: &str,
    table: impl IntoIterator<Item = (&'a str, FailureType)>,
) -> FailureType {
    table
        .into_iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map(|(_, failure_type)| failure_type)
        .unwrap_or(FailureType::Unknown)
}

/// Trait for turning failure text into a [`FailureType`]
///
/// The orchestrator holds one of these and feeds its output into
/// [`CircuitBreaker::record_failure`](crate::CircuitBreaker::record_failure).
///
/// # Examples
///
/// ```rust
/// use power_breaker::{FailureClassifier, FailureType};
///
/// #[derive(Debug)]
/// struct IpmiClassifier;
///
/// impl FailureClassifier for IpmiClassifier {
///     fn classify(&self, message: &str) -> FailureType {
///         if message.contains("0xc3") {
///             FailureType::Transient
///         } else {
///             power_breaker::classify(message)
///         }
///     }
/// }
///
/// assert_eq!(IpmiClassifier.classify("completion code 0xc3"), FailureType::Transient);
/// ```
pub trait FailureClassifier: Send + Sync + fmt::Debug {
    /// Map failure text to a category. Must never fail.
    fn classify(&self, message: &str) -> FailureType;
}

/// Classifier backed by the built-in pattern table
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl FailureClassifier for DefaultClassifier {
    fn classify(&self, message: &str) -> FailureType {
        classify(message)
    }
}

/// Extensible pattern table classifier
///
/// Starts from [`DEFAULT_PATTERNS`]. Extra patterns are slotted in by
/// category so configuration patterns keep precedence over transient ones,
/// and within a category earlier patterns win.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    patterns: Vec<(String, FailureType)>,
}

impl PatternClassifier {
    /// Create a classifier with the built-in patterns
    pub fn new() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS
                .iter()
                .map(|(p, t)| ((*p).to_string(), *t))
                .collect(),
        }
    }

    /// Create a classifier with no patterns (everything is `Unknown`)
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Add a pattern after the existing patterns of the same category
    pub fn with_pattern(mut self, pattern: impl Into<String>, failure_type: FailureType) -> Self {
        let pattern = pattern.into().to_lowercase();
        let at = self
            .patterns
            .iter()
            .position(|(_, t)| t.precedence() > failure_type.precedence())
            .unwrap_or(self.patterns.len());
        self.patterns.insert(at, (pattern, failure_type));
        self
    }

    /// Patterns in match order
    pub fn patterns(&self) -> impl Iterator<Item = (&str, FailureType)> {
        self.patterns.iter().map(|(p, t)| (p.as_str(), *t))
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureClassifier for PatternClassifier {
    fn classify(&self, message: &str) -> FailureType {
        match_table(&message.to_lowercase(), self.patterns())
    }
}

/// Classifier using a closure
pub struct PredicateClassifier<F>
where
    F: Fn(&str) -> FailureType + Send + Sync,
{
    predicate: F,
}

impl<F> PredicateClassifier<F>
where
    F: Fn(&str) -> FailureType + Send + Sync,
{
    /// Create a new closure-based classifier
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> FailureClassifier for PredicateClassifier<F>
where
    F: Fn(&str) -> FailureType + Send + Sync,
{
    fn classify(&self, message: &str) -> FailureType {
        (self.predicate)(message)
    }
}

impl<F> fmt::Debug for PredicateClassifier<F>
where
    F: Fn(&str) -> FailureType + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateClassifier")
            .field("predicate", &"<closure>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_transient() {
        assert_eq!(classify("Connection Refused by host"), FailureType::Transient);
        assert_eq!(classify("IPMI TIMEOUT after 30s"), FailureType::Transient);
        assert_eq!(
            classify("Resource temporarily unavailable"),
            FailureType::Transient
        );
    }

    #[test]
    fn test_configuration_patterns() {
        assert_eq!(
            classify("No rack controllers can access the BMC of node abc"),
            FailureType::Configuration
        );
        assert_eq!(classify("Power type not set"), FailureType::Configuration);
        assert_eq!(
            classify("Cannot start commissioning: no BMC is defined"),
            FailureType::Configuration
        );
    }

    #[test]
    fn test_configuration_takes_precedence() {
        assert_eq!(
            classify("timeout: unknown power type"),
            FailureType::Configuration
        );
        assert_eq!(
            classify("connection refused because BMC is not accessible"),
            FailureType::Configuration
        );
    }

    #[test]
    fn test_unmatched_is_unknown() {
        assert_eq!(classify("disk full"), FailureType::Unknown);
        assert_eq!(classify(""), FailureType::Unknown);
    }

    #[test]
    fn test_classify_error_uses_display() {
        let err = std::io::Error::other("Network unreachable");
        assert_eq!(classify_error(&err), FailureType::Transient);
    }

    #[test]
    fn test_default_table_is_lowercase_and_ordered() {
        let first_transient = DEFAULT_PATTERNS
            .iter()
            .position(|(_, t)| *t == FailureType::Transient)
            .unwrap();

        for (i, (pattern, failure_type)) in DEFAULT_PATTERNS.iter().enumerate() {
            assert_eq!(*pattern, pattern.to_lowercase());
            if i < first_transient {
                assert_eq!(*failure_type, FailureType::Configuration);
            } else {
                assert_eq!(*failure_type, FailureType::Transient);
            }
        }
    }

    #[test]
    fn test_pattern_classifier_matches_default() {
        let classifier = PatternClassifier::new();
        for msg in [
            "Connection reset by peer",
            "no power type configured",
            "kernel panic",
        ] {
            assert_eq!(classifier.classify(msg), classify(msg));
        }
    }

    #[test]
    fn test_pattern_classifier_custom_patterns_keep_precedence() {
        let classifier = PatternClassifier::new()
            .with_pattern("Session Busy", FailureType::Transient)
            .with_pattern("Invalid Credentials", FailureType::Configuration);

        assert_eq!(
            classifier.classify("IPMI session busy"),
            FailureType::Transient
        );
        // Custom configuration pattern beats built-in transient pattern
        assert_eq!(
            classifier.classify("timeout: invalid credentials"),
            FailureType::Configuration
        );

        let order: Vec<FailureType> = classifier.patterns().map(|(_, t)| t).collect();
        let mut sorted = order.clone();
        sorted.sort_by_key(|t| t.precedence());
        assert_eq!(order, sorted);
    }

    #[test]
    fn test_empty_classifier() {
        assert_eq!(
            PatternClassifier::empty().classify("timeout"),
            FailureType::Unknown
        );
    }

    #[test]
    fn test_predicate_classifier() {
        let classifier = PredicateClassifier::new(|msg| {
            if msg.starts_with("E42") {
                FailureType::Configuration
            } else {
                classify(msg)
            }
        });

        assert_eq!(classifier.classify("E42 bad cipher suite"), FailureType::Configuration);
        assert_eq!(classifier.classify("try again later"), FailureType::Transient);
        assert!(format!("{:?}", classifier).contains("<closure>"));
    }

    #[test]
    fn test_failure_type_serde() {
        let json = serde_json::to_string(&FailureType::Configuration).unwrap();
        assert_eq!(json, "\"configuration\"");

        let parsed: FailureType = serde_json::from_str("\"transient\"").unwrap();
        assert_eq!(parsed, FailureType::Transient);
        assert_eq!(FailureType::Unknown.to_string(), "unknown");
    }

    #[test]
    fn test_terminal() {
        assert!(FailureType::Configuration.is_terminal());
        assert!(!FailureType::Transient.is_terminal());
        assert!(!FailureType::Unknown.is_terminal());
    }
}
