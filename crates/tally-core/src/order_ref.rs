//! Extraction of order ids from message text.
//!
//! Rates messages carry the order id after a fixed marker phrase, e.g.
//! `"... for order ID ABC123. React to ..."`. The pattern is a regex with a
//! named `id` group, compiled once at startup.

use regex::Regex;

use crate::error::{Result, TallyError};

/// Name of the capture group holding the order id.
pub const ORDER_ID_GROUP: &str = "id";

/// Default extraction pattern: an uppercase alphanumeric token after the
/// marker, terminated by whitespace, a period or the end of the text.
pub const DEFAULT_ORDER_PATTERN: &str = r"order ID (?P<id>[A-Z0-9]+?)(?:[\s.]|$)";

/// Result of matching message text against the order pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderMatch {
    /// The text references this order.
    Order(String),
    /// The text does not reference any order.
    NoMatch,
    /// The text matched but yielded no usable order id.
    MalformedInput(String),
}

/// Compiled order-id pattern.
#[derive(Debug, Clone)]
pub struct OrderPattern {
    regex: Regex,
}

impl OrderPattern {
    /// Compile `pattern`, which must contain a named `id` group.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)?;
        if !regex
            .capture_names()
            .flatten()
            .any(|name| name == ORDER_ID_GROUP)
        {
            return Err(TallyError::InvalidConfig {
                message: format!("order pattern {pattern:?} has no named '{ORDER_ID_GROUP}' group"),
            });
        }
        Ok(Self { regex })
    }

    /// The source pattern.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Find the order referenced by `text`.
    pub fn extract(&self, text: &str) -> OrderMatch {
        let Some(captures) = self.regex.captures(text) else {
            return OrderMatch::NoMatch;
        };
        match captures.name(ORDER_ID_GROUP).map(|m| m.as_str().trim()) {
            Some(id) if !id.is_empty() => OrderMatch::Order(id.to_string()),
            Some(_) => OrderMatch::MalformedInput(format!(
                "empty order id in {:?}",
                &captures[0]
            )),
            None => OrderMatch::MalformedInput(format!(
                "'{ORDER_ID_GROUP}' group did not participate in {:?}",
                &captures[0]
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_terminators() {
        let pattern = OrderPattern::new(DEFAULT_ORDER_PATTERN).unwrap();
        assert_eq!(
            pattern.extract("Rates for Wolt order ID ABC123. Pay up"),
            OrderMatch::Order("ABC123".into())
        );
        assert_eq!(
            pattern.extract("Rates for Wolt order ID ABC123\nDana: 10"),
            OrderMatch::Order("ABC123".into())
        );
        assert_eq!(
            pattern.extract("Wolt order ID XY9"),
            OrderMatch::Order("XY9".into())
        );
    }

    #[test]
    fn test_extract_no_match() {
        let pattern = OrderPattern::new(DEFAULT_ORDER_PATTERN).unwrap();
        assert_eq!(pattern.extract("lunch anyone?"), OrderMatch::NoMatch);
        assert_eq!(pattern.extract("order ID abc123."), OrderMatch::NoMatch);
        assert_eq!(pattern.extract("order ID ABC-123"), OrderMatch::NoMatch);
    }

    #[test]
    fn test_extract_malformed() {
        let pattern =
            OrderPattern::new(r"(?:order ID (?P<id>[A-Z0-9]+)|order ID unknown)").unwrap();
        assert!(matches!(
            pattern.extract("order ID unknown"),
            OrderMatch::MalformedInput(_)
        ));

        let pattern = OrderPattern::new(r"ref (?P<id>[A-Z]*);").unwrap();
        assert!(matches!(
            pattern.extract("ref ;"),
            OrderMatch::MalformedInput(_)
        ));
    }

    #[test]
    fn test_pattern_requires_id_group() {
        assert!(matches!(
            OrderPattern::new(r"order ID ([A-Z0-9]+)"),
            Err(TallyError::InvalidConfig { .. })
        ));
        assert!(matches!(
            OrderPattern::new(r"order ID (?P<id>[A-Z"),
            Err(TallyError::InvalidConfig { .. })
        ));
    }
}
