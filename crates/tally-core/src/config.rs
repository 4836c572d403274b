//! Startup configuration for the debt engine.
//!
//! Built once at process start (defaults, then `TALLY_*` environment
//! overrides), validated, and shared read-only with the dispatcher, the
//! ledger and every reminder worker.

use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::{Result, TallyError};
use crate::order_ref::{OrderPattern, DEFAULT_ORDER_PATTERN};
use crate::types::ReactionKind;

/// Default reminder interval (3 hours).
pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 3 * 60 * 60;

/// Default maximum tracking duration (48 hours).
pub const DEFAULT_MAX_DURATION_SECS: u64 = 48 * 60 * 60;

/// No reminders at or after this local hour.
pub const DEFAULT_QUIET_START_HOUR: u32 = 21;

/// No reminders before this local hour.
pub const DEFAULT_QUIET_END_HOUR: u32 = 9;

/// Local-time window in which reminders are suppressed.
///
/// The window is `[start_hour, end_hour)` and wraps midnight when
/// `start_hour > end_hour`. Equal hours mean no quiet window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QuietHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl QuietHours {
    /// Create a window from `start_hour` (inclusive) to `end_hour` (exclusive).
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    /// A window that never suppresses anything.
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Returns true if reminders must not be sent at local `hour`.
    pub fn contains(&self, hour: u32) -> bool {
        use std::cmp::Ordering;

        match self.start_hour.cmp(&self.end_hour) {
            Ordering::Equal => false,
            Ordering::Less => hour >= self.start_hour && hour < self.end_hour,
            Ordering::Greater => hour >= self.start_hour || hour < self.end_hour,
        }
    }
}

impl Default for QuietHours {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_START_HOUR, DEFAULT_QUIET_END_HOUR)
    }
}

/// Reaction names recognized on rates messages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReactionNames {
    pub mark_paid: String,
    pub host_cancel: String,
}

impl ReactionNames {
    /// Map a raw reaction name to a recognized kind.
    pub fn classify(&self, reaction: &str) -> Option<ReactionKind> {
        if reaction == self.mark_paid {
            Some(ReactionKind::MarkPaid)
        } else if reaction == self.host_cancel {
            Some(ReactionKind::HostCancel)
        } else {
            None
        }
    }

    /// The raw reaction name for `kind`.
    pub fn name(&self, kind: ReactionKind) -> &str {
        match kind {
            ReactionKind::MarkPaid => &self.mark_paid,
            ReactionKind::HostCancel => &self.host_cancel,
        }
    }
}

impl Default for ReactionNames {
    fn default() -> Self {
        Self {
            mark_paid: "money_with_wings".to_string(),
            host_cancel: "x".to_string(),
        }
    }
}

/// Debt engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebtConfig {
    /// Seconds between reminder cycles.
    pub reminder_interval_secs: u64,

    /// Seconds after which an order's tracking is cancelled.
    pub max_duration_secs: u64,

    /// Local-time window without reminders.
    pub quiet_hours: QuietHours,

    /// Recognized reactions.
    pub reactions: ReactionNames,

    /// Regex extracting the order id (named `id` group) from message text.
    pub order_pattern: String,

    /// Zone used when a borrower has no valid timezone.
    pub default_timezone: String,

    /// The system's own chat user id; only reactions on its messages count.
    pub self_id: String,

    /// Where swallowed failures are reported, if anywhere.
    pub operator_transport_id: Option<String>,

    /// Currency label used when rendering amounts.
    pub currency: String,
}

impl Default for DebtConfig {
    fn default() -> Self {
        Self {
            reminder_interval_secs: DEFAULT_REMINDER_INTERVAL_SECS,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            quiet_hours: QuietHours::default(),
            reactions: ReactionNames::default(),
            order_pattern: DEFAULT_ORDER_PATTERN.to_string(),
            default_timezone: "UTC".to_string(),
            self_id: String::new(),
            operator_transport_id: None,
            currency: "nis".to_string(),
        }
    }
}

impl DebtConfig {
    /// Load configuration from `TALLY_*` environment variables over defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("TALLY_REMINDER_INTERVAL_SECS") {
            config.reminder_interval_secs = parse_number("TALLY_REMINDER_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("TALLY_MAX_DURATION_SECS") {
            config.max_duration_secs = parse_number("TALLY_MAX_DURATION_SECS", &v)?;
        }
        if let Some(v) = lookup("TALLY_QUIET_START_HOUR") {
            config.quiet_hours.start_hour = parse_number("TALLY_QUIET_START_HOUR", &v)?;
        }
        if let Some(v) = lookup("TALLY_QUIET_END_HOUR") {
            config.quiet_hours.end_hour = parse_number("TALLY_QUIET_END_HOUR", &v)?;
        }
        if let Some(v) = lookup("TALLY_MARK_PAID_REACTION") {
            config.reactions.mark_paid = v;
        }
        if let Some(v) = lookup("TALLY_HOST_CANCEL_REACTION") {
            config.reactions.host_cancel = v;
        }
        if let Some(v) = lookup("TALLY_ORDER_PATTERN") {
            config.order_pattern = v;
        }
        if let Some(v) = lookup("TALLY_DEFAULT_TIMEZONE") {
            config.default_timezone = v;
        }
        if let Some(v) = lookup("TALLY_SELF_ID") {
            config.self_id = v;
        }
        if let Some(v) = lookup("TALLY_OPERATOR_TRANSPORT_ID") {
            config.operator_transport_id = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("TALLY_CURRENCY") {
            config.currency = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.reminder_interval_secs == 0 {
            return Err(invalid("reminder interval must be positive"));
        }
        if self.reminder_interval_secs >= self.max_duration_secs {
            return Err(invalid(format!(
                "reminder interval ({}s) must be shorter than max duration ({}s)",
                self.reminder_interval_secs, self.max_duration_secs
            )));
        }
        if self.quiet_hours.start_hour > 23 || self.quiet_hours.end_hour > 23 {
            return Err(invalid("quiet hours must be within 0..=23"));
        }
        if self.reactions.mark_paid.is_empty() || self.reactions.host_cancel.is_empty() {
            return Err(invalid("reaction names must not be empty"));
        }
        if self.reactions.mark_paid == self.reactions.host_cancel {
            return Err(invalid("mark-paid and host-cancel reactions must differ"));
        }
        self.default_tz()?;
        OrderPattern::new(&self.order_pattern)?;
        Ok(())
    }

    /// Interval between reminder cycles.
    pub fn reminder_interval(&self) -> Duration {
        Duration::from_secs(self.reminder_interval_secs)
    }

    /// Maximum tracking duration of an order.
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    /// Fallback zone for borrowers without a valid timezone.
    pub fn default_tz(&self) -> Result<Tz> {
        self.default_timezone
            .parse::<Tz>()
            .map_err(|_| invalid(format!("unknown default timezone {:?}", self.default_timezone)))
    }

    /// Compile the order pattern.
    pub fn order_pattern(&self) -> Result<OrderPattern> {
        OrderPattern::new(&self.order_pattern)
    }
}

fn invalid(message: impl Into<String>) -> TallyError {
    TallyError::InvalidConfig {
        message: message.into(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("{key}={value:?} is not a valid number")))
}
