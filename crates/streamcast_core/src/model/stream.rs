//! Cash-flow streams: the nodes of the model graph.

use serde::{Deserialize, Serialize};

use crate::model::Distribution;

/// Whether a stream produces or consumes cash. The sign of every projected
/// cash flow is derived from this, never from the raw amount's sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamType {
    Revenue,
    Cost,
}

fn default_conversion_rate() -> f64 {
    1.0
}

fn default_amount_is_ratio() -> bool {
    true
}

/// A cash-flow source or sink.
///
/// A stream with a `parent_stream_id` is a *child stream*: its `amount` is a
/// per-event ratio or absolute value keyed off the parent's realized cash
/// flows, not a monthly amount. When both `unit_value` and `market_units`
/// are set, their product replaces `amount` for root projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub name: String,
    pub stream_type: StreamType,
    /// First active month (inclusive).
    pub start_month: usize,
    /// Last active month (inclusive). Absent means the stream runs through
    /// the forecast horizon and is treated as perpetual.
    #[serde(default)]
    pub end_month: Option<usize>,
    pub amount: Distribution,
    /// Multiplicative month-indexed factor (typically LOGISTIC or LINEAR).
    #[serde(default)]
    pub adoption_curve: Option<Distribution>,
    /// Back-reference to the triggering parent; not owning.
    #[serde(default)]
    pub parent_stream_id: Option<String>,
    /// Fraction of parent events that convert, in `[0, 1]`.
    #[serde(default = "default_conversion_rate")]
    pub conversion_rate: f64,
    /// Months between a parent event and the child's first event.
    #[serde(default)]
    pub trigger_delay_months: usize,
    /// Recurrence interval for child events; absent means a single event
    /// per parent event.
    #[serde(default)]
    pub periodicity_months: Option<usize>,
    /// Whether the child amount scales the parent's magnitude (ratio mode)
    /// or stands alone (absolute mode).
    #[serde(default = "default_amount_is_ratio")]
    pub amount_is_ratio: bool,
    #[serde(default)]
    pub unit_value: Option<Distribution>,
    #[serde(default)]
    pub market_units: Option<Distribution>,
}

impl Stream {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        stream_type: StreamType,
        start_month: usize,
        amount: Distribution,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stream_type,
            start_month,
            end_month: None,
            amount,
            adoption_curve: None,
            parent_stream_id: None,
            conversion_rate: 1.0,
            trigger_delay_months: 0,
            periodicity_months: None,
            amount_is_ratio: true,
            unit_value: None,
            market_units: None,
        }
    }

    #[must_use]
    pub fn with_end_month(mut self, end_month: usize) -> Self {
        self.end_month = Some(end_month);
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_stream_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn with_conversion_rate(mut self, rate: f64) -> Self {
        self.conversion_rate = rate;
        self
    }

    #[must_use]
    pub fn with_trigger_delay(mut self, months: usize) -> Self {
        self.trigger_delay_months = months;
        self
    }

    #[must_use]
    pub fn with_periodicity(mut self, months: usize) -> Self {
        self.periodicity_months = Some(months);
        self
    }

    /// Switch the child amount to absolute (per-event) mode.
    #[must_use]
    pub fn with_absolute_amount(mut self) -> Self {
        self.amount_is_ratio = false;
        self
    }

    #[must_use]
    pub fn with_adoption_curve(mut self, curve: Distribution) -> Self {
        self.adoption_curve = Some(curve);
        self
    }

    /// Configure unit-economics mode: `unit_value * market_units` replaces
    /// `amount` in root projections.
    #[must_use]
    pub fn with_unit_economics(mut self, unit_value: Distribution, market_units: Distribution) -> Self {
        self.unit_value = Some(unit_value);
        self.market_units = Some(market_units);
        self
    }

    #[must_use]
    pub fn is_child(&self) -> bool {
        self.parent_stream_id.is_some()
    }

    /// Both unit-economics knobs configured.
    #[must_use]
    pub fn uses_unit_economics(&self) -> bool {
        self.unit_value.is_some() && self.market_units.is_some()
    }
}
