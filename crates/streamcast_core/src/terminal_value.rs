//! Terminal values for streams that outlive the forecast horizon.
//!
//! Perpetual streams get a Gordon-growth perpetuity value anchored at the
//! final forecast month, discounted back to month 0 at the monthly rate.

use crate::model::Model;

/// Ids of streams treated as perpetual: no end month, or an end month at or
/// beyond the forecast horizon. Display order.
#[must_use]
pub fn identify_perpetual_streams(model: &Model) -> Vec<String> {
    let horizon = model.settings.forecast_months;
    model
        .streams()
        .filter(|s| s.end_month.is_none_or(|e| e >= horizon))
        .map(|s| s.id.clone())
        .collect()
}

/// Present value of a Gordon-growth perpetuity for one stream.
///
/// `final_cashflow` is the stream's cash flow in the last forecast month,
/// `growth_rate` and `discount_rate` are annual, `horizon_months` discounts
/// the perpetuity back to month 0 at the monthly rate. Returns 0 when the
/// discount rate does not exceed the growth rate (the perpetuity diverges).
#[must_use]
pub fn calculate_terminal_value(
    final_cashflow: f64,
    discount_rate: f64,
    growth_rate: f64,
    horizon_months: usize,
) -> f64 {
    if discount_rate <= growth_rate {
        return 0.0;
    }
    let terminal = final_cashflow * (1.0 + growth_rate) / (discount_rate - growth_rate);
    let monthly_rate = discount_rate / 12.0;
    terminal / (1.0 + monthly_rate).powi(horizon_months as i32)
}
