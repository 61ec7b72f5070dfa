use std::ptr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::core::{ChartConfiguration, ConfigValue};

/// Minimal action needed to bring a live chart in sync with a new configuration.
///
/// Ordered by cost.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationVerdict {
    /// Nothing to do.
    #[default]
    Keep,
    /// Only `width`/`height` changed; resize the live chart.
    Update,
    /// Series, styling, scales or plugins changed; destroy and rebuild.
    Create,
}

impl ReconciliationVerdict {
    #[must_use]
    pub const fn max(self, other: Self) -> Self {
        if self as u8 >= other as u8 {
            self
        } else {
            other
        }
    }

    #[must_use]
    pub const fn requires_rebuild(self) -> bool {
        matches!(self, Self::Create)
    }
}

/// Classifies the change from `previous` to `next`.
///
/// Dimension changes yield `Update` unless a structural field changed too.
/// Structural fields are compared by their serialized form, so callbacks
/// compare by token and non-finite numbers compare like JSON `null`.
///
/// The field-count check only compares counts; a renamed field is caught by
/// the per-field walk over `previous`'s keys, not by a key-set comparison.
#[must_use]
pub fn classify(previous: &ChartConfiguration, next: &ChartConfiguration) -> ReconciliationVerdict {
    if ptr::eq(previous, next) {
        return ReconciliationVerdict::Keep;
    }

    let mut verdict = ReconciliationVerdict::Keep;
    if previous.width != next.width || previous.height != next.height {
        verdict = verdict.max(ReconciliationVerdict::Update);
    }

    if previous.structural_len() != next.structural_len() {
        debug!(
            previous_fields = previous.structural_len(),
            next_fields = next.structural_len(),
            "structural field count changed"
        );
        return ReconciliationVerdict::Create;
    }

    for (key, value) in previous.fields() {
        if !structural_field_matches(value, next.field(key)) {
            debug!(field = %key, "structural field changed");
            return ReconciliationVerdict::Create;
        }
    }

    trace!(?verdict, "configuration reconciled");
    verdict
}

fn structural_field_matches(previous: &ConfigValue, next: Option<&ConfigValue>) -> bool {
    let Some(next) = next else {
        return false;
    };
    match (serialize_field(previous), serialize_field(next)) {
        (Some(lhs), Some(rhs)) => lhs == rhs,
        _ => false,
    }
}

fn serialize_field(value: &ConfigValue) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(error = %err, "unserializable structural field treated as changed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ReconciliationVerdict, classify};
    use crate::core::{ChartConfiguration, RenderCallback};

    fn config(value: serde_json::Value) -> ChartConfiguration {
        ChartConfiguration::from_json_value(value).expect("valid configuration")
    }

    #[test]
    fn verdicts_are_ordered_by_cost() {
        assert!(ReconciliationVerdict::Keep < ReconciliationVerdict::Update);
        assert!(ReconciliationVerdict::Update < ReconciliationVerdict::Create);
        assert_eq!(
            ReconciliationVerdict::Update.max(ReconciliationVerdict::Keep),
            ReconciliationVerdict::Update
        );
    }

    #[test]
    fn missing_dimensions_on_both_sides_are_equal() {
        let previous = config(json!({ "series": [] }));
        let next = config(json!({ "series": [] }));
        assert_eq!(classify(&previous, &next), ReconciliationVerdict::Keep);
    }

    #[test]
    fn dimension_appearing_marks_update() {
        let previous = config(json!({ "series": [] }));
        let next = config(json!({ "height": 240, "series": [] }));
        assert_eq!(classify(&previous, &next), ReconciliationVerdict::Update);
    }

    #[test]
    fn structural_change_overrides_dimension_change() {
        let previous = config(json!({ "width": 600, "series": [{ "stroke": "blue" }] }));
        let next = config(json!({ "width": 700, "series": [{ "stroke": "red" }] }));
        assert_eq!(classify(&previous, &next), ReconciliationVerdict::Create);
    }

    #[test]
    fn renamed_field_with_same_count_is_create() {
        let previous = config(json!({ "axes": [] }));
        let next = config(json!({ "scales": [] }));
        assert_eq!(classify(&previous, &next), ReconciliationVerdict::Create);
    }

    #[test]
    fn non_finite_numbers_compare_like_null() {
        let previous = ChartConfiguration::new().with_field("gap", f64::NAN).expect("field");
        let next = ChartConfiguration::new().with_field("gap", f64::INFINITY).expect("field");
        assert_eq!(classify(&previous, &next), ReconciliationVerdict::Keep);
    }

    #[test]
    fn callbacks_compare_by_token() {
        let source = "(u, v) => v.toFixed(1)";
        let previous = ChartConfiguration::new()
            .with_field("format", RenderCallback::from_source(source))
            .expect("field");
        let same = ChartConfiguration::new()
            .with_field("format", RenderCallback::from_source(source))
            .expect("field");
        let fresh = ChartConfiguration::new()
            .with_field("format", RenderCallback::allocate())
            .expect("field");

        assert_eq!(classify(&previous, &same), ReconciliationVerdict::Keep);
        assert_eq!(classify(&previous, &fresh), ReconciliationVerdict::Create);
    }

    #[test]
    fn negative_zero_matches_positive_zero() {
        let previous = ChartConfiguration::new().with_field("gap", -0.0).expect("field");
        let next = ChartConfiguration::new().with_field("gap", 0.0).expect("field");
        assert_eq!(classify(&previous, &next), ReconciliationVerdict::Keep);
    }
}
