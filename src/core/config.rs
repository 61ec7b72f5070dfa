use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{ChartError, ChartResult};

pub const WIDTH_KEY: &str = "width";
pub const HEIGHT_KEY: &str = "height";
pub const SERIES_KEY: &str = "series";

static NEXT_ALLOCATED_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a render callback, assigned when the configuration is built.
///
/// Two callbacks compare equal iff their tokens are equal. `Allocated` tokens
/// are unique per process; `Source` tokens are derived from the callback's
/// source text so that two callbacks built from identical source compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackToken {
    Allocated(u64),
    Source(u64),
}

impl CallbackToken {
    #[must_use]
    pub fn allocate() -> Self {
        Self::Allocated(NEXT_ALLOCATED_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn from_source(source: &str) -> Self {
        let digest = Sha256::digest(source.as_bytes());
        let mut prefix = [0_u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self::Source(u64::from_be_bytes(prefix))
    }
}

/// Executable configuration value (formatters, hooks, path builders).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderCallback {
    #[serde(rename = "$callback")]
    pub token: CallbackToken,
}

impl RenderCallback {
    #[must_use]
    pub fn new(token: CallbackToken) -> Self {
        Self { token }
    }

    #[must_use]
    pub fn allocate() -> Self {
        Self::new(CallbackToken::allocate())
    }

    #[must_use]
    pub fn from_source(source: &str) -> Self {
        Self::new(CallbackToken::from_source(source))
    }
}

/// One structural configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Number(#[serde(serialize_with = "serialize_number")] f64),
    String(String),
    Array(Vec<ConfigValue>),
    Callback(RenderCallback),
    Object(IndexMap<String, ConfigValue>),
}

/// Maps `-0.0` to `0.0` so both zeros share one serialized form.
#[must_use]
pub fn canonical_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(canonical_zero(*value))
}

impl ConfigValue {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::Callback(_))
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::Number(number.as_f64().unwrap_or(f64::NAN)),
            Value::String(text) => Self::String(text),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<RenderCallback> for ConfigValue {
    fn from(value: RenderCallback) -> Self {
        Self::Callback(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        Self::Array(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartSize {
    pub width: f64,
    pub height: f64,
}

impl ChartSize {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Rendering options handed to a chart engine.
///
/// `width`/`height` are kept apart from the remaining structural fields because
/// a dimension-only change can be applied to a live chart without rebuilding it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(flatten)]
    fields: IndexMap<String, ConfigValue>,
}

impl ChartConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Adds or replaces a field; see [`ChartConfiguration::insert_field`].
    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> ChartResult<Self> {
        self.insert_field(key, value)?;
        Ok(self)
    }

    /// Adds or replaces a field.
    ///
    /// `width`/`height` keys are routed to the dimension slots and follow the
    /// JSON rules: a number sets the slot, `null` clears it, anything else is
    /// rejected. An absent dimension and a `null` one are the same state.
    pub fn insert_field(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> ChartResult<()> {
        let key = key.into();
        let value = value.into();
        let slot = match key.as_str() {
            WIDTH_KEY => &mut self.width,
            HEIGHT_KEY => &mut self.height,
            _ => {
                self.fields.insert(key, value);
                return Ok(());
            }
        };
        *slot = match value {
            ConfigValue::Number(dimension) => Some(dimension),
            ConfigValue::Null => None,
            _ => {
                return Err(ChartError::InvalidConfiguration(format!(
                    "`{key}` must be a number or null"
                )));
            }
        };
        Ok(())
    }

    pub fn remove_field(&mut self, key: &str) -> Option<ConfigValue> {
        self.fields.shift_remove(key)
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&ConfigValue> {
        self.fields.get(key)
    }

    /// Structural fields, i.e. everything except `width`/`height`.
    #[must_use]
    pub fn fields(&self) -> &IndexMap<String, ConfigValue> {
        &self.fields
    }

    #[must_use]
    pub fn structural_len(&self) -> usize {
        self.fields.len()
    }

    /// Both dimensions, when present.
    #[must_use]
    pub fn size(&self) -> Option<ChartSize> {
        Some(ChartSize::new(self.width?, self.height?))
    }

    /// Checks the options a chart cannot be built without.
    ///
    /// A configuration without series is rejected. A missing or zero dimension
    /// is only logged, since engines fall back to their own default size.
    pub fn validate(&self) -> ChartResult<()> {
        let missing = |dimension: Option<f64>| dimension.is_none_or(|value| value == 0.0);
        if missing(self.width) || missing(self.height) {
            warn!(
                width = ?self.width,
                height = ?self.height,
                "chart configuration is missing width or height"
            );
        }

        let series_count = match self.fields.get(SERIES_KEY) {
            Some(ConfigValue::Array(series)) => series.len(),
            _ => 0,
        };
        if series_count == 0 {
            return Err(ChartError::InvalidConfiguration(
                "chart configuration defines no series".to_owned(),
            ));
        }
        debug!(series_count, "chart configuration validated");
        Ok(())
    }

    pub fn from_json_value(value: Value) -> ChartResult<Self> {
        if !value.is_object() {
            return Err(ChartError::InvalidConfiguration(
                "chart configuration must be a JSON object".to_owned(),
            ));
        }
        serde_json::from_value(value).map_err(|e| {
            ChartError::InvalidConfiguration(format!("failed to parse chart configuration: {e}"))
        })
    }

    pub fn from_json_str(input: &str) -> ChartResult<Self> {
        let value: Value = serde_json::from_str(input).map_err(|e| {
            ChartError::InvalidConfiguration(format!("failed to parse chart configuration: {e}"))
        })?;
        Self::from_json_value(value)
    }

    pub fn to_json_pretty(&self) -> ChartResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            ChartError::InvalidConfiguration(format!(
                "failed to serialize chart configuration: {e}"
            ))
        })
    }
}
