use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{ChartError, ChartResult};

use super::{DataMatchOptions, PoolConfig};

pub const SYNC_CONFIG_JSON_SCHEMA_V1: u32 = 1;

/// Host-level tuning for options memoization, data matching and pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default)]
    pub options_cache: CacheConfig,
    #[serde(default)]
    pub data_match_cache: CacheConfig,
    #[serde(default)]
    pub data_match: DataMatchOptions,
    #[serde(default)]
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfigJsonContractV1 {
    pub schema_version: u32,
    pub config: SyncConfig,
}

impl SyncConfig {
    #[must_use]
    pub fn with_options_cache(mut self, options_cache: CacheConfig) -> Self {
        self.options_cache = options_cache;
        self
    }

    #[must_use]
    pub fn with_data_match_cache(mut self, data_match_cache: CacheConfig) -> Self {
        self.data_match_cache = data_match_cache;
        self
    }

    #[must_use]
    pub fn with_data_match(mut self, data_match: DataMatchOptions) -> Self {
        self.data_match = data_match;
        self
    }

    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn to_json_pretty(self) -> ChartResult<String> {
        serde_json::to_string_pretty(&self).map_err(|e| {
            ChartError::InvalidConfiguration(format!("failed to serialize sync config json: {e}"))
        })
    }

    pub fn to_json_contract_v1_pretty(self) -> ChartResult<String> {
        let payload = SyncConfigJsonContractV1 {
            schema_version: SYNC_CONFIG_JSON_SCHEMA_V1,
            config: self,
        };
        serde_json::to_string_pretty(&payload).map_err(|e| {
            ChartError::InvalidConfiguration(format!(
                "failed to serialize sync config contract v1: {e}"
            ))
        })
    }

    /// Accepts either a bare config object or a versioned v1 contract.
    pub fn from_json_compat_str(input: &str) -> ChartResult<Self> {
        if let Ok(config) = serde_json::from_str::<SyncConfig>(input) {
            return Ok(config);
        }
        let payload: SyncConfigJsonContractV1 = serde_json::from_str(input).map_err(|e| {
            ChartError::InvalidConfiguration(format!("failed to parse sync config json payload: {e}"))
        })?;
        if payload.schema_version != SYNC_CONFIG_JSON_SCHEMA_V1 {
            return Err(ChartError::InvalidConfiguration(format!(
                "unsupported sync config schema version: {}",
                payload.schema_version
            )));
        }
        Ok(payload.config)
    }
}
