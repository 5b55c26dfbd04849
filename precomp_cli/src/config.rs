use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use precomp_core::{AlgorithmSet, BatchOptions, CodecId, Negotiator, WriteOptions};

/// Optional `--config` file. Every field may be omitted; command-line flags
/// override whatever is set here.
///
/// ```json
/// {
///   "levels": { "br": 9, "gzip": 9 },
///   "batch": { "parallel": true, "max_bytes": 10485760 },
///   "write": { "policy": "replace", "permissions": 420 },
///   "preference": ["zstd", "br", "gzip"]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Codec name (id, wire token or suffix) to level. Also the default
    /// codec list when `--codecs` is not given.
    pub levels: BTreeMap<String, i32>,
    pub batch: BatchOptions,
    pub write: WriteOptions,
    /// Wildcard fallback order for negotiation.
    pub preference: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {:?}", path))?;
        let config: Config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {:?}", path))?;
        log::debug!("loaded config from {:?}", path);
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    fn configured_levels(&self) -> anyhow::Result<Vec<(CodecId, i32)>> {
        self.levels
            .iter()
            .map(|(name, level)| -> anyhow::Result<(CodecId, i32)> {
                let id: CodecId = name.parse().context("in config \"levels\"")?;
                Ok((id, *level))
            })
            .collect()
    }

    /// Resolve the algorithm set for `compress`.
    ///
    /// Codecs come from `codecs`, else the config's `levels` keys, else
    /// `fallback`. Each level comes from `overrides`, else the config, else
    /// the codec's default.
    pub fn algorithm_set(
        &self,
        codecs: &[CodecId],
        overrides: &[(CodecId, i32)],
        fallback: &[CodecId],
    ) -> anyhow::Result<AlgorithmSet> {
        let configured = self.configured_levels()?;
        let chosen: Vec<CodecId> = if !codecs.is_empty() {
            codecs.to_vec()
        } else if !configured.is_empty() {
            configured.iter().map(|(id, _)| *id).collect()
        } else {
            fallback.to_vec()
        };

        let level_for = |id: CodecId| {
            overrides
                .iter()
                .rev()
                .chain(configured.iter())
                .find(|(c, _)| *c == id)
                .map(|(_, level)| *level)
                .unwrap_or(id.descriptor().default_level)
        };
        let set = AlgorithmSet::new(chosen.iter().map(|&id| (id, level_for(id))))?;
        Ok(set)
    }

    /// Negotiator honouring `prefer` (flag) or the config's `preference`.
    pub fn negotiator(&self, prefer: &[CodecId]) -> anyhow::Result<Negotiator> {
        if !prefer.is_empty() {
            return Ok(Negotiator::with_wildcard_order(prefer.to_vec()));
        }
        if self.preference.is_empty() {
            return Ok(Negotiator::new());
        }
        let order = self
            .preference
            .iter()
            .map(|name| name.parse::<CodecId>())
            .collect::<Result<Vec<_>, _>>()
            .context("in config \"preference\"")?;
        Ok(Negotiator::with_wildcard_order(order))
    }
}
