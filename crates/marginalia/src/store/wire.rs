//! Wire decoding for `getAllComments/` responses and encoding for saves.
//!
//! Each thread in a load response carries `body` and `indicator` as JSON
//! strings. Decoding is done per target: if any thread of a target fails to
//! decode, the whole target is dropped so that no half-decoded list reaches the
//! store.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{MarginaliaError, Result};
use crate::gateway::GatewayResponse;
use crate::model::{Comment, Thread, ThreadId};
use crate::position::Indicator;

/// A fully decoded load, ready to be applied to a store in one step.
#[derive(Debug, Clone, Default)]
pub struct LoadedComments {
    pub(crate) threads: BTreeMap<String, Vec<Thread>>,
    dropped: Vec<String>,
}

impl LoadedComments {
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.threads.keys().map(String::as_str)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.values().map(Vec::len).sum()
    }

    /// Targets skipped because their payload was malformed.
    pub fn dropped_targets(&self) -> &[String] {
        &self.dropped
    }

    /// Highest `anno/<n>` counter value present, if any.
    pub(crate) fn max_sequence(&self) -> Option<u64> {
        self.threads
            .values()
            .flatten()
            .filter_map(|t| t.id.sequence())
            .max()
    }
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    comments: BTreeMap<String, Vec<Value>>,
}

#[derive(Deserialize)]
struct WireThread {
    id: ThreadId,
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    resolved: bool,
    #[serde(default)]
    indicator: Value,
    body: Value,
}

#[derive(Serialize)]
struct SavePayload<'a> {
    comments: &'a [Thread],
}

pub fn decode_response(response: &GatewayResponse) -> Result<LoadedComments> {
    let wire: WireResponse = response.json()?;
    let mut loaded = LoadedComments::default();

    for (target, raw_threads) in wire.comments {
        match decode_target(&target, raw_threads) {
            Ok(threads) => {
                loaded.threads.insert(target, threads);
            }
            Err(e) => {
                warn!(target: "marginalia::store", "Dropping comments for {}: {}", target, e);
                loaded.dropped.push(target);
            }
        }
    }

    Ok(loaded)
}

pub fn encode_target(threads: &[Thread]) -> Result<String> {
    serde_json::to_string(&SavePayload { comments: threads }).map_err(MarginaliaError::Serialization)
}

fn decode_target(target: &str, raw_threads: Vec<Value>) -> Result<Vec<Thread>> {
    let malformed = |reason: String| MarginaliaError::MalformedPayload {
        target: target.to_string(),
        reason,
    };

    raw_threads
        .into_iter()
        .map(|raw| {
            let wire: WireThread = serde_json::from_value(raw).map_err(|e| malformed(e.to_string()))?;

            let body: Vec<Comment> = decode_nested(wire.body)
                .map_err(|e| malformed(format!("body of {}: {}", wire.id, e)))?;

            let indicator: Option<Indicator> = match wire.indicator {
                Value::Null => None,
                Value::String(ref s) if s.is_empty() => None,
                other => Some(
                    decode_nested(other)
                        .map_err(|e| malformed(format!("indicator of {}: {}", wire.id, e)))?,
                ),
            };

            if let Some(total) = wire.total {
                if total != body.len() {
                    debug!(
                        target: "marginalia::store",
                        "Thread {} declared total {} but has {} comments",
                        wire.id,
                        total,
                        body.len()
                    );
                }
            }

            Ok(Thread::from_parts(
                wire.id,
                target.to_string(),
                wire.resolved,
                indicator,
                body,
            ))
        })
        .collect()
}

// Nested documents are normally JSON strings, but plain objects are accepted too.
fn decode_nested<T: DeserializeOwned>(value: Value) -> serde_json::Result<T> {
    match value {
        Value::String(s) => serde_json::from_str(&s),
        other => serde_json::from_value(other),
    }
}
