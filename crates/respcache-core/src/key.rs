//! Deterministic request fingerprinting
//!
//! Derives a 64-hex SHA-256 key from (messages, model, provider, generation
//! parameters) under a configurable normalization policy. Pure and
//! side-effect free; equal semantic requests always map to equal keys.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::types::{ChatMessage, GenerationParams, KeyNormalization, Provider, StopSequences};

/// Check that a key is 64 lowercase hex characters
pub fn is_valid_key(key: &str) -> bool {
    key.len() == 64 && key.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash named fields with length-prefixed encoding so that no choice of
/// field values can collide across field boundaries.
fn sha256_hex_fields(fields: &[(&str, &str)]) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in fields {
        hasher.update((name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Serializing a `Value` cannot fail; the fallback is unreachable
fn json_text(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Recursively sort object keys; arrays keep their order
fn sort_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_json(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_json).collect()),
        other => other.clone(),
    }
}

/// Stateless key generator over a fixed normalization policy
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    opts: KeyNormalization,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(KeyNormalization::default())
    }
}

impl KeyGenerator {
    pub fn new(opts: KeyNormalization) -> Self {
        Self { opts }
    }

    pub fn normalization(&self) -> &KeyNormalization {
        &self.opts
    }

    /// Derive the cache key for a request
    pub fn generate(
        &self,
        messages: &[ChatMessage],
        model: &str,
        provider: Provider,
        params: Option<&GenerationParams>,
    ) -> String {
        let prompt_hash = self.prompt_hash(messages);
        let params_hash = self.params_hash(params);
        let model = model.trim().to_lowercase();
        sha256_hex_fields(&[
            ("model", model.as_str()),
            ("params", params_hash.as_str()),
            ("prompt", prompt_hash.as_str()),
            ("provider", provider.as_str()),
        ])
    }

    /// Fingerprint of the normalized prompt text alone
    pub fn prompt_hash(&self, messages: &[ChatMessage]) -> String {
        let flattened = flatten_messages(messages);
        sha256_hex(self.normalize_prompt(&flattened).as_bytes())
    }

    /// Hash of the canonical cache-sensitive parameter subset
    fn params_hash(&self, params: Option<&GenerationParams>) -> String {
        let canonical = params
            .map(cache_params)
            .unwrap_or_else(|| Value::Object(Map::new()));
        let canonical = if self.opts.sort_json_keys {
            sort_json(&canonical)
        } else {
            canonical
        };
        sha256_hex(json_text(&canonical).as_bytes())
    }

    /// Apply the normalization policy to flattened prompt text
    pub fn normalize_prompt(&self, text: &str) -> String {
        let mut text = if self.opts.normalize_whitespace {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        } else {
            text.to_string()
        };
        if !self.opts.case_sensitive {
            text = text.to_lowercase();
        }
        if self.opts.ignore_punctuation {
            text.retain(|c| c.is_alphanumeric() || c.is_whitespace());
        }
        text
    }
}

/// Join messages into one text: `role:content` segments separated by newlines
fn flatten_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}:{}", m.role, m.content.flatten()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extract the cache-sensitive parameter subset in canonical form.
///
/// Float parameters round to two decimals; absent parameters are omitted,
/// not defaulted; everything in `extra` is ignored.
pub fn cache_params(params: &GenerationParams) -> Value {
    let mut map = Map::new();
    let put_f64 = |name: &str, value: Option<f64>, target: &mut Map<String, Value>| {
        if let Some(v) = value {
            if let Some(n) = serde_json::Number::from_f64(round2(v)) {
                target.insert(name.to_string(), Value::Number(n));
            }
        }
    };
    put_f64("temperature", params.temperature, &mut map);
    put_f64("top_p", params.top_p, &mut map);
    put_f64("frequency_penalty", params.frequency_penalty, &mut map);
    put_f64("presence_penalty", params.presence_penalty, &mut map);
    if let Some(top_k) = params.top_k {
        map.insert("top_k".to_string(), Value::from(top_k));
    }
    if let Some(max_tokens) = params.max_tokens {
        map.insert("max_tokens".to_string(), Value::from(max_tokens));
    }
    match &params.stop {
        Some(StopSequences::One(stop)) => {
            map.insert("stop".to_string(), Value::String(stop.clone()));
        }
        Some(StopSequences::Many(stops)) => {
            map.insert(
                "stop".to_string(),
                Value::Array(stops.iter().cloned().map(Value::String).collect()),
            );
        }
        None => {}
    }
    if let Some(format) = &params.response_format {
        map.insert("response_format".to_string(), format.clone());
    }
    Value::Object(map)
}
