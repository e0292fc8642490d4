//! Evaluation context: the target object plus attribute sources.

use std::collections::HashMap;

use crate::eval::descriptors::EvalTarget;

/// Named attribute values available during in-memory evaluation: token
/// claims and process-global variables.
#[derive(Clone, Debug, Default)]
pub struct AttributeSource {
    claims: HashMap<String, serde_json::Value>,
    globals: HashMap<String, serde_json::Value>,
}

impl AttributeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a claim value.
    pub fn set_claim(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.claims.insert(key.into(), value);
    }

    /// Set a global value.
    pub fn set_global(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.globals.insert(key.into(), value);
    }

    /// Get a claim value.
    pub fn claim(&self, key: &str) -> Option<&serde_json::Value> {
        self.claims.get(key)
    }

    /// Get a global value.
    pub fn global(&self, key: &str) -> Option<&serde_json::Value> {
        self.globals.get(key)
    }
}

impl From<HashMap<String, serde_json::Value>> for AttributeSource {
    fn from(claims: HashMap<String, serde_json::Value>) -> Self {
        Self {
            claims,
            globals: HashMap::new(),
        }
    }
}

/// Everything one in-memory evaluation sees.
#[derive(Clone, Debug)]
pub struct EvalContext {
    pub target: EvalTarget,
    pub attributes: AttributeSource,
}

impl EvalContext {
    pub fn new(target: EvalTarget) -> Self {
        Self {
            target,
            attributes: AttributeSource::new(),
        }
    }

    pub fn with_attributes(target: EvalTarget, attributes: AttributeSource) -> Self {
        Self { target, attributes }
    }
}
