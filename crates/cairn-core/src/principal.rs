//! The authenticated user behind a session.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// User record established by a successful login.
///
/// Never mutated in place once cached; a refresh from the user store
/// produces a new value via [`Principal::refreshed_with`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Stores may hand back `1`/`0` or strings here; anything truthy counts.
    #[serde(default, deserialize_with = "truthy")]
    pub active: bool,
    /// Profile fields owned by the user store.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Principal {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Self::default()
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Same `(apiKey, apiSecret)` pair.
    pub fn matches_credentials(&self, other: &Principal) -> bool {
        self.api_key == other.api_key && self.api_secret == other.api_secret
    }

    /// Merge a fresh store record over this cached one. Fresh fields win;
    /// profile fields only the cached copy knows about are kept.
    pub fn refreshed_with(&self, fresh: &Principal) -> Principal {
        let mut extra = self.extra.clone();
        extra.extend(fresh.extra.iter().map(|(k, v)| (k.clone(), v.clone())));

        Principal {
            api_key: fresh.api_key.clone(),
            api_secret: fresh.api_secret.clone(),
            email: fresh.email.clone().or_else(|| self.email.clone()),
            active: fresh.active,
            extra,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}
