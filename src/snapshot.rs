use serde_json::Value;

/// The most recent status pushed by the backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusSnapshot {
    pub hashrate: f64,
    pub balance: f64,
    pub running: bool,
    /// Server-side UNIX timestamp, when the backend sends one.
    pub ts: Option<i64>,
}

impl StatusSnapshot {
    /// Parse one pushed message.
    ///
    /// Only a body that is not a JSON object is an error. Individual fields
    /// that are missing or unusable fall back to their defaults.
    pub fn parse(data: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(data)?;
        let Value::Object(fields) = value else {
            return Err(serde::de::Error::custom("status message is not a JSON object"));
        };

        Ok(Self {
            hashrate: non_negative(fields.get("hashrate")),
            balance: non_negative(fields.get("balance")),
            running: fields.get("running").and_then(Value::as_bool).unwrap_or(false),
            ts: fields.get("ts").and_then(Value::as_i64),
        })
    }
}

fn non_negative(value: Option<&Value>) -> f64 {
    value
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(f64::abs)
        .unwrap_or(0.0)
}
