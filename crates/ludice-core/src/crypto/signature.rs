//! HMAC-SHA256 signatures over canonical JSON.

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Reserved body field carrying the hex signature
pub const SIGNATURE_FIELD: &str = "signature";

/// Reserved body field carrying the Unix time of signing
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Oldest request the backend accepts, in seconds
pub const MAX_SIGNATURE_AGE_SECS: f64 = 300.0;

/// Errors from signing or verifying requests
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("Invalid signing key")]
    InvalidKey,

    #[error("Signature expired: request is {age_secs:.1}s old")]
    Stale { age_secs: f64 },

    #[error("Signature does not match request")]
    Mismatch,
}

/// Serialize `value` with object keys sorted at every level and no whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

/// Canonical form of a request body, ignoring the `signature` field.
pub fn canonical_payload(payload: &Map<String, Value>) -> String {
    let mut out = String::new();
    write_object(payload, Some(SIGNATURE_FIELD), &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => write_object(map, None, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        // Display on scalars is already compact JSON
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_object(map: &Map<String, Value>, skip: Option<&str>, out: &mut String) {
    let mut keys: Vec<&String> = map
        .keys()
        .filter(|k| Some(k.as_str()) != skip)
        .collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_value(&map[key.as_str()], out);
    }
    out.push('}');
}

/// Keyed signer for request bodies
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
}

impl Signer {
    /// Create a signer from the shared secret
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SignatureError> {
        let mac = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self { mac })
    }

    fn mac_over(&self, payload: &Map<String, Value>) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(canonical_payload(payload).as_bytes());
        mac
    }

    /// Lowercase hex HMAC-SHA256 of the canonical payload
    pub fn sign(&self, payload: &Map<String, Value>) -> String {
        hex::encode(self.mac_over(payload).finalize().into_bytes())
    }

    /// Constant-time check of `signature` against the payload
    pub fn verify(&self, payload: &Map<String, Value>, signature: &str) -> bool {
        match hex::decode(signature) {
            Ok(bytes) => self.mac_over(payload).verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    /// Verify an incoming body the way the game server does: reject anything
    /// signed more than `max_age_secs` before `now`, then check the MAC.
    pub fn verify_fresh(
        &self,
        payload: &Map<String, Value>,
        now: f64,
        max_age_secs: f64,
    ) -> Result<(), SignatureError> {
        let timestamp = payload
            .get(TIMESTAMP_FIELD)
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        let age_secs = now - timestamp;
        if age_secs > max_age_secs {
            return Err(SignatureError::Stale { age_secs });
        }

        let signature = payload
            .get(SIGNATURE_FIELD)
            .and_then(Value::as_str)
            .ok_or(SignatureError::Mismatch)?;

        if self.verify(payload, signature) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Signer(..)")
    }
}

/// A request body with `timestamp` and `signature` attached.
///
/// Sealed bodies are immutable: changing a field goes through
/// [`SignedRequest::with_field`], which signs again.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SignedRequest {
    body: Map<String, Value>,
}

impl SignedRequest {
    /// Stamp `fields` with `timestamp` and sign them
    pub fn seal(mut fields: Map<String, Value>, timestamp: f64, signer: &Signer) -> Self {
        fields.remove(SIGNATURE_FIELD);
        fields.insert(TIMESTAMP_FIELD.to_string(), Value::from(timestamp));
        let signature = signer.sign(&fields);
        fields.insert(SIGNATURE_FIELD.to_string(), Value::String(signature));
        Self { body: fields }
    }

    /// Replace one field and re-sign, keeping the original timestamp unless
    /// the timestamp itself is the field being replaced.
    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        signer: &Signer,
    ) -> Self {
        let key = key.into();
        let value = value.into();
        let timestamp = if key == TIMESTAMP_FIELD {
            value.as_f64().unwrap_or_else(|| self.timestamp())
        } else {
            self.timestamp()
        };
        self.body.insert(key, value);
        Self::seal(self.body, timestamp, signer)
    }

    pub fn signature(&self) -> &str {
        self.body
            .get(SIGNATURE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn timestamp(&self) -> f64 {
        self.body
            .get(TIMESTAMP_FIELD)
            .and_then(Value::as_f64)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn signer() -> Signer {
        Signer::new("our_secret_key").unwrap()
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({
            "user_id": "7",
            "game_id": "g-1",
            "result": 4,
            "timestamp": 1700000123.25,
            "nested": {"b": 1, "a": [2, {"d": 1, "c": 2}]}
        });

        assert_eq!(
            canonical_json(&value),
            r#"{"game_id":"g-1","nested":{"a":[2,{"c":2,"d":1}],"b":1},"result":4,"timestamp":1700000123.25,"user_id":"7"}"#
        );
    }

    #[test]
    fn test_canonical_payload_skips_signature() {
        let payload = fields(json!({"bet": 50, "signature": "abc", "username": "alice"}));
        assert_eq!(canonical_payload(&payload), r#"{"bet":50,"username":"alice"}"#);
    }

    #[test]
    fn test_known_vector_matches_server() {
        // Same bytes the game server hashes with json.dumps(sort_keys, compact separators)
        let payload = fields(json!({
            "username": "alice",
            "bet": 50,
            "timestamp": 1700000000.5
        }));

        assert_eq!(
            signer().sign(&payload),
            "6cb526fc0d3d17a71997a0c1df9b53c76105b530927640cd8572dc7146c489bb"
        );
    }

    #[test]
    fn test_sign_is_order_independent() {
        let mut forward = Map::new();
        forward.insert("username".into(), json!("alice"));
        forward.insert("bet".into(), json!(50));
        forward.insert("timestamp".into(), json!(1700000000.5));

        let mut reverse = Map::new();
        reverse.insert("timestamp".into(), json!(1700000000.5));
        reverse.insert("bet".into(), json!(50));
        reverse.insert("username".into(), json!("alice"));

        assert_eq!(signer().sign(&forward), signer().sign(&reverse));
    }

    #[test]
    fn test_sign_output_is_lowercase_hex() {
        let sig = signer().sign(&fields(json!({"username": "bob", "bet": 10})));
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_minimal_edits_change_signature() {
        let base = fields(json!({"username": "alice", "bet": 50}));
        let bet_changed = fields(json!({"username": "alice", "bet": 51}));
        let name_changed = fields(json!({"username": "alicf", "bet": 50}));
        let type_changed = fields(json!({"username": "alice", "bet": "50"}));

        let s = signer();
        assert_ne!(s.sign(&base), s.sign(&bet_changed));
        assert_ne!(s.sign(&base), s.sign(&name_changed));
        assert_ne!(s.sign(&base), s.sign(&type_changed));
    }

    #[test]
    fn test_different_keys_different_signatures() {
        let payload = fields(json!({"username": "alice", "bet": 50}));
        let other = Signer::new("another_key").unwrap();
        assert_ne!(signer().sign(&payload), other.sign(&payload));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let s = signer();
        let sealed = SignedRequest::seal(fields(json!({"username": "alice", "bet": 50})), 1.0, &s);
        assert!(s.verify(sealed.body(), sealed.signature()));

        let mut tampered = sealed.body().clone();
        tampered.insert("bet".into(), json!(5000));
        assert!(!s.verify(&tampered, sealed.signature()));
        assert!(!s.verify(sealed.body(), "not-hex"));
    }

    #[test]
    fn test_seal_replaces_reserved_fields() {
        let s = signer();
        let sealed = SignedRequest::seal(
            fields(json!({"username": "alice", "signature": "forged", "timestamp": 3})),
            1700000000.5,
            &s,
        );

        assert_eq!(sealed.timestamp(), 1700000000.5);
        assert_ne!(sealed.signature(), "forged");
        assert!(s.verify(sealed.body(), sealed.signature()));
    }

    #[test]
    fn test_with_field_resigns() {
        let s = signer();
        let sealed = SignedRequest::seal(fields(json!({"username": "alice", "bet": 50})), 10.0, &s);
        let old_signature = sealed.signature().to_string();

        let updated = sealed.with_field("bet", 60, &s);
        assert_ne!(updated.signature(), old_signature);
        assert_eq!(updated.timestamp(), 10.0);
        assert!(s.verify(updated.body(), updated.signature()));

        let restamped = updated.with_field(TIMESTAMP_FIELD, 20.0, &s);
        assert_eq!(restamped.timestamp(), 20.0);
        assert!(s.verify(restamped.body(), restamped.signature()));
    }

    #[test]
    fn test_verify_fresh() {
        let s = signer();
        let sealed = SignedRequest::seal(fields(json!({"username": "alice"})), 1000.0, &s);

        assert!(s.verify_fresh(sealed.body(), 1200.0, MAX_SIGNATURE_AGE_SECS).is_ok());
        assert!(matches!(
            s.verify_fresh(sealed.body(), 1400.0, MAX_SIGNATURE_AGE_SECS),
            Err(SignatureError::Stale { .. })
        ));

        let mut unsigned = sealed.body().clone();
        unsigned.remove(SIGNATURE_FIELD);
        assert!(matches!(
            s.verify_fresh(&unsigned, 1000.0, MAX_SIGNATURE_AGE_SECS),
            Err(SignatureError::Mismatch)
        ));
    }
}
