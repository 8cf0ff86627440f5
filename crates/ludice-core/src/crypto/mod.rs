//! Request signing.
//!
//! Every backend call carries an HMAC-SHA256 over the canonical JSON form of its
//! body, computed with the key shared between client and server.

mod signature;

pub use signature::{
    canonical_json, canonical_payload, SignatureError, SignedRequest, Signer,
    MAX_SIGNATURE_AGE_SECS, SIGNATURE_FIELD, TIMESTAMP_FIELD,
};
