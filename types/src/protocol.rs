//! Values exchanged with the transport layer at the protocol-verb surface.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Claim name carrying the verified identity of the calling participant.
pub const PARTICIPANT_ID_CLAIM: &str = "participant_id";

/// Verified claims of the caller, as produced by the transport's identity check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims(BTreeMap<String, String>);

impl Claims {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_participant(participant_id: impl Into<String>) -> Self {
        Self::new().with(PARTICIPANT_ID_CLAIM, participant_id)
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn participant_id(&self) -> Option<&str> {
        self.get(PARTICIPANT_ID_CLAIM)
    }
}

/// Hash chaining an inbound payload to the previous protocol step.
///
/// `hex(sha256(previous_token || canonical_json(payload)))`, where the previous
/// token is empty for the first message of an exchange. Object keys serialize in
/// sorted order, which makes the JSON canonical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntegrityToken(String);

impl IntegrityToken {
    #[must_use]
    pub fn compute(previous: Option<&IntegrityToken>, payload: &Value) -> Self {
        let mut hasher = Sha256::new();
        if let Some(previous) = previous {
            hasher.update(previous.0.as_bytes());
        }
        hasher.update(payload.to_string().as_bytes());
        let digest = hasher.finalize();

        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntegrityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    /// Locally advanced (or already advanced); safe to acknowledge.
    Ok,
    /// Permanent rejection; the transport must not retry and should inform the peer.
    FatalError,
}

/// Answer of a protocol-verb handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolResponse {
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProtocolResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: ResponseStatus::Ok,
            detail: None,
        }
    }

    #[must_use]
    pub fn fatal(detail: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::FatalError,
            detail: Some(detail.into()),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}
