//! Signed transfer capabilities
//!
//! A capability is an object-store URL carrying its own authorisation:
//!
//! ```text
//! {base}/users/{account}/games/{game}/{filename}?op=put&expires=1767225600&signature=9f2c...
//! ```
//!
//! The signature is HMAC-SHA256, lowercase hex, over
//! `"{op}\n{url path}\n{expires}"` with the secret shared with the store.
//! The store recomputes it with [`HmacCapabilityIssuer::verify`] before
//! honouring the request, and refuses it once `expires` has passed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use savesync_core::ports::{CapabilityOp, ICapabilityIssuer};
use sha2::Sha256;
use thiserror::Error;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a capability URL is refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("malformed capability: {0}")]
    Malformed(String),

    #[error("capability expired")]
    Expired,

    #[error("capability signature mismatch")]
    BadSignature,

    #[error("capability does not cover this object")]
    OutsideStore,
}

/// A capability that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCapability {
    pub op: CapabilityOp,
    /// Object key relative to the store base, percent-encoded as in the URL
    pub object_key: String,
    pub expires: DateTime<Utc>,
}

/// Issues and verifies HMAC-signed capability URLs
#[derive(Clone)]
pub struct HmacCapabilityIssuer {
    base_url: Url,
    secret: Vec<u8>,
}

impl std::fmt::Debug for HmacCapabilityIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacCapabilityIssuer")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HmacCapabilityIssuer {
    /// Creates an issuer for the store at `base_url`
    pub fn new(base_url: &str, secret: impl Into<Vec<u8>>) -> Result<Self, CapabilityError> {
        let base_url =
            Url::parse(base_url).map_err(|e| CapabilityError::Malformed(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(CapabilityError::Malformed(format!(
                "'{base_url}' cannot hold object paths"
            )));
        }
        Ok(Self {
            base_url,
            secret: secret.into(),
        })
    }

    /// Issues a capability for `op` on `object_key` that expires at `expires`
    pub fn issue_until(
        &self,
        op: CapabilityOp,
        object_key: &str,
        expires: DateTime<Utc>,
    ) -> Result<String, CapabilityError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| CapabilityError::Malformed("base URL cannot hold object paths".into()))?
            .pop_if_empty()
            .extend(object_key.split('/'));

        let expires = expires.timestamp();
        let signature = hex::encode(self.mac(op, url.path(), expires)?.finalize().into_bytes());
        url.query_pairs_mut()
            .append_pair("op", op.as_str())
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        Ok(url.into())
    }

    /// Checks a capability URL presented to the store at `now`
    pub fn verify(&self, capability: &str, now: DateTime<Utc>) -> Result<VerifiedCapability, CapabilityError> {
        let url = Url::parse(capability).map_err(|e| CapabilityError::Malformed(e.to_string()))?;

        let mut op = None;
        let mut expires = None;
        let mut signature = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "op" => op = Some(value.into_owned()),
                "expires" => expires = Some(value.into_owned()),
                "signature" => signature = Some(value.into_owned()),
                _ => {}
            }
        }

        let op = match op.as_deref() {
            Some("get") => CapabilityOp::Get,
            Some("put") => CapabilityOp::Put,
            other => return Err(CapabilityError::Malformed(format!("bad op {other:?}"))),
        };
        let expires: i64 = expires
            .as_deref()
            .and_then(|e| e.parse().ok())
            .ok_or_else(|| CapabilityError::Malformed("bad expires".into()))?;
        let signature = signature
            .as_deref()
            .and_then(|s| hex::decode(s).ok())
            .ok_or_else(|| CapabilityError::Malformed("bad signature encoding".into()))?;

        // Signature first, so a forged expiry is reported as forged
        self.mac(op, url.path(), expires)?
            .verify_slice(&signature)
            .map_err(|_| CapabilityError::BadSignature)?;

        if now.timestamp() > expires {
            return Err(CapabilityError::Expired);
        }

        let base_path = self.base_url.path().trim_end_matches('/');
        let object_key = url
            .path()
            .strip_prefix(base_path)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|key| !key.is_empty())
            .ok_or(CapabilityError::OutsideStore)?
            .to_string();

        let expires = DateTime::from_timestamp(expires, 0)
            .ok_or_else(|| CapabilityError::Malformed("expires out of range".into()))?;

        Ok(VerifiedCapability {
            op,
            object_key,
            expires,
        })
    }

    fn mac(&self, op: CapabilityOp, path: &str, expires: i64) -> Result<HmacSha256, CapabilityError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CapabilityError::Malformed(format!("signing key: {e}")))?;
        mac.update(op.as_str().as_bytes());
        mac.update(b"\n");
        mac.update(path.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }
}

impl ICapabilityIssuer for HmacCapabilityIssuer {
    fn issue(&self, op: CapabilityOp, object_key: &str, ttl: Duration) -> anyhow::Result<String> {
        let ttl = chrono::Duration::from_std(ttl)?;
        Ok(self.issue_until(op, object_key, Utc::now() + ttl)?)
    }
}
