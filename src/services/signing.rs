//! Time-limited signed URLs for direct object reads and writes.
//!
//! A signature covers the HTTP method, bucket, key, expiry and the optional
//! attachment disposition, so a URL minted for `PUT docs/a.txt` cannot be
//! replayed for another key, another method, or after it expires.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const EXPIRES_PARAM: &str = "X-Expires";
pub const SIGNATURE_PARAM: &str = "X-Signature";
pub const DISPOSITION_PARAM: &str = "response-content-disposition";

/// Default validity of a minted URL, in seconds.
pub const DEFAULT_URL_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedMethod {
    Get,
    Put,
}

impl SignedMethod {
    fn as_str(self) -> &'static str {
        match self {
            SignedMethod::Get => "GET",
            SignedMethod::Put => "PUT",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature parameters missing")]
    Missing,
    #[error("signature is malformed")]
    Malformed,
    #[error("signature does not match")]
    Mismatch,
    #[error("signed url expired")]
    Expired,
    #[error("signing key rejected")]
    InvalidKey,
}

/// Mints and verifies signed object URLs of the form
/// `{public_url}/s3/{bucket}/{key}?X-Expires=..&X-Signature=..`.
#[derive(Clone)]
pub struct UrlSigner {
    /// MAC keyed with the secret; cloned for every signature.
    keyed: HmacSha256,
    public_url: String,
    ttl_secs: u64,
}

impl UrlSigner {
    pub fn new(
        secret: impl AsRef<[u8]>,
        public_url: &str,
        ttl_secs: u64,
    ) -> Result<Self, SignatureError> {
        let keyed = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self {
            keyed,
            public_url: public_url.trim_end_matches('/').to_string(),
            ttl_secs,
        })
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Signed URL valid for the configured TTL from now.
    pub fn sign(&self, method: SignedMethod, bucket: &str, key: &str, attachment: bool) -> String {
        let expires = Utc::now().timestamp() + self.ttl_secs as i64;
        self.sign_until(method, bucket, key, attachment, expires)
    }

    pub fn sign_until(
        &self,
        method: SignedMethod,
        bucket: &str,
        key: &str,
        attachment: bool,
        expires: i64,
    ) -> String {
        let signature = self.signature(method, bucket, key, attachment, expires);
        let mut url = format!(
            "{}/s3/{}/{}?{}={}&{}={}",
            self.public_url,
            urlencoding::encode(bucket),
            encode_key(key),
            EXPIRES_PARAM,
            expires,
            SIGNATURE_PARAM,
            signature
        );
        if attachment {
            url.push_str(&format!("&{}=attachment", DISPOSITION_PARAM));
        }
        url
    }

    /// Check a presented signature against the request it arrived on.
    pub fn verify(
        &self,
        method: SignedMethod,
        bucket: &str,
        key: &str,
        attachment: bool,
        expires: Option<&str>,
        signature: Option<&str>,
    ) -> Result<(), SignatureError> {
        let (expires, signature) = match (expires, signature) {
            (Some(e), Some(s)) => (e, s),
            _ => return Err(SignatureError::Missing),
        };
        let expires: i64 = expires.parse().map_err(|_| SignatureError::Malformed)?;
        let presented = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SignatureError::Malformed)?;

        self.mac(method, bucket, key, attachment, expires)
            .verify_slice(&presented)
            .map_err(|_| SignatureError::Mismatch)?;

        if Utc::now().timestamp() > expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }

    fn signature(
        &self,
        method: SignedMethod,
        bucket: &str,
        key: &str,
        attachment: bool,
        expires: i64,
    ) -> String {
        let tag = self
            .mac(method, bucket, key, attachment, expires)
            .finalize()
            .into_bytes();
        URL_SAFE_NO_PAD.encode(tag)
    }

    fn mac(
        &self,
        method: SignedMethod,
        bucket: &str,
        key: &str,
        attachment: bool,
        expires: i64,
    ) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        let disposition = if attachment { "attachment" } else { "" };
        mac.update(
            format!(
                "{}\n{}\n{}\n{}\n{}",
                method.as_str(),
                bucket,
                key,
                expires,
                disposition
            )
            .as_bytes(),
        );
        mac
    }
}

/// Percent-encode each key segment, keeping `/` as the path separator.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
