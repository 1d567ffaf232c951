//! Filesystem-backed object store with HMAC-signed expiring URLs.
//!
//! Objects live under a local root directory; access URLs have the form
//! `{base}/media/{key}?expires={unix_secs}&sig={hex_hmac}` where the
//! signature covers `key\n{expires}`. The server's `/media/{key}` route
//! calls [`FsObjectStore::verify`] before serving bytes, so a URL is only
//! as durable as its expiry.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::SpeechError;
use crate::traits::{Audience, ObjectStore};

type HmacSha256 = Hmac<Sha256>;

/// Default signed-URL lifetime where the caller has no stronger opinion.
pub const SIGNED_URL_DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Local-filesystem object store.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    external_base: String,
    internal_base: String,
    secret: Vec<u8>,
}

impl FsObjectStore {
    /// Creates a store rooted at `root`. Base URLs must not end with `/`.
    pub fn new(
        root: impl Into<PathBuf>,
        external_base: impl Into<String>,
        internal_base: impl Into<String>,
        secret: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            root: root.into(),
            external_base: external_base.into(),
            internal_base: internal_base.into(),
            secret: secret.into(),
        }
    }

    /// Checks a key/expiry/signature triple from an incoming `/media` request.
    ///
    /// Returns `true` only if the signature matches and the URL has not
    /// expired. Signature comparison is constant-time via the MAC's own
    /// verifier.
    pub fn verify(&self, key: &str, expires: i64, sig_hex: &str) -> bool {
        if chrono::Utc::now().timestamp() > expires {
            return false;
        }
        let Ok(sig) = hex::decode(sig_hex) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.secret) else {
            return false;
        };
        mac.update(signing_input(key, expires).as_bytes());
        mac.verify_slice(&sig).is_ok()
    }

    /// Absolute filesystem path for a validated key.
    fn object_path(&self, key: &str) -> Result<PathBuf, SpeechError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), SpeechError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        tracing::debug!(key, content_type, bytes = data.len(), "stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, SpeechError> {
        let path = self.object_path(key)?;
        Ok(tokio::fs::read(&path).await?)
    }

    fn signed_url(
        &self,
        key: &str,
        ttl: Duration,
        audience: Audience,
    ) -> Result<String, SpeechError> {
        validate_key(key)?;
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| SpeechError::Signing)?;
        mac.update(signing_input(key, expires).as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        let base = match audience {
            Audience::External => &self.external_base,
            Audience::Internal => &self.internal_base,
        };
        Ok(format!("{base}/media/{key}?expires={expires}&sig={sig}"))
    }
}

fn signing_input(key: &str, expires: i64) -> String {
    format!("{key}\n{expires}")
}

/// Rejects keys that could escape the storage root or fail to survive a URL
/// round trip.
fn validate_key(key: &str) -> Result<(), SpeechError> {
    if key.is_empty() || key.len() > 512 {
        return Err(SpeechError::InvalidKey(key.to_string()));
    }
    let path = Path::new(key);
    let all_normal = path.components().all(|c| matches!(c, Component::Normal(_)));
    if !all_normal || key.contains("//") || key.contains('?') || key.contains('#') {
        return Err(SpeechError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> FsObjectStore {
        FsObjectStore::new(
            root,
            "https://app.example.com",
            "http://lingua-server.internal:8080",
            b"test-secret".to_vec(),
        )
    }

    fn parse_signed(url: &str) -> (String, i64, String) {
        let (path, query) = url.split_once('?').expect("query string");
        let key = path
            .split_once("/media/")
            .expect("media path")
            .1
            .to_string();
        let mut expires = 0i64;
        let mut sig = String::new();
        for pair in query.split('&') {
            let (k, v) = pair.split_once('=').expect("kv pair");
            match k {
                "expires" => expires = v.parse().expect("expires int"),
                "sig" => sig = v.to_string(),
                _ => {}
            }
        }
        (key, expires, sig)
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        store
            .put("user/t-1/m-1.webm", b"opus bytes", "audio/webm")
            .await
            .expect("put failed");
        let data = store.get("user/t-1/m-1.webm").await.expect("get failed");
        assert_eq!(data, b"opus bytes");
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        for key in ["../etc/passwd", "/abs/path", "a//b", "", "a?b"] {
            match store.put(key, b"x", "audio/webm").await {
                Err(SpeechError::InvalidKey(_)) => {}
                other => panic!("key {key:?} should be rejected, got {other:?}"),
            }
        }
    }

    #[test]
    fn signed_url_verifies_until_expiry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        let url = store
            .signed_url("user/t-1/m-1.webm", Duration::from_secs(300), Audience::External)
            .expect("sign failed");
        assert!(url.starts_with("https://app.example.com/media/user/t-1/m-1.webm?"));

        let (key, expires, sig) = parse_signed(&url);
        assert!(store.verify(&key, expires, &sig));
    }

    #[test]
    fn audiences_get_distinct_bases_same_signature_scheme() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        let internal = store
            .signed_url("k.webm", Duration::from_secs(60), Audience::Internal)
            .expect("sign failed");
        assert!(internal.starts_with("http://lingua-server.internal:8080/media/"));

        let (key, expires, sig) = parse_signed(&internal);
        assert!(store.verify(&key, expires, &sig));
    }

    #[test]
    fn tampered_or_expired_urls_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(dir.path());

        let url = store
            .signed_url("k.webm", Duration::from_secs(300), Audience::External)
            .expect("sign failed");
        let (key, expires, sig) = parse_signed(&url);

        // Wrong key.
        assert!(!store.verify("other.webm", expires, &sig));
        // Stretched expiry invalidates the signature.
        assert!(!store.verify(&key, expires + 100, &sig));
        // Garbage signature.
        assert!(!store.verify(&key, expires, "deadbeef"));
        // Expired timestamp fails even with a valid signature over it.
        let past = chrono::Utc::now().timestamp() - 10;
        let mut mac = HmacSha256::new_from_slice(b"test-secret").expect("mac");
        mac.update(signing_input(&key, past).as_bytes());
        let past_sig = hex::encode(mac.finalize().into_bytes());
        assert!(!store.verify(&key, past, &past_sig));
    }
}
