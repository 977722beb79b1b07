//! OAuth 1.0a request signing (HMAC-SHA1) for pre-authorized tokens.

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Consumer key pair plus an access token pair.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl Credentials {
    /// Request parameters extended with the `oauth_*` parameters and signature.
    pub fn sign(&self, method: &str, url: &str, params: &[(String, String)]) -> Result<Vec<(String, String)>> {
        let nonce = format!("{:016x}", rand::random::<u64>());
        let timestamp = chrono::Utc::now().timestamp();
        self.sign_with(method, url, params, &nonce, timestamp)
    }

    fn sign_with(
        &self,
        method: &str,
        url: &str,
        params: &[(String, String)],
        nonce: &str,
        timestamp: i64,
    ) -> Result<Vec<(String, String)>> {
        let mut signed = params.to_vec();
        signed.extend([
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ]);
        let signature = signature(method, url, &signed, &self.consumer_secret, &self.token_secret)?;
        signed.push(("oauth_signature".to_string(), signature));
        Ok(signed)
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Signature base string: method, URL and the sorted, encoded parameters.
pub fn base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
    encoded.sort();
    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}&{}&{}", method.to_uppercase(), encode(url), encode(&joined))
}

pub fn signature(
    method: &str,
    url: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid signing key: {e}"))?;
    mac.update(base_string(method, url, params).as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
