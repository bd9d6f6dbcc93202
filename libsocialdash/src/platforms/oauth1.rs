//! OAuth 1.0a request signing (HMAC-SHA1)
//!
//! Twitter's user-context endpoints accept requests signed with the
//! consumer key pair and the user's access token pair. The signature covers
//! the method, the URL without query, and every query and form parameter
//! together with the `oauth_*` protocol parameters. JSON bodies are not
//! part of the signature.

use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha1::Sha1;

use crate::credentials::TwitterCredentials;
use crate::error::{PlatformError, Result};
use crate::transport::{ApiRequest, Body};

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 percent-encoding as OAuth 1.0a requires it
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Build the signature base string from the request parts
///
/// `params` must already include the `oauth_*` parameters (without
/// `oauth_signature`).
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&param_string)
    )
}

/// Signs requests on behalf of one user
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: SecretString,
    token: String,
    token_secret: SecretString,
}

impl OAuth1Signer {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: &str,
        token: impl Into<String>,
        token_secret: &str,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: SecretString::from(consumer_secret.to_string()),
            token: token.into(),
            token_secret: SecretString::from(token_secret.to_string()),
        }
    }

    pub fn from_credentials(creds: &TwitterCredentials) -> Self {
        Self::new(
            creds.client_id.clone(),
            creds.client_secret.expose_secret(),
            creds.access_token.clone(),
            creds.access_token_secret.expose_secret(),
        )
    }

    /// Attach an `Authorization: OAuth ...` header with a fresh nonce and
    /// the current timestamp
    pub fn sign(&self, request: ApiRequest) -> Result<ApiRequest> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp();

        let header = self.authorization_header(&request, &nonce, timestamp)?;
        Ok(request.header("Authorization", header))
    }

    /// Authorization header value for `request` with a fixed nonce and
    /// timestamp
    pub fn authorization_header(
        &self,
        request: &ApiRequest,
        nonce: &str,
        timestamp: i64,
    ) -> Result<String> {
        let mut oauth_params = vec![
            ("oauth_consumer_key".to_string(), self.consumer_key.clone()),
            ("oauth_nonce".to_string(), nonce.to_string()),
            ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
            ("oauth_timestamp".to_string(), timestamp.to_string()),
            ("oauth_token".to_string(), self.token.clone()),
            ("oauth_version".to_string(), "1.0".to_string()),
        ];

        let mut params = oauth_params.clone();
        params.extend(request.query.iter().cloned());
        if let Body::Form(fields) = &request.body {
            params.extend(fields.iter().cloned());
        }

        let base = signature_base_string(request.method.as_str(), &request.url, &params);
        let signature = self.signature(&base)?;
        oauth_params.push(("oauth_signature".to_string(), signature));
        oauth_params.sort();

        let fields = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("OAuth {}", fields))
    }

    fn signature(&self, base: &str) -> Result<String> {
        let key = format!(
            "{}&{}",
            encode(self.consumer_secret.expose_secret()),
            encode(self.token_secret.expose_secret())
        );

        let mut mac = HmacSha1::new_from_slice(key.as_bytes())
            .map_err(|e| PlatformError::Authentication(format!("Invalid signing key: {}", e)))?;
        mac.update(base.as_bytes());

        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for OAuth1Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Signer")
            .field("consumer_key", &self.consumer_key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
