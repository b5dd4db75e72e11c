//! OAuth 1.0a request signing (HMAC-SHA1)

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;

use crate::auth::core::random::random_alphanumeric;
use crate::auth::errors::AuthError;

/// Everything except the RFC 3986 unreserved characters
const ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, ENCODE_SET).to_string()
}

/// Token credentials (request token or access token)
#[derive(Debug, Clone, Copy)]
pub struct TokenPair<'a> {
    pub token: &'a str,
    pub secret: &'a str,
}

/// Signs requests on behalf of one consumer (client application)
#[derive(Clone)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
}

impl OAuth1Signer {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// `Authorization` header value with a fresh nonce and timestamp
    ///
    /// `oauth_params` are protocol parameters that belong in the header
    /// (`oauth_callback`, `oauth_verifier`); `request_params` are the query
    /// or form parameters of the request, which are signed but not repeated.
    pub fn authorization(
        &self,
        method: &str,
        url: &str,
        token: Option<TokenPair<'_>>,
        oauth_params: &[(&str, &str)],
        request_params: &[(&str, &str)],
    ) -> Result<String, AuthError> {
        let nonce = random_alphanumeric(32);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_with(method, url, token, oauth_params, request_params, &nonce, &timestamp)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn authorization_with(
        &self,
        method: &str,
        url: &str,
        token: Option<TokenPair<'_>>,
        oauth_params: &[(&str, &str)],
        request_params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> Result<String, AuthError> {
        let mut protocol: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer_key.clone()),
            ("oauth_nonce".into(), nonce.to_string()),
            ("oauth_signature_method".into(), "HMAC-SHA1".into()),
            ("oauth_timestamp".into(), timestamp.to_string()),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some(token) = token {
            protocol.push(("oauth_token".into(), token.token.to_string()));
        }
        protocol.extend(oauth_params.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let mut signed = protocol.clone();
        signed.extend(request_params.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let base = signature_base_string(method, url, &signed);
        let signature = sign(&base, &self.consumer_secret, token.map(|t| t.secret).unwrap_or(""))?;
        protocol.push(("oauth_signature".into(), signature));

        let mut encoded: Vec<(String, String)> = protocol
            .iter()
            .map(|(k, v)| (percent_encode(k), percent_encode(v)))
            .collect();
        encoded.sort();

        let fields: Vec<String> = encoded
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, v))
            .collect();
        Ok(format!("OAuth {}", fields.join(", ")))
    }
}

/// `METHOD&encoded-url&encoded-normalized-params`
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

/// Base64 HMAC-SHA1 of `base` keyed by `consumer_secret&token_secret`
pub fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> Result<String, AuthError> {
    let key = format!("{}&{}", percent_encode(consumer_secret), percent_encode(token_secret));
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| AuthError::ProviderRequest(format!("oauth1 signing key: {}", e)))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
