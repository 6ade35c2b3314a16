// Globus Auth native-app login. The user opens an authorize URL in a
// browser, pastes back the code, and we keep only the refresh token for the
// Transfer resource server. Later runs trade that token for an access token.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::api::decode;
use crate::config::{self, Env};
use crate::constants;
use crate::error::{ApiError, AuthError};

#[derive(Deserialize, Debug)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    resource_server: Option<String>,
    #[serde(default)]
    other_tokens: Vec<TokenResponse>,
}

impl TokenResponse {
    /// Find the token set issued for `resource_server`, either at the top
    /// level or among `other_tokens`.
    fn by_resource_server(&self, resource_server: &str) -> Option<&TokenResponse> {
        if self.resource_server.as_deref() == Some(resource_server) {
            return Some(self);
        }
        self.other_tokens
            .iter()
            .find(|t| t.resource_server.as_deref() == Some(resource_server))
    }
}

/// An in-progress PKCE authorization: the verifier must be kept until the
/// code is exchanged.
pub struct PkceFlow {
    verifier: String,
}

impl PkceFlow {
    pub fn start() -> Self {
        let verifier = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        PkceFlow { verifier }
    }

    pub fn challenge(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.verifier.as_bytes()))
    }
}

/// Native-app client for Globus Auth.
pub struct NativeAppAuth {
    client: Client,
    base_url: String,
    client_id: String,
}

impl NativeAppAuth {
    pub fn from_env(env: &dyn Env) -> Result<Self, ApiError> {
        let base_url =
            config::service_url(env, constants::AUTH_URL_ENV, constants::AUTH_URL_DEFAULT);
        Ok(NativeAppAuth {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: constants::CLIENT_ID.to_string(),
        })
    }

    /// URL the user must visit to log in and obtain an authorization code.
    pub fn authorize_url(&self, flow: &PkceFlow) -> String {
        let mut url = match Url::parse(&format!("{}/v2/oauth2/authorize", self.base_url)) {
            Ok(url) => url,
            Err(_) => return format!("{}/v2/oauth2/authorize", self.base_url),
        };
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", constants::NATIVE_APP_REDIRECT)
            .append_pair("scope", constants::TRANSFER_SCOPE)
            .append_pair("response_type", "code")
            .append_pair("code_challenge", &flow.challenge())
            .append_pair("code_challenge_method", "S256")
            .append_pair("access_type", "offline");
        url.to_string()
    }

    fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, ApiError> {
        let res = self
            .client
            .post(format!("{}/v2/oauth2/token", self.base_url))
            .form(form)
            .send()?;
        decode(res)
    }

    /// Exchange an authorization code for the Transfer refresh token.
    pub fn exchange_code(&self, flow: PkceFlow, code: &str) -> Result<String, AuthError> {
        let response = self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code.trim()),
            ("redirect_uri", constants::NATIVE_APP_REDIRECT),
            ("client_id", &self.client_id),
            ("code_verifier", &flow.verifier),
        ])?;
        response
            .by_resource_server(constants::TRANSFER_RESOURCE_SERVER)
            .and_then(|t| t.refresh_token.clone())
            .ok_or(AuthError::MissingToken("refresh"))
    }

    /// Trade a refresh token for a fresh Transfer access token.
    pub fn access_token(&self, refresh_token: &str) -> Result<String, AuthError> {
        let response = self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
        ])?;
        tracing::debug!("Refreshed transfer access token");
        response
            .by_resource_server(constants::TRANSFER_RESOURCE_SERVER)
            .or(Some(&response))
            .and_then(|t| t.access_token.clone())
            .ok_or(AuthError::MissingToken("access"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapEnv;

    #[test]
    fn challenge_is_unpadded_base64_sha256() {
        let flow = PkceFlow {
            verifier: "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".into(),
        };
        // RFC 7636 appendix B
        assert_eq!(
            flow.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn verifier_length_is_within_pkce_bounds() {
        let flow = PkceFlow::start();
        assert!((43..=128).contains(&flow.verifier.len()));
    }

    #[test]
    fn authorize_url_carries_client_and_challenge() {
        let auth = NativeAppAuth::from_env(&MapEnv::default()).unwrap();
        let flow = PkceFlow::start();
        let url = auth.authorize_url(&flow);
        assert!(url.starts_with("https://auth.globus.org/v2/oauth2/authorize?"));
        assert!(url.contains(constants::CLIENT_ID));
        assert!(url.contains(&flow.challenge()));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn transfer_token_found_among_other_tokens() {
        let response: TokenResponse = serde_json::from_str(
            r#"{
                "access_token": "a", "resource_server": "auth.globus.org",
                "other_tokens": [
                    {"access_token": "t", "refresh_token": "r",
                     "resource_server": "transfer.api.globus.org"}
                ]
            }"#,
        )
        .unwrap();
        let transfer = response
            .by_resource_server(constants::TRANSFER_RESOURCE_SERVER)
            .unwrap();
        assert_eq!(transfer.refresh_token.as_deref(), Some("r"));
    }
}
