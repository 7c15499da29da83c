use mcbc_core::{CoreError, RedditApiError, RedditCredentials};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, ClientId, ClientSecret, HttpRequest, HttpResponse, ResourceOwnerPassword,
    ResourceOwnerUsername, Scope, TokenResponse, TokenUrl,
};
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

const REDDIT_AUTH_URL: &str = "https://www.reddit.com/api/v1/authorize";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Tokens are refreshed this long before Reddit would reject them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

/// Password-grant authenticator for a Reddit "script" app.
pub struct RedditAuthenticator {
    oauth_client: BasicClient,
    http_client: reqwest::Client,
    credentials: RedditCredentials,
    token: Mutex<Option<RedditToken>>,
}

impl std::fmt::Debug for RedditAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditAuthenticator")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl RedditAuthenticator {
    pub fn new(
        credentials: RedditCredentials,
        http_client: reqwest::Client,
    ) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(REDDIT_AUTH_URL.to_string()).map_err(|e| {
            CoreError::InvalidInput {
                message: format!("Invalid auth URL: {e}"),
            }
        })?;
        let token_url = TokenUrl::new(REDDIT_TOKEN_URL.to_string()).map_err(|e| {
            CoreError::InvalidInput {
                message: format!("Invalid token URL: {e}"),
            }
        })?;

        let oauth_client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::BasicAuth);

        Ok(Self {
            oauth_client,
            http_client,
            credentials,
            token: Mutex::new(None),
        })
    }

    pub fn required_scopes() -> Vec<&'static str> {
        vec!["identity", "read", "submit"]
    }

    /// A valid bearer token, fetching a new one when none is cached or it is about to expire.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.access_token.clone());
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token so the next request authenticates again.
    pub async fn invalidate(&self) {
        debug!("Invalidating cached Reddit access token");
        *self.token.lock().await = None;
    }

    async fn request_token(&self) -> Result<RedditToken, CoreError> {
        info!(
            "Requesting Reddit access token for u/{}",
            self.credentials.username
        );

        let username = ResourceOwnerUsername::new(self.credentials.username.clone());
        let password = ResourceOwnerPassword::new(self.credentials.password.clone());
        let http_client = self.http_client.clone();

        let mut request = self.oauth_client.exchange_password(&username, &password);
        for scope in Self::required_scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let response = request
            .request_async(|req| send_oauth_request(http_client, req))
            .await
            .map_err(|e| {
                error!("Reddit token exchange failed: {}", e);
                CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: e.to_string(),
                })
            })?;

        let expires_in = response
            .expires_in()
            .unwrap_or_else(|| Duration::from_secs(3600));

        debug!("Obtained Reddit access token valid for {:?}", expires_in);
        Ok(RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + expires_in,
        })
    }
}

/// Runs the token exchange through the shared client so Reddit sees our User-Agent.
async fn send_oauth_request(
    http_client: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http_client
        .request(request.method, request.url.as_str())
        .headers(request.headers)
        .body(request.body)
        .send()
        .await?;
    let status_code = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
        status_code,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> RedditCredentials {
        RedditCredentials {
            client_id: "test_client_id".to_string(),
            client_secret: "test_client_secret".to_string(),
            username: "mc_bc_bot".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn test_token_expiry() {
        let now = SystemTime::now();
        let valid = RedditToken {
            access_token: "valid".to_string(),
            expires_at: now + Duration::from_secs(3600),
        };
        let nearly_expired = RedditToken {
            access_token: "nearly".to_string(),
            expires_at: now + Duration::from_secs(30),
        };
        assert!(!valid.is_expired());
        assert!(nearly_expired.is_expired());
    }

    #[test]
    fn test_authenticator_creation() {
        let authenticator = RedditAuthenticator::new(credentials(), reqwest::Client::new());
        assert!(authenticator.is_ok());
        let debug = format!("{:?}", authenticator.unwrap());
        assert!(!debug.contains("secret\""));
    }

    #[test]
    fn test_required_scopes() {
        assert_eq!(
            RedditAuthenticator::required_scopes(),
            vec!["identity", "read", "submit"]
        );
    }

    #[tokio::test]
    async fn test_cached_token_is_reused() {
        let authenticator =
            RedditAuthenticator::new(credentials(), reqwest::Client::new()).unwrap();
        *authenticator.token.lock().await = Some(RedditToken {
            access_token: "cached".to_string(),
            expires_at: SystemTime::now() + Duration::from_secs(3600),
        });

        assert_eq!(authenticator.access_token().await.unwrap(), "cached");

        authenticator.invalidate().await;
        assert!(authenticator.token.lock().await.is_none());
    }
}
