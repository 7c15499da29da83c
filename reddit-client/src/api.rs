use crate::auth::RedditAuthenticator;
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use chrono::{DateTime, TimeZone, Utc};
use mcbc_core::{Comment, CoreError, ParentRef, RedditApiError};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const DELETED_AUTHOR: &str = "[deleted]";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

/// Fields shared by comments (`t1`) and submissions (`t3`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditThingData {
    pub id: String,
    pub name: String,
    pub author: Option<String>,
    /// Comment text; absent on submissions.
    pub body: Option<String>,
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub parent_id: Option<String>,
    pub permalink: String,
    pub subreddit: String,
    pub created_utc: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct CommentResponse {
    json: CommentResponseBody,
}

#[derive(Debug, Clone, Deserialize)]
struct CommentResponseBody {
    #[serde(default)]
    errors: Vec<Vec<serde_json::Value>>,
}

impl RedditThingData {
    /// Convert a listing child into the pipeline's view of an item.
    pub fn into_comment(self, kind: &str) -> Comment {
        let parent = match (kind, self.parent_id) {
            ("t1", Some(parent_id)) if !parent_id.is_empty() => ParentRef::Reply { parent_id },
            _ => ParentRef::Root,
        };
        let body = match kind {
            "t1" => self.body.unwrap_or_default(),
            _ => {
                let title = self.title.unwrap_or_default();
                match self.selftext.filter(|text| !text.is_empty()) {
                    Some(text) => format!("{title}\n\n{text}"),
                    None => title,
                }
            }
        };
        let fullname = if self.name.is_empty() {
            format!("{}_{}", kind, self.id)
        } else {
            self.name
        };

        Comment {
            id: self.id,
            fullname,
            body,
            author: self
                .author
                .filter(|author| !author.is_empty() && author != DELETED_AUTHOR),
            parent,
            permalink: self.permalink,
            subreddit: self.subreddit,
            created_at: timestamp(self.created_utc),
        }
    }
}

fn timestamp(created_utc: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(created_utc as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    authenticator: RedditAuthenticator,
    rate_limiter: RateLimiter,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(
        http_client: Client,
        authenticator: RedditAuthenticator,
        rate_config: RateLimitConfig,
        user_agent: String,
    ) -> Self {
        Self {
            http_client,
            authenticator,
            rate_limiter: RateLimiter::new(rate_config),
            user_agent,
        }
    }

    pub fn build_http_client(user_agent: &str) -> Result<Client, CoreError> {
        Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CoreError::Network)
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        query_params: Option<&[(&str, &str)]>,
        form: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", REDDIT_API_BASE, endpoint);
        let access_token = self.authenticator.access_token().await?;

        let waited = self.rate_limiter.acquire_permit().await;
        if waited > Duration::from_millis(1) {
            debug!("Waited {:?} for request quota on {}", waited, endpoint);
        }

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(&access_token)
            .header("User-Agent", &self.user_agent);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }
        if let Some(fields) = form {
            request_builder = request_builder.form(fields);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                return Err(transport_error(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        warn!("Request failed with status: {} for {}", status, endpoint);
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.trim().parse::<u64>().ok())
                    .unwrap_or(60);
                Err(RedditApiError::RateLimitExceeded { retry_after }.into())
            }
            StatusCode::UNAUTHORIZED => {
                self.authenticator.invalidate().await;
                Err(RedditApiError::InvalidToken.into())
            }
            StatusCode::FORBIDDEN => Err(RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            }
            .into()),
            StatusCode::NOT_FOUND => Err(RedditApiError::NotFound {
                fullname: endpoint.to_string(),
            }
            .into()),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                Err(RedditApiError::EndpointUnavailable {
                    endpoint: endpoint.to_string(),
                }
                .into())
            }
            _ if status.is_server_error() => Err(RedditApiError::ServerError {
                status_code: status.as_u16(),
            }
            .into()),
            _ => Err(RedditApiError::InvalidResponse {
                details: format!("Unexpected status {} from {}", status, endpoint),
            }
            .into()),
        }
    }

    /// Newest comments across `subreddits`, newest first as Reddit returns them.
    pub async fn get_new_comments(
        &self,
        subreddits: &[String],
        limit: u32,
    ) -> Result<Vec<Comment>, CoreError> {
        let endpoint = format!("/r/{}/comments", subreddits.join("+"));
        let limit_str = limit.to_string();
        let params = [("limit", limit_str.as_str()), ("raw_json", "1")];

        let response = self
            .make_request(Method::GET, &endpoint, Some(&params[..]), None)
            .await?;

        let listing: RedditListing<RedditThingData> =
            read_json(response, &format!("comments for {}", endpoint)).await?;

        debug!(
            "Retrieved {} comments from {}",
            listing.data.children.len(),
            endpoint
        );
        Ok(listing
            .data
            .children
            .into_iter()
            .filter(|child| child.kind == "t1")
            .map(|child| child.data.into_comment("t1"))
            .collect())
    }

    /// Look up a single comment or submission by fullname.
    pub async fn get_info(&self, fullname: &str) -> Result<Comment, CoreError> {
        let params = [("id", fullname), ("raw_json", "1")];
        let response = self
            .make_request(Method::GET, "/api/info", Some(&params[..]), None)
            .await?;

        let listing: RedditListing<RedditThingData> =
            read_json(response, &format!("info for {}", fullname)).await?;

        listing
            .data
            .children
            .into_iter()
            .next()
            .map(|child| {
                let kind = child.kind.clone();
                child.data.into_comment(&kind)
            })
            .ok_or_else(|| {
                CoreError::RedditApi(RedditApiError::NotFound {
                    fullname: fullname.to_string(),
                })
            })
    }

    /// Post a reply under `thing_id`.
    pub async fn submit_comment(&self, thing_id: &str, text: &str) -> Result<(), CoreError> {
        let form = [("api_type", "json"), ("thing_id", thing_id), ("text", text)];
        let response = self
            .make_request(Method::POST, "/api/comment", None, Some(&form[..]))
            .await?;

        let body: CommentResponse = read_json(response, "comment response").await?;

        if let Some(error) = comment_error(&body.json.errors) {
            return Err(error.into());
        }

        info!("Replied to {}", thing_id);
        Ok(())
    }

    pub async fn available_request_tokens(&self) -> u32 {
        self.rate_limiter.available_tokens().await
    }
}

fn transport_error(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        return RedditApiError::RequestTimeout.into();
    }
    if e.is_connect() || e.is_body() {
        return RedditApiError::ConnectionFailed {
            reason: e.to_string(),
        }
        .into();
    }
    CoreError::Network(e)
}

/// Read and decode a response body. Only a body that arrived whole but does
/// not parse is `InvalidResponse`; a body cut off mid-read is a transport failure.
async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, CoreError> {
    response.json().await.map_err(|e| {
        if e.is_decode() {
            error!("Failed to parse {}: {}", what, e);
            RedditApiError::InvalidResponse {
                details: format!("Failed to parse {}", what),
            }
            .into()
        } else {
            warn!("Failed to read {}: {}", what, e);
            transport_error(e)
        }
    })
}

/// Turn the first `[code, message, field]` entry of a `json.errors` array into an error.
fn comment_error(errors: &[Vec<serde_json::Value>]) -> Option<RedditApiError> {
    let entry = errors.first()?;
    let text = |index: usize| {
        entry
            .get(index)
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .to_string()
    };
    let code = text(0);
    let message = text(1);

    if code.eq_ignore_ascii_case("RATELIMIT") {
        Some(RedditApiError::RateLimited { message })
    } else {
        Some(RedditApiError::CommentRejected { code, message })
    }
}
