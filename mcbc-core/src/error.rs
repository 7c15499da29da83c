use thiserror::Error;

/// Every failure the bot can surface, grouped by where it came from.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit error: {0}")]
    RedditApi(#[from] RedditApiError),

    /// Bad or missing settings, triggers or templates. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Reddit login failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// HTTP 429 on any endpoint.
    #[error("Too many requests, retry after {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    /// The `RATELIMIT` cooldown Reddit puts on new comments. `message` carries
    /// the "try again in N minutes" text.
    #[error("Reply rate limited: {message}")]
    RateLimited { message: String },

    #[error("Reply rejected ({code}): {message}")]
    CommentRejected { code: String, message: String },

    #[error("Access to {resource} is forbidden")]
    Forbidden { resource: String },

    #[error("No such comment or submission: {fullname}")]
    NotFound { fullname: String },

    #[error("Access token was rejected")]
    InvalidToken,

    #[error("Reddit endpoint unavailable: {endpoint}")]
    EndpointUnavailable { endpoint: String },

    #[error("Failed to establish connection: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Request to Reddit timed out")]
    RequestTimeout,

    #[error("Unexpected response from Reddit: {details}")]
    InvalidResponse { details: String },

    #[error("Reddit server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Unreadable JSON, or JSON that does not match the expected shape.
    #[error("Malformed configuration in {path}: {details}")]
    InvalidFormat { path: String, details: String },

    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Invalid configuration: {reason}")]
    ValidationFailed { reason: String },

    #[error("Could not parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}
