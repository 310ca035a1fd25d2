use std::fmt;

// === ValidationError ===

/// Errors for bookmark input that is rejected before any remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The title is empty after trimming.
    EmptyTitle,
    /// The URL is empty after trimming.
    EmptyUrl,
    /// The URL does not parse as an absolute URL.
    InvalidUrl(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyTitle => write!(f, "Title must not be empty"),
            ValidationError::EmptyUrl => write!(f, "URL must not be empty"),
            ValidationError::InvalidUrl(url) => {
                write!(f, "Not a valid absolute URL: {}", url)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

// === StoreError ===

/// Failures surfaced by the persistent store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store was unreachable or the request did not complete.
    Network(String),
    /// The row-level access policy rejected the operation.
    AccessDenied(String),
    /// The store rejected the record contents.
    Validation(String),
    /// The underlying database failed.
    Database(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Network(msg) => write!(f, "Store network error: {}", msg),
            StoreError::AccessDenied(msg) => write!(f, "Store access denied: {}", msg),
            StoreError::Validation(msg) => write!(f, "Store rejected record: {}", msg),
            StoreError::Database(msg) => write!(f, "Store database error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

// === SubscriptionError ===

/// Failures while establishing a change feed subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The feed rejected or failed the subscription request.
    SetupFailed(String),
    /// The feed is no longer delivering events.
    Closed,
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionError::SetupFailed(msg) => {
                write!(f, "Change feed subscription failed: {}", msg)
            }
            SubscriptionError::Closed => write!(f, "Change feed closed"),
        }
    }
}

impl std::error::Error for SubscriptionError {}

// === EngineError ===

/// Errors surfaced at the reconciliation engine boundary.
///
/// Every remote-facing failure is converted into one of these and recorded in
/// the engine's single last-error slot, overwritten by the next action. None
/// is fatal; retry is repeating the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Input rejected before any remote call was made.
    Validation(ValidationError),
    /// An intent requiring a session was issued while signed out.
    NotAuthenticated,
    /// Fetching the authoritative collection failed.
    RemoteRead(String),
    /// A remote insert or delete failed.
    RemoteWrite(String),
    /// The change feed subscription could not be established.
    Subscription(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Validation(e) => write!(f, "{}", e),
            EngineError::NotAuthenticated => write!(f, "Not signed in"),
            EngineError::RemoteRead(msg) => write!(f, "Failed to load bookmarks: {}", msg),
            EngineError::RemoteWrite(msg) => write!(f, "Remote write failed: {}", msg),
            EngineError::Subscription(msg) => {
                write!(f, "Change feed subscription failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

// === ConfigError ===

/// Errors related to configuration loading and saving.
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading or writing the config file.
    Io(String),
    /// Failed to serialize or deserialize the configuration.
    Serialization(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Serialization(msg) => write!(f, "Config serialization error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
