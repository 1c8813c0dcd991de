//! Error types for upstream reads and scrape aggregation.
//!
//! "Not found" is never an error here: readers return `Ok(None)` for a 404
//! they were told to accept and for an empty or missing log.

use std::time::Duration;

/// Failure of a single read against the upstream server.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Connection refused, reset, DNS failure, body read failure.
    Transport(String),
    /// Error status (>= 400, or a 404 the caller did not accept).
    Status { url: String, status: u16 },
    /// Response could not be decoded into the expected shape.
    Decode(String),
    /// The scrape deadline expired before the read completed.
    Timeout,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "transport error: {}", msg),
            SourceError::Status { url, status } => {
                write!(f, "HTTP call to {} resulted in status code {}", url, status)
            }
            SourceError::Decode(msg) => write!(f, "decode error: {}", msg),
            SourceError::Timeout => write!(f, "deadline exceeded"),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Decode(e.to_string())
    }
}

/// Independent data grouping fetched in parallel during a scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Info,
    Server,
    Cluster,
    Projections,
    Subscriptions,
    Streams,
    TcpConnections,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Info => "server info",
            Category::Server => "server stats",
            Category::Cluster => "cluster stats",
            Category::Projections => "projection stats",
            Category::Subscriptions => "subscription stats",
            Category::Streams => "stream stats",
            Category::TcpConnections => "tcp connection stats",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scrape-level failure: no usable snapshot was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectError {
    /// A mandatory category failed.
    Category {
        category: Category,
        error: SourceError,
    },
    /// The whole aggregation ran past its deadline.
    Timeout(Duration),
}

impl CollectError {
    pub(crate) fn category(category: Category) -> impl FnOnce(SourceError) -> CollectError {
        move |error| CollectError::Category { category, error }
    }

    /// True when the scrape failed because time ran out, at any level.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            CollectError::Timeout(_)
                | CollectError::Category {
                    error: SourceError::Timeout,
                    ..
                }
        )
    }
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Category { category, error } => {
                write!(f, "error while getting {}: {}", category, error)
            }
            CollectError::Timeout(timeout) => {
                write!(f, "scrape did not finish within {:?}", timeout)
            }
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Category { error, .. } => Some(error),
            CollectError::Timeout(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_error_names_the_category() {
        let err = CollectError::Category {
            category: Category::Subscriptions,
            error: SourceError::Status {
                url: "http://es:2113/subscriptions".to_string(),
                status: 500,
            },
        };
        assert_eq!(
            err.to_string(),
            "error while getting subscription stats: HTTP call to http://es:2113/subscriptions resulted in status code 500"
        );
    }

    #[test]
    fn timeout_detected_at_both_levels() {
        assert!(CollectError::Timeout(Duration::from_secs(1)).is_timeout());
        assert!(
            CollectError::Category {
                category: Category::Streams,
                error: SourceError::Timeout,
            }
            .is_timeout()
        );
        assert!(
            !CollectError::Category {
                category: Category::Streams,
                error: SourceError::Transport("refused".to_string()),
            }
            .is_timeout()
        );
    }
}
