//! Order service (Exchange) GraphQL client.
//!
//! # Architecture
//!
//! - Queries are plain strings sent in a `graphql_client::QueryBody`
//!   envelope; responses are read through `graphql_client::Response`
//! - Every call is made as a buyer: their token is the bearer credential and
//!   the order service decides which orders it may see and change
//! - The order service is the source of truth; nothing is cached here
//! - Payload-level mutation failures (`...OrError` unions) are returned as
//!   data, not as `ExchangeError`
//!
//! # Example
//!
//! ```rust,ignore
//! use gallery_storefront::exchange::ExchangeClient;
//!
//! let client = ExchangeClient::new(&config.exchange);
//! let order = client.as_buyer(buyer.access_token()).fetch_order(&order_id).await?;
//! ```

mod client;
mod queries;

pub use client::{BuyerExchange, ExchangeClient};

use thiserror::Error;

/// Errors that can occur when talking to the order service.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The buyer's token was refused.
    #[error("Unauthorized")]
    Unauthorized,
}

/// A GraphQL error returned by the order service.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

impl GraphQLError {
    /// An error with only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: vec![],
            path: vec![],
        }
    }
}

impl From<graphql_client::Error> for GraphQLError {
    fn from(e: graphql_client::Error) -> Self {
        Self {
            message: e.message,
            locations: e.locations.map_or_else(Vec::new, |locs| {
                locs.into_iter()
                    .map(|l| GraphQLErrorLocation {
                        line: i64::from(l.line),
                        column: i64::from(l.column),
                    })
                    .collect()
            }),
            path: e.path.map_or_else(Vec::new, |p| {
                p.into_iter()
                    .map(|fragment| match fragment {
                        graphql_client::PathFragment::Key(s) => serde_json::Value::String(s),
                        graphql_client::PathFragment::Index(i) => {
                            serde_json::Value::Number(i.into())
                        }
                    })
                    .collect()
            }),
        }
    }
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    if errors.is_empty() {
        return "(no error details provided)".to_string();
    }

    errors
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let mut parts = Vec::new();

            if !e.message.is_empty() {
                parts.push(e.message.clone());
            }

            if !e.path.is_empty() {
                let path_str = e
                    .path
                    .iter()
                    .map(|p| match p {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".");
                parts.push(format!("path: {path_str}"));
            }

            if let Some(loc) = e.locations.first() {
                parts.push(format!("at line {}:{}", loc.line, loc.column));
            }

            if parts.is_empty() {
                format!("[error {}]: (no details)", i + 1)
            } else {
                parts.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_error_display() {
        let err = ExchangeError::NotFound("order 1234".to_string());
        assert_eq!(err.to_string(), "Not found: order 1234");
        assert_eq!(ExchangeError::Unauthorized.to_string(), "Unauthorized");
    }

    #[test]
    fn test_graphql_error_formatting() {
        let err = ExchangeError::GraphQL(vec![
            GraphQLError::message("Field not found"),
            GraphQLError::message("Invalid ID"),
        ]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Field not found; Invalid ID"
        );
    }

    #[test]
    fn test_graphql_error_path_and_location() {
        let errors = vec![GraphQLError {
            message: String::new(),
            locations: vec![GraphQLErrorLocation { line: 5, column: 10 }],
            path: vec![
                serde_json::Value::String("ecommerceOrder".to_string()),
                serde_json::Value::Number(0.into()),
            ],
        }];
        assert_eq!(
            ExchangeError::GraphQL(errors).to_string(),
            "GraphQL errors: path: ecommerceOrder.0 at line 5:10"
        );
    }

    #[test]
    fn test_graphql_error_no_details() {
        assert_eq!(
            ExchangeError::GraphQL(vec![GraphQLError::message("")]).to_string(),
            "GraphQL errors: [error 1]: (no details)"
        );
        assert_eq!(
            ExchangeError::GraphQL(vec![]).to_string(),
            "GraphQL errors: (no error details provided)"
        );
    }

    #[test]
    fn test_graphql_error_from_wire() {
        let wire: graphql_client::Error = serde_json::from_value(serde_json::json!({
            "message": "Order not found",
            "locations": [{ "line": 2, "column": 3 }],
            "path": ["ecommerceOrder", 1]
        }))
        .unwrap_or_else(|e| panic!("{e}"));
        let error = GraphQLError::from(wire);
        assert_eq!(error.message, "Order not found");
        assert_eq!(error.locations.len(), 1);
        assert_eq!(
            error.path,
            vec![serde_json::json!("ecommerceOrder"), serde_json::json!(1)]
        );
    }
}
