//! Exchange API client implementation.

use std::sync::Arc;

use gallery_core::{CreditCardId, Order, OrderId, TokenId};
use graphql_client::{QueryBody, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::queries::{CREATE_CREDIT_CARD, PAYMENT_ORDER, SET_ORDER_PAYMENT};
use super::{ExchangeError, GraphQLError};
use crate::checkout::{CreditCardOrError, OrderOrError, PaymentMutations};
use crate::config::ExchangeConfig;

/// Header identifying the storefront to the order service.
const APP_TOKEN_HEADER: &str = "X-App-Token";

/// Client for the Exchange GraphQL API.
///
/// Cheap to clone; clones share one connection pool. Calls are made through
/// [`ExchangeClient::as_buyer`].
#[derive(Clone)]
pub struct ExchangeClient {
    inner: Arc<ExchangeClientInner>,
}

struct ExchangeClientInner {
    client: reqwest::Client,
    endpoint: String,
    app_token: SecretString,
}

/// The order service as seen by one buyer.
pub struct BuyerExchange {
    client: ExchangeClient,
    access_token: SecretString,
}

impl ExchangeClient {
    /// Create a new Exchange API client.
    #[must_use]
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            inner: Arc::new(ExchangeClientInner {
                client: reqwest::Client::new(),
                endpoint: config.graphql_url.to_string(),
                app_token: config.app_token.clone(),
            }),
        }
    }

    /// Act as the buyer holding `access_token`.
    #[must_use]
    pub fn as_buyer(&self, access_token: SecretString) -> BuyerExchange {
        BuyerExchange {
            client: self.clone(),
            access_token,
        }
    }

    /// Execute a GraphQL document with the buyer's token.
    async fn execute<T: DeserializeOwned>(
        &self,
        access_token: &SecretString,
        operation_name: &'static str,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T, ExchangeError> {
        let request_body = QueryBody {
            variables,
            query,
            operation_name,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .bearer_auth(access_token.expose_secret())
            .header(APP_TOKEN_HEADER, self.inner.app_token.expose_secret())
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();

        if matches!(
            status,
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN
        ) {
            debug!(status = %status, operation = operation_name, "buyer token refused");
            return Err(ExchangeError::Unauthorized);
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                operation = operation_name,
                body = %response_text.chars().take(500).collect::<String>(),
                "Exchange API returned non-success status"
            );
            return Err(ExchangeError::GraphQL(vec![GraphQLError::message(format!(
                "HTTP {status}: {}",
                response_text.chars().take(200).collect::<String>()
            ))]));
        }

        let response: Response<T> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    operation = operation_name,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "Failed to parse Exchange GraphQL response"
                );
                return Err(ExchangeError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, operation = operation_name, "GraphQL errors in response");
            return Err(ExchangeError::GraphQL(
                errors.into_iter().map(GraphQLError::from).collect(),
            ));
        }

        response.data.ok_or_else(|| {
            tracing::error!(
                operation = operation_name,
                "Exchange GraphQL response has no data and no errors"
            );
            ExchangeError::GraphQL(vec![GraphQLError::message("No data in response")])
        })
    }
}

impl BuyerExchange {
    async fn execute<T: DeserializeOwned>(
        &self,
        operation_name: &'static str,
        query: &'static str,
        variables: serde_json::Value,
    ) -> Result<T, ExchangeError> {
        self.client
            .execute(&self.access_token, operation_name, query, variables)
            .await
    }

    /// Fetch an order for the payment step.
    ///
    /// # Errors
    ///
    /// Returns `ExchangeError::NotFound` if the order does not exist or is not
    /// the buyer's, `ExchangeError::Unauthorized` if the token is refused, or
    /// another error if the API request fails.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, ExchangeError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "ecommerceOrder")]
            order: Option<Order>,
        }

        let variables = serde_json::json!({ "id": order_id });
        let data: Data = self
            .execute("PaymentOrder", PAYMENT_ORDER, variables)
            .await?;

        data.order
            .ok_or_else(|| ExchangeError::NotFound(format!("order {order_id}")))
    }
}

impl PaymentMutations for BuyerExchange {
    type Error = ExchangeError;

    #[instrument(skip(self, token))]
    async fn create_credit_card(&self, token: &TokenId) -> Result<CreditCardOrError, ExchangeError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "createCreditCard")]
            payload: Option<Payload>,
        }

        #[derive(Deserialize)]
        struct Payload {
            #[serde(rename = "creditCardOrError")]
            credit_card_or_error: CreditCardOrError,
        }

        let variables = serde_json::json!({ "input": { "token": token } });
        let data: Data = self
            .execute("PaymentCreateCreditCard", CREATE_CREDIT_CARD, variables)
            .await?;

        data.payload
            .map(|payload| payload.credit_card_or_error)
            .ok_or_else(|| {
                ExchangeError::GraphQL(vec![GraphQLError::message(
                    "createCreditCard returned no payload",
                )])
            })
    }

    #[instrument(skip(self), fields(credit_card_id = %credit_card_id, order_id = %order_id))]
    async fn set_order_payment(
        &self,
        credit_card_id: &CreditCardId,
        order_id: &OrderId,
    ) -> Result<OrderOrError, ExchangeError> {
        #[derive(Deserialize)]
        struct Data {
            #[serde(rename = "ecommerceSetOrderPayment")]
            payload: Option<Payload>,
        }

        #[derive(Deserialize)]
        struct Payload {
            #[serde(rename = "orderOrError")]
            order_or_error: OrderOrError,
        }

        let variables = serde_json::json!({
            "input": {
                "creditCardId": credit_card_id,
                "orderId": order_id,
            }
        });
        let data: Data = self
            .execute("PaymentSetOrderPayment", SET_ORDER_PAYMENT, variables)
            .await?;

        data.payload
            .map(|payload| payload.order_or_error)
            .ok_or_else(|| {
                ExchangeError::GraphQL(vec![GraphQLError::message(
                    "ecommerceSetOrderPayment returned no payload",
                )])
            })
    }
}
