use super::{CheckoutSession, PaymentProvider, ProviderError, RedirectUrls, ensure_success, http_client};
use crate::config::CoinbaseConfig;
use crate::entities::Order;
use async_trait::async_trait;
use nftvault_sdk::objects::ProviderKind;
use serde::Deserialize;
use serde_json::json;

/// Coinbase Commerce API version pinned by every request.
const API_VERSION: &str = "2018-03-22";

/// Coinbase Commerce charges.
pub struct CoinbaseProvider {
    client: reqwest::Client,
    config: CoinbaseConfig,
    redirects: RedirectUrls,
}

#[derive(Debug, Deserialize)]
struct ChargeEnvelope {
    data: Charge,
}

#[derive(Debug, Deserialize)]
struct Charge {
    id: String,
    hosted_url: String,
}

impl CoinbaseProvider {
    pub fn new(config: CoinbaseConfig, redirects: RedirectUrls) -> Self {
        Self {
            client: http_client(),
            config,
            redirects,
        }
    }
}

#[async_trait]
impl PaymentProvider for CoinbaseProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Coinbase
    }

    #[tracing::instrument(skip_all, err, name = "Coinbase:CreateCharge", fields(order_id = %order.id))]
    async fn create_checkout(&self, order: &Order) -> Result<CheckoutSession, ProviderError> {
        let (redirect_url, cancel_url) = self.redirects.for_order(order.id);
        let body = json!({
            "name": order.description,
            "description": order.description,
            "pricing_type": "fixed_price",
            "local_price": {
                "amount": order.amount.round_dp(2).to_string(),
                "currency": order.currency,
            },
            "metadata": { "orderId": order.id },
            "redirect_url": redirect_url,
            "cancel_url": cancel_url,
        });

        let response = self
            .client
            .post(format!(
                "{}/charges",
                self.config.api_base.as_str().trim_end_matches('/')
            ))
            .header("X-CC-Api-Key", &self.config.api_key)
            .header("X-CC-Version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let envelope: ChargeEnvelope = ensure_success(ProviderKind::Coinbase, response)
            .await?
            .json()
            .await?;

        Ok(CheckoutSession {
            redirect_url: envelope.data.hosted_url,
            provider_charge_id: envelope.data.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::NewOrder;
    use mockito::Matcher;
    use rust_decimal::Decimal;
    use url::Url;

    fn provider(api_base: &str) -> CoinbaseProvider {
        CoinbaseProvider::new(
            CoinbaseConfig {
                api_key: "cb-key".into(),
                webhook_secret: "cb-secret".into(),
                api_base: Url::parse(api_base).unwrap(),
            },
            RedirectUrls::new(
                Url::parse("https://vault.example/success").unwrap(),
                Url::parse("https://vault.example/cancel").unwrap(),
            ),
        )
    }

    #[tokio::test]
    async fn test_creates_charge() {
        let mut server = mockito::Server::new_async().await;
        let order = Order::new(
            NewOrder {
                wallet_address: Some("0xabc".into()),
                amount: Decimal::new(25, 0),
                currency: "USD".into(),
                description: "Vault NFT".into(),
                payment_provider: ProviderKind::Coinbase,
            },
            0,
        );
        let mock = server
            .mock("POST", "/charges")
            .match_header("x-cc-api-key", "cb-key")
            .match_header("x-cc-version", API_VERSION)
            .match_body(Matcher::PartialJson(json!({
                "pricing_type": "fixed_price",
                "local_price": { "amount": "25", "currency": "USD" },
                "metadata": { "orderId": order.id.to_string() },
            })))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": {
                        "id": "charge-1",
                        "code": "ABCD1234",
                        "hosted_url": "https://commerce.coinbase.com/charges/ABCD1234"
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let session = provider(&server.url()).create_checkout(&order).await.unwrap();
        assert_eq!(session.provider_charge_id, "charge-1");
        assert_eq!(
            session.redirect_url,
            "https://commerce.coinbase.com/charges/ABCD1234"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_body_is_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/charges")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{}}"#)
            .create_async()
            .await;

        let order = Order::new(
            NewOrder {
                wallet_address: None,
                amount: Decimal::new(25, 0),
                currency: "USD".into(),
                description: "Vault NFT".into(),
                payment_provider: ProviderKind::Coinbase,
            },
            0,
        );
        let err = provider(&server.url()).create_checkout(&order).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
    }
}
