use super::{
    CheckoutSession, PaymentProvider, ProviderError, RedirectUrls, ensure_success, http_client,
    to_minor_units,
};
use crate::config::StripeConfig;
use crate::entities::Order;
use async_trait::async_trait;
use nftvault_sdk::objects::ProviderKind;
use serde::Deserialize;

/// Stripe Checkout Sessions.
pub struct StripeProvider {
    client: reqwest::Client,
    config: StripeConfig,
    redirects: RedirectUrls,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

impl StripeProvider {
    pub fn new(config: StripeConfig, redirects: RedirectUrls) -> Self {
        Self {
            client: http_client(),
            config,
            redirects,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/checkout/sessions",
            self.config.api_base.as_str().trim_end_matches('/')
        )
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    #[tracing::instrument(skip_all, err, name = "Stripe:CreateCheckoutSession", fields(order_id = %order.id))]
    async fn create_checkout(&self, order: &Order) -> Result<CheckoutSession, ProviderError> {
        let unit_amount = to_minor_units(order.amount, &order.currency)?;
        let (success_url, cancel_url) = self.redirects.for_order(order.id);
        let order_id = order.id.to_string();

        let form: Vec<(&str, String)> = vec![
            ("mode", "payment".into()),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
            ("client_reference_id", order_id.clone()),
            ("metadata[orderId]", order_id),
            ("line_items[0][quantity]", "1".into()),
            (
                "line_items[0][price_data][currency]",
                order.currency.to_ascii_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]",
                unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                order.description.clone(),
            ),
        ];

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await?;
        let session: SessionResponse = ensure_success(ProviderKind::Stripe, response)
            .await?
            .json()
            .await?;

        let redirect_url = session.url.ok_or_else(|| ProviderError::InvalidResponse {
            provider: ProviderKind::Stripe,
            reason: format!("session {} has no url", session.id),
        })?;
        tracing::debug!(session_id = %session.id, "Stripe checkout session created");

        Ok(CheckoutSession {
            redirect_url,
            provider_charge_id: session.id,
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

    fn order() -> Order {
        Order::new(
            NewOrder {
                wallet_address: None,
                amount: Decimal::new(4999, 2),
                currency: "USD".into(),
                description: "Vault Genesis NFT".into(),
                payment_provider: ProviderKind::Stripe,
            },
            0,
        )
    }

    fn provider(api_base: &str) -> StripeProvider {
        StripeProvider::new(
            StripeConfig {
                secret_key: "sk_test_123".into(),
                webhook_secret: "whsec_test".into(),
                api_base: Url::parse(api_base).unwrap(),
            },
            RedirectUrls::new(
                Url::parse("https://vault.example/success").unwrap(),
                Url::parse("https://vault.example/cancel").unwrap(),
            ),
        )
    }

    #[tokio::test]
    async fn test_creates_session() {
        let mut server = mockito::Server::new_async().await;
        let order = order();
        let mock = server
            .mock("POST", "/v1/checkout/sessions")
            .match_header("authorization", "Bearer sk_test_123")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("mode".into(), "payment".into()),
                Matcher::UrlEncoded("metadata[orderId]".into(), order.id.to_string()),
                Matcher::UrlEncoded("client_reference_id".into(), order.id.to_string()),
                Matcher::UrlEncoded(
                    "line_items[0][price_data][unit_amount]".into(),
                    "4999".into(),
                ),
                Matcher::UrlEncoded("line_items[0][price_data][currency]".into(), "usd".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"cs_test_1","url":"https://checkout.stripe.com/c/pay/cs_test_1"}"#)
            .create_async()
            .await;

        let session = provider(&server.url()).create_checkout(&order).await.unwrap();
        assert_eq!(session.provider_charge_id, "cs_test_1");
        assert_eq!(
            session.redirect_url,
            "https://checkout.stripe.com/c/pay/cs_test_1"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/checkout/sessions")
            .with_status(402)
            .with_body(r#"{"error":{"message":"card declined"}}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .create_checkout(&order())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RequestFailed { status: 402, provider: ProviderKind::Stripe, .. }
        ));
    }

    #[tokio::test]
    async fn test_session_without_url_is_invalid() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/checkout/sessions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"cs_test_2","url":null}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .create_checkout(&order())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }
}
