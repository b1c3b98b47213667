//! PayPal Orders v2.
//!
//! PayPal needs an OAuth2 access token for every call, including webhook
//! verification, so both concerns share one [`PayPalClient`].

use super::{
    CaptureStatus, CheckoutSession, PaymentProvider, ProviderError, RedirectUrls, ensure_success,
    http_client,
};
use crate::config::PayPalConfig;
use crate::entities::Order;
use async_trait::async_trait;
use nftvault_sdk::objects::ProviderKind;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Refresh the access token this long before PayPal says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Headers PayPal attaches to every webhook delivery.
const TRANSMISSION_HEADERS: [(&str, &str); 5] = [
    ("auth_algo", "paypal-auth-algo"),
    ("cert_url", "paypal-cert-url"),
    ("transmission_id", "paypal-transmission-id"),
    ("transmission_sig", "paypal-transmission-sig"),
    ("transmission_time", "paypal-transmission-time"),
];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    status: String,
    #[serde(default)]
    purchase_units: Vec<CapturedUnit>,
}

#[derive(Debug, Deserialize)]
struct CapturedUnit {
    #[serde(default)]
    payments: Option<CapturedPayments>,
}

#[derive(Debug, Deserialize)]
struct CapturedPayments {
    #[serde(default)]
    captures: Vec<CaptureRecord>,
}

#[derive(Debug, Deserialize)]
struct CaptureRecord {
    status: String,
}

impl CaptureResponse {
    /// The capture's own status when present. An order can be `COMPLETED`
    /// while its capture is still `PENDING`.
    fn capture_status(&self) -> &str {
        self.purchase_units
            .iter()
            .filter_map(|unit| unit.payments.as_ref())
            .flat_map(|payments| payments.captures.first())
            .map(|capture| capture.status.as_str())
            .next()
            .unwrap_or(self.status.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    verification_status: String,
}

/// Authenticated access to the PayPal REST API.
pub struct PayPalClient {
    client: reqwest::Client,
    config: PayPalConfig,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> Self {
        Self {
            client: http_client(),
            config,
            token: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.config.api_base.as_str().trim_end_matches('/'),
            path
        )
    }

    /// A valid access token, fetched with client credentials when the cached
    /// one is missing or about to expire.
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached
            .as_ref()
            .filter(|token| Instant::now() < token.refresh_at)
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: TokenResponse = ensure_success(ProviderKind::Paypal, response)
            .await?
            .json()
            .await?;
        tracing::debug!(expires_in = token.expires_in, "PayPal access token refreshed");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    /// Ask PayPal whether a webhook delivery is authentic.
    ///
    /// Missing transmission headers or a body that is not JSON yield
    /// `Ok(false)` without a network call.
    #[tracing::instrument(skip_all, err, name = "PayPal:VerifyWebhookSignature")]
    pub async fn verify_webhook(
        &self,
        headers: &HeaderMap,
        raw_body: &[u8],
    ) -> Result<bool, ProviderError> {
        let mut request = serde_json::Map::new();
        for (field, header) in TRANSMISSION_HEADERS {
            let Some(value) = headers.get(header).and_then(|v| v.to_str().ok()) else {
                return Ok(false);
            };
            request.insert(field.to_owned(), Value::String(value.to_owned()));
        }
        let Ok(event) = serde_json::from_slice::<Value>(raw_body) else {
            return Ok(false);
        };
        request.insert(
            "webhook_id".to_owned(),
            Value::String(self.config.webhook_id.clone()),
        );
        request.insert("webhook_event".to_owned(), event);

        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url("/v1/notifications/verify-webhook-signature"))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        let verification: VerificationResponse = ensure_success(ProviderKind::Paypal, response)
            .await?
            .json()
            .await?;
        Ok(verification.verification_status == "SUCCESS")
    }
}

/// PayPal checkout orders.
pub struct PayPalProvider {
    client: Arc<PayPalClient>,
    redirects: RedirectUrls,
}

impl PayPalProvider {
    pub fn new(client: Arc<PayPalClient>, redirects: RedirectUrls) -> Self {
        Self { client, redirects }
    }
}

#[async_trait]
impl PaymentProvider for PayPalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Paypal
    }

    #[tracing::instrument(skip_all, err, name = "PayPal:CreateOrder", fields(order_id = %order.id))]
    async fn create_checkout(&self, order: &Order) -> Result<CheckoutSession, ProviderError> {
        let (return_url, cancel_url) = self.redirects.for_order(order.id);
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "custom_id": order.id,
                "description": order.description,
                "amount": {
                    "currency_code": order.currency,
                    "value": format!("{:.2}", order.amount),
                },
            }],
            "application_context": {
                "return_url": return_url,
                "cancel_url": cancel_url,
                "user_action": "PAY_NOW",
            },
        });

        let token = self.client.access_token().await?;
        let response = self
            .client
            .client
            .post(self.client.url("/v2/checkout/orders"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let created: OrderResponse = ensure_success(ProviderKind::Paypal, response)
            .await?
            .json()
            .await?;

        let approve = created
            .links
            .into_iter()
            .find(|link| link.rel == "approve" || link.rel == "payer-action")
            .ok_or_else(|| ProviderError::InvalidResponse {
                provider: ProviderKind::Paypal,
                reason: format!("order {} has no approval link", created.id),
            })?;

        Ok(CheckoutSession {
            redirect_url: approve.href,
            provider_charge_id: created.id,
        })
    }

    #[tracing::instrument(skip(self), err, name = "PayPal:CaptureOrder")]
    async fn capture(&self, provider_payment_id: &str) -> Result<CaptureStatus, ProviderError> {
        let token = self.client.access_token().await?;
        let response = self
            .client
            .client
            .post(
                self.client
                    .url(&format!("/v2/checkout/orders/{provider_payment_id}/capture")),
            )
            .bearer_auth(token)
            // Repeated deliveries reuse the request id, so PayPal captures once.
            .header("PayPal-Request-Id", format!("capture-{provider_payment_id}"))
            .json(&json!({}))
            .send()
            .await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            if body.contains("ORDER_ALREADY_CAPTURED") {
                tracing::info!(provider_payment_id, "PayPal order was already captured");
                return Ok(CaptureStatus::Completed);
            }
            return Err(ProviderError::RequestFailed {
                provider: ProviderKind::Paypal,
                status: StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                body,
            });
        }
        let captured: CaptureResponse = ensure_success(ProviderKind::Paypal, response)
            .await?
            .json()
            .await?;

        match captured.capture_status() {
            "COMPLETED" => Ok(CaptureStatus::Completed),
            "PENDING" => Ok(CaptureStatus::Pending),
            "DECLINED" | "FAILED" => Ok(CaptureStatus::Declined),
            other => Err(ProviderError::InvalidResponse {
                provider: ProviderKind::Paypal,
                reason: format!("capture of {provider_payment_id} has status {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::NewOrder;
    use mockito::Matcher;
    use reqwest::header::HeaderValue;
    use rust_decimal::Decimal;
    use url::Url;

    fn client(api_base: &str) -> Arc<PayPalClient> {
        Arc::new(PayPalClient::new(PayPalConfig {
            client_id: "client".into(),
            client_secret: "secret".into(),
            webhook_id: "WH-1".into(),
            api_base: Url::parse(api_base).unwrap(),
        }))
    }

    async fn mock_token(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/v1/oauth2/token")
            .match_body(Matcher::UrlEncoded(
                "grant_type".into(),
                "client_credentials".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"A21AA","token_type":"Bearer","expires_in":32400}"#)
            .expect(1)
            .create_async()
            .await
    }

    fn transmission_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (_, name) in TRANSMISSION_HEADERS {
            headers.insert(name, HeaderValue::from_static("value"));
        }
        headers
    }

    #[tokio::test]
    async fn test_creates_order_and_caches_token() {
        let mut server = mockito::Server::new_async().await;
        let token = mock_token(&mut server).await;
        let orders = server
            .mock("POST", "/v2/checkout/orders")
            .match_header("authorization", "Bearer A21AA")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({ "intent": "CAPTURE" })),
                Matcher::Regex(r#""value":"12\.50""#.into()),
            ]))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "5O190127TN364715T",
                    "status": "CREATED",
                    "links": [
                        { "href": "https://api.paypal.com/v2/checkout/orders/5O19", "rel": "self" },
                        { "href": "https://www.paypal.com/checkoutnow?token=5O19", "rel": "approve" }
                    ]
                })
                .to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let provider = PayPalProvider::new(
            client(&server.url()),
            RedirectUrls::new(
                Url::parse("https://vault.example/success").unwrap(),
                Url::parse("https://vault.example/cancel").unwrap(),
            ),
        );
        let order = Order::new(
            NewOrder {
                wallet_address: None,
                amount: Decimal::new(125, 1),
                currency: "EUR".into(),
                description: "Vault NFT".into(),
                payment_provider: ProviderKind::Paypal,
            },
            0,
        );

        for _ in 0..2 {
            let session = provider.create_checkout(&order).await.unwrap();
            assert_eq!(session.provider_charge_id, "5O190127TN364715T");
            assert_eq!(
                session.redirect_url,
                "https://www.paypal.com/checkoutnow?token=5O19"
            );
        }
        token.assert_async().await;
        orders.assert_async().await;
    }

    fn provider(api_base: &str) -> PayPalProvider {
        PayPalProvider::new(
            client(api_base),
            RedirectUrls::new(
                Url::parse("https://vault.example/success").unwrap(),
                Url::parse("https://vault.example/cancel").unwrap(),
            ),
        )
    }

    fn captured(order_status: &str, capture_status: &str) -> String {
        json!({
            "id": "5O190127TN364715T",
            "status": order_status,
            "purchase_units": [{
                "payments": { "captures": [{ "id": "3C679366HH908993F", "status": capture_status }] }
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_capture_collects_approved_order() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        let capture = server
            .mock("POST", "/v2/checkout/orders/5O190127TN364715T/capture")
            .match_header("authorization", "Bearer A21AA")
            .match_header("paypal-request-id", "capture-5O190127TN364715T")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(captured("COMPLETED", "COMPLETED"))
            .expect(1)
            .create_async()
            .await;

        let status = provider(&server.url())
            .capture("5O190127TN364715T")
            .await
            .unwrap();
        assert_eq!(status, CaptureStatus::Completed);
        capture.assert_async().await;
    }

    #[tokio::test]
    async fn test_capture_reports_pending_and_declined() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("POST", "/v2/checkout/orders/PENDING-1/capture")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(captured("COMPLETED", "PENDING"))
            .create_async()
            .await;
        server
            .mock("POST", "/v2/checkout/orders/DECLINED-1/capture")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(captured("COMPLETED", "DECLINED"))
            .create_async()
            .await;

        let provider = provider(&server.url());
        assert_eq!(
            provider.capture("PENDING-1").await.unwrap(),
            CaptureStatus::Pending
        );
        assert_eq!(
            provider.capture("DECLINED-1").await.unwrap(),
            CaptureStatus::Declined
        );
    }

    #[tokio::test]
    async fn test_capture_of_captured_order_is_completed() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("POST", "/v2/checkout/orders/DONE-1/capture")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name":"UNPROCESSABLE_ENTITY","details":[{"issue":"ORDER_ALREADY_CAPTURED"}]}"#,
            )
            .create_async()
            .await;
        server
            .mock("POST", "/v2/checkout/orders/NOPE-1/capture")
            .with_status(422)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"name":"UNPROCESSABLE_ENTITY","details":[{"issue":"ORDER_NOT_APPROVED"}]}"#,
            )
            .create_async()
            .await;

        let provider = provider(&server.url());
        assert_eq!(
            provider.capture("DONE-1").await.unwrap(),
            CaptureStatus::Completed
        );
        assert!(matches!(
            provider.capture("NOPE-1").await,
            Err(ProviderError::RequestFailed { status: 422, .. })
        ));
    }

    #[tokio::test]
    async fn test_verify_webhook_success_and_failure() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("POST", "/v1/notifications/verify-webhook-signature")
            .match_body(Matcher::PartialJson(json!({
                "webhook_id": "WH-1",
                "transmission_id": "value",
                "webhook_event": { "id": "WH-EVT-1" },
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"verification_status":"SUCCESS"}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let headers = transmission_headers();
        assert!(client
            .verify_webhook(&headers, br#"{"id":"WH-EVT-1"}"#)
            .await
            .unwrap());
        // Another event id does not match the mock, which answers 501.
        assert!(client
            .verify_webhook(&headers, br#"{"id":"WH-EVT-2"}"#)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_verify_webhook_rejects_failure_status() {
        let mut server = mockito::Server::new_async().await;
        mock_token(&mut server).await;
        server
            .mock("POST", "/v1/notifications/verify-webhook-signature")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"verification_status":"FAILURE"}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        assert!(!client
            .verify_webhook(&transmission_headers(), br#"{"id":"WH-EVT-1"}"#)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_verify_webhook_without_headers_skips_network() {
        let client = client("http://127.0.0.1:9");
        assert!(!client
            .verify_webhook(&HeaderMap::new(), br#"{"id":"WH-EVT-1"}"#)
            .await
            .unwrap());
        assert!(!client
            .verify_webhook(&transmission_headers(), b"not json")
            .await
            .unwrap());
    }
}
