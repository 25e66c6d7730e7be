//! Paystack implementation of the wallet core's Payment Bridge
//!
//! Thin HTTP client over the provider's REST API:
//!
//! - `POST /transaction/initialize` - hosted payment link for funding
//! - `GET /bank/resolve` - bank account resolution
//! - `POST /transferrecipient` - payout recipient registration
//! - `POST /transfer` - payout initiation
//!
//! Amounts cross the wire in kobo (the provider's minor unit); the ledger
//! holds major units. Every request carries the configured bearer credential
//! and is bounded by the configured timeout. No retries here: the ledger
//! treats any failure as final for that attempt and compensates.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use wallet_core::{
    Error, PaymentBridge, PaymentLink, PayoutHandle, ProviderConfig, ResolvedAccount, Result,
};

/// HTTP client for the Paystack API
pub struct PaystackClient {
    base_url: String,
    secret_key: String,
    callback_url: String,
    http: Client,
}

/// Provider response envelope: `status` is the provider's own success flag,
/// independent of the HTTP status code
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: bool,
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct ResolveData {
    account_name: String,
    account_number: String,
}

#[derive(Debug, Deserialize)]
struct RecipientData {
    recipient_code: String,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    transfer_code: String,
    status: String,
}

impl PaystackClient {
    /// Build a client from provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Provider(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
            callback_url: config.callback_url.clone(),
            http,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.secret_key))
    }

    /// Send a request and unwrap the provider's response envelope.
    ///
    /// `not_found_is_invalid` maps provider rejections (4xx or a false
    /// `status` flag) to `InvalidAccount` instead of `Provider`, for the
    /// resolve endpoint where a rejection means the account does not exist.
    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
        rejection_is_invalid_account: bool,
    ) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Provider(format!("{}: {}", context, e)))?;

        let http_status = response.status();
        if !http_status.is_success() {
            tracing::warn!(%http_status, context, "Provider returned error status");
            return Err(Self::rejection(
                context,
                &format!("HTTP {}", http_status),
                rejection_is_invalid_account && http_status.is_client_error(),
            ));
        }

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("{}: malformed response: {}", context, e)))?;

        if !body.status {
            let message = body.message.unwrap_or_else(|| "no message".to_string());
            tracing::warn!(context, %message, "Provider rejected request");
            return Err(Self::rejection(context, &message, rejection_is_invalid_account));
        }

        body.data
            .ok_or_else(|| Error::Provider(format!("{}: response missing data", context)))
    }

    fn rejection(context: &str, detail: &str, invalid_account: bool) -> Error {
        if invalid_account {
            Error::InvalidAccount(format!("{}: {}", context, detail))
        } else {
            Error::Provider(format!("{}: {}", context, detail))
        }
    }

    fn to_kobo(amount: Decimal) -> Result<i64> {
        (amount * Decimal::from(100))
            .round()
            .to_i64()
            .ok_or_else(|| Error::Provider(format!("Amount out of range: {}", amount)))
    }
}

#[async_trait]
impl PaymentBridge for PaystackClient {
    async fn create_payment_link(
        &self,
        amount: Decimal,
        reference: &str,
        email: &str,
    ) -> Result<PaymentLink> {
        let url = format!("{}/transaction/initialize", self.base_url);
        let request = self.authorized(self.http.post(&url)).json(&serde_json::json!({
            "email": email,
            "amount": Self::to_kobo(amount)?,
            "reference": reference,
            "callback_url": self.callback_url,
        }));

        let data: InitializeData = self
            .execute(request, "transaction/initialize", false)
            .await?;

        tracing::debug!(reference = %data.reference, "Payment link created");

        Ok(PaymentLink {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn resolve_bank_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount> {
        let url = format!("{}/bank/resolve", self.base_url);
        let request = self.authorized(
            self.http
                .get(&url)
                .query(&[("account_number", account_number), ("bank_code", bank_code)]),
        );

        let data: ResolveData = self.execute(request, "bank/resolve", true).await?;

        Ok(ResolvedAccount {
            account_name: data.account_name,
            account_number: data.account_number,
        })
    }

    async fn create_payout_recipient(
        &self,
        account_number: &str,
        bank_code: &str,
        name: &str,
    ) -> Result<String> {
        let url = format!("{}/transferrecipient", self.base_url);
        let request = self.authorized(self.http.post(&url)).json(&serde_json::json!({
            "type": "nuban",
            "name": name,
            "account_number": account_number,
            "bank_code": bank_code,
            "currency": "NGN",
        }));

        let data: RecipientData = self.execute(request, "transferrecipient", false).await?;
        Ok(data.recipient_code)
    }

    async fn initiate_payout(
        &self,
        amount: Decimal,
        recipient_code: &str,
        reason: &str,
    ) -> Result<PayoutHandle> {
        let url = format!("{}/transfer", self.base_url);
        let request = self.authorized(self.http.post(&url)).json(&serde_json::json!({
            "source": "balance",
            "amount": Self::to_kobo(amount)?,
            "recipient": recipient_code,
            "reason": reason,
        }));

        let data: TransferData = self.execute(request, "transfer", false).await?;

        tracing::debug!(transfer_code = %data.transfer_code, "Payout initiated");

        Ok(PayoutHandle {
            transfer_code: data.transfer_code,
            status: data.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PaystackClient {
        let config = ProviderConfig {
            base_url: server.uri(),
            secret_key: "sk_test_abc".to_string(),
            callback_url: "https://app.test/success".to_string(),
            timeout_secs: 5,
        };
        PaystackClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_create_payment_link_sends_kobo_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transaction/initialize"))
            .and(header("Authorization", "Bearer sk_test_abc"))
            .and(body_partial_json(serde_json::json!({
                "email": "ada@test.com",
                "amount": 50_000,
                "reference": "ref-1",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": true,
                "message": "Authorization URL created",
                "data": {
                    "authorization_url": "https://checkout.paystack.com/abc123",
                    "access_code": "abc123",
                    "reference": "ref-1"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let link = client(&server)
            .create_payment_link(dec!(500), "ref-1", "ada@test.com")
            .await
            .unwrap();
        assert_eq!(link.reference, "ref-1");
        assert!(link.authorization_url.contains("checkout.paystack.com"));
    }

    #[tokio::test]
    async fn test_resolve_bank_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bank/resolve"))
            .and(query_param("account_number", "0123456789"))
            .and(query_param("bank_code", "058"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": true,
                "message": "Account number resolved",
                "data": {
                    "account_name": "ADA LOVELACE",
                    "account_number": "0123456789"
                }
            })))
            .mount(&server)
            .await;

        let resolved = client(&server)
            .resolve_bank_account("0123456789", "058")
            .await
            .unwrap();
        assert_eq!(resolved.account_name, "ADA LOVELACE");
    }

    #[tokio::test]
    async fn test_resolve_rejection_is_invalid_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bank/resolve"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "status": false,
                "message": "Could not resolve account name"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .resolve_bank_account("0000000000", "058")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAccount(_)));
    }

    #[tokio::test]
    async fn test_create_payout_recipient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transferrecipient"))
            .and(body_partial_json(serde_json::json!({
                "type": "nuban",
                "currency": "NGN",
                "bank_code": "058",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "status": true,
                "message": "Transfer recipient created successfully",
                "data": { "recipient_code": "RCP_1x2y3z" }
            })))
            .mount(&server)
            .await;

        let code = client(&server)
            .create_payout_recipient("0123456789", "058", "ADA LOVELACE")
            .await
            .unwrap();
        assert_eq!(code, "RCP_1x2y3z");
    }

    #[tokio::test]
    async fn test_initiate_payout_converts_to_kobo() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transfer"))
            .and(body_partial_json(serde_json::json!({
                "source": "balance",
                "amount": 100_000,
                "recipient": "RCP_1x2y3z",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": true,
                "message": "Transfer has been queued",
                "data": { "transfer_code": "TRF_abc", "status": "pending" }
            })))
            .mount(&server)
            .await;

        let handle = client(&server)
            .initiate_payout(dec!(1000), "RCP_1x2y3z", "Wallet withdrawal")
            .await
            .unwrap();
        assert_eq!(handle.transfer_code, "TRF_abc");
        assert_eq!(handle.status, "pending");
    }

    #[tokio::test]
    async fn test_server_error_surfaces_as_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transfer"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server)
            .initiate_payout(dec!(1000), "RCP_dead", "Wallet withdrawal")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[tokio::test]
    async fn test_provider_false_status_with_http_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/transaction/initialize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": false,
                "message": "Invalid key"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_payment_link(dec!(500), "ref-x", "ada@test.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }

    #[test]
    fn test_kobo_conversion_rounds_exactly() {
        assert_eq!(PaystackClient::to_kobo(dec!(500)).unwrap(), 50_000);
        assert_eq!(PaystackClient::to_kobo(dec!(450.25)).unwrap(), 45_025);
        assert_eq!(PaystackClient::to_kobo(dec!(0.01)).unwrap(), 1);
    }
}
