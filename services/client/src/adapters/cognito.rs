//! services/client/src/adapters/cognito.rs
//!
//! Identity provider adapter for an AWS Cognito user pool app client without a
//! secret. Talks to the public JSON API directly with `reqwest` and keeps the
//! current session in memory, refreshing it on demand the way a provider SDK does.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use study_items_core::claims::check_token_validity;
use study_items_core::domain::{CodeDelivery, SignUpOutcome, SignUpRequest, TokenSet};
use study_items_core::ports::{AuthError, AuthResult, IdentityProvider};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

pub struct CognitoAdapter {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
    current: RwLock<Option<TokenSet>>,
}

impl CognitoAdapter {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            current: RwLock::new(None),
        }
    }

    /// Invokes one Cognito operation and decodes its JSON answer.
    async fn call<R: DeserializeOwned>(&self, operation: &str, body: serde_json::Value) -> AuthResult<R> {
        debug!("Cognito {}", operation);
        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .header(CONTENT_TYPE, AMZ_JSON)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        if !status.is_success() {
            let error = serde_json::from_str::<CognitoErrorRecord>(&text).unwrap_or_default();
            let mapped = error.to_domain(status.is_server_error());
            warn!("Cognito {} failed ({}): {}", operation, status.as_u16(), mapped);
            return Err(mapped);
        }

        serde_json::from_str(&text)
            .map_err(|e| AuthError::ProviderUnavailable(format!("malformed {} response: {}", operation, e)))
    }

    async fn initiate_auth(&self, flow: &str, parameters: serde_json::Value) -> AuthResult<AuthenticationResult> {
        let response: InitiateAuthResponse = self
            .call(
                "InitiateAuth",
                serde_json::json!({
                    "AuthFlow": flow,
                    "ClientId": self.client_id,
                    "AuthParameters": parameters,
                }),
            )
            .await?;

        match (response.authentication_result, response.challenge_name) {
            (Some(result), _) => Ok(result),
            (None, Some(challenge)) => Err(AuthError::Rejected(format!(
                "additional sign-in step required: {}",
                challenge
            ))),
            (None, None) => Err(AuthError::ProviderUnavailable(
                "InitiateAuth returned no tokens".to_string(),
            )),
        }
    }

    async fn remember(&self, tokens: &TokenSet) {
        *self.current.write().await = Some(tokens.clone());
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
    access_token: String,
    refresh_token: Option<String>,
}
impl AuthenticationResult {
    /// Refresh responses omit the refresh token; the previous one stays valid.
    fn to_domain(self, previous_refresh_token: Option<&str>) -> TokenSet {
        TokenSet {
            id_token: self.id_token,
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh_token.map(str::to_string))
                .unwrap_or_default(),
            issued_at: Utc::now(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    user_confirmed: bool,
    user_sub: String,
    code_delivery_details: Option<CodeDeliveryRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResendCodeResponse {
    code_delivery_details: Option<CodeDeliveryRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CodeDeliveryRecord {
    destination: Option<String>,
    delivery_medium: Option<String>,
}
impl CodeDeliveryRecord {
    fn to_domain(self) -> CodeDelivery {
        CodeDelivery {
            destination: self.destination,
            medium: self.delivery_medium,
        }
    }
}

/// Operations that answer with an empty JSON object.
#[derive(Deserialize)]
struct Empty {}

#[derive(Deserialize, Default)]
struct CognitoErrorRecord {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}
impl CognitoErrorRecord {
    fn to_domain(self, server_error: bool) -> AuthError {
        // `__type` is sometimes namespaced, e.g. "...#NotAuthorizedException".
        let kind = self
            .kind
            .as_deref()
            .map(|k| k.rsplit('#').next().unwrap_or(k))
            .unwrap_or_default();
        let message = self.message.unwrap_or_else(|| kind.to_string());
        match kind {
            "NotAuthorizedException" | "UserNotFoundException" => AuthError::InvalidCredentials,
            "UserNotConfirmedException" => AuthError::NotConfirmed,
            "TooManyRequestsException" | "InternalErrorException" => AuthError::ProviderUnavailable(message),
            _ if server_error => AuthError::ProviderUnavailable(message),
            _ => AuthError::Rejected(message),
        }
    }
}

//=========================================================================================
// `IdentityProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityProvider for CognitoAdapter {
    async fn current_session(&self) -> AuthResult<Option<TokenSet>> {
        let cached = self.current.read().await.clone();
        let Some(tokens) = cached else {
            return Ok(None);
        };
        if check_token_validity(&tokens.id_token, Utc::now()).is_ok() {
            return Ok(Some(tokens));
        }
        if tokens.refresh_token.is_empty() {
            return Ok(None);
        }
        debug!("Cached session is expiring; refreshing.");
        self.refresh(&tokens.refresh_token).await.map(Some)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<TokenSet> {
        let result = self
            .initiate_auth(
                "USER_PASSWORD_AUTH",
                serde_json::json!({ "USERNAME": email, "PASSWORD": password }),
            )
            .await?;
        let tokens = result.to_domain(None);
        self.remember(&tokens).await;
        info!("Cognito sign-in succeeded.");
        Ok(tokens)
    }

    async fn sign_out(&self, access_token: Option<&str>) -> AuthResult<()> {
        *self.current.write().await = None;
        match access_token {
            Some(token) => {
                let _: Empty = self
                    .call("GlobalSignOut", serde_json::json!({ "AccessToken": token }))
                    .await?;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenSet> {
        let result = self
            .initiate_auth(
                "REFRESH_TOKEN_AUTH",
                serde_json::json!({ "REFRESH_TOKEN": refresh_token }),
            )
            .await?;
        let tokens = result.to_domain(Some(refresh_token));
        self.remember(&tokens).await;
        Ok(tokens)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> AuthResult<SignUpOutcome> {
        let response: SignUpResponse = self
            .call(
                "SignUp",
                serde_json::json!({
                    "ClientId": self.client_id,
                    "Username": request.email,
                    "Password": request.password,
                    "UserAttributes": [
                        { "Name": "email", "Value": request.email },
                        { "Name": "name", "Value": request.name },
                    ],
                }),
            )
            .await?;
        Ok(SignUpOutcome {
            user_sub: response.user_sub,
            needs_confirmation: !response.user_confirmed,
            delivery: response.code_delivery_details.map(CodeDeliveryRecord::to_domain),
        })
    }

    async fn confirm_sign_up(&self, email: &str, code: &str) -> AuthResult<()> {
        let _: Empty = self
            .call(
                "ConfirmSignUp",
                serde_json::json!({
                    "ClientId": self.client_id,
                    "Username": email,
                    "ConfirmationCode": code,
                }),
            )
            .await?;
        Ok(())
    }

    async fn resend_confirmation_code(&self, email: &str) -> AuthResult<CodeDelivery> {
        let response: ResendCodeResponse = self
            .call(
                "ResendConfirmationCode",
                serde_json::json!({ "ClientId": self.client_id, "Username": email }),
            )
            .await?;
        Ok(response
            .code_delivery_details
            .map(CodeDeliveryRecord::to_domain)
            .unwrap_or(CodeDelivery {
                destination: None,
                medium: None,
            }))
    }
}
