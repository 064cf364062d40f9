use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::{
    error::{self, checked},
    model,
};

/// Identity Toolkit REST client: accounts, password sign-in and token
/// refresh.
#[derive(Clone)]
pub struct IdentityClient {
    http_client: Client,
    base_url: String,
    token_url: String,
    api_key: String,
}

impl IdentityClient {
    pub const DEFAULT_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
    pub const DEFAULT_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";

    // Required by createAuthUri, never visited
    const CONTINUE_URI: &str = "http://localhost";

    pub fn new(base_url: &str, token_url: &str, api_key: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            token_url: token_url.to_owned(),
            api_key: api_key.to_owned(),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> error::Result<model::AuthResponse> {
        self.post_action(
            "accounts:signUp",
            &model::PasswordRequest {
                email,
                password,
                return_secure_token: true,
            },
        )
        .await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> error::Result<model::AuthResponse> {
        self.post_action(
            "accounts:signInWithPassword",
            &model::PasswordRequest {
                email,
                password,
                return_secure_token: true,
            },
        )
        .await
    }

    pub async fn update_display_name(
        &self,
        id_token: &str,
        display_name: &str,
    ) -> error::Result<model::UpdateProfileResponse> {
        self.post_action(
            "accounts:update",
            &model::UpdateProfileRequest {
                id_token,
                display_name,
                return_secure_token: true,
            },
        )
        .await
    }

    pub async fn sign_in_methods(&self, email: &str) -> error::Result<model::CreateAuthUriResponse> {
        self.post_action(
            "accounts:createAuthUri",
            &model::CreateAuthUriRequest {
                identifier: email,
                continue_uri: Self::CONTINUE_URI,
            },
        )
        .await
    }

    pub async fn lookup(&self, id_token: &str) -> error::Result<Option<model::AccountInfo>> {
        let response: model::LookupResponse = self
            .post_action("accounts:lookup", &model::LookupRequest { id_token })
            .await?;
        Ok(response.users.into_iter().next())
    }

    pub async fn refresh(&self, refresh_token: &str) -> error::Result<model::RefreshResponse> {
        debug!("refreshing id token");
        let request = self
            .http_client
            .post(&self.token_url)
            .query(&[("key", self.api_key.as_str())])
            .form(&model::RefreshRequest {
                grant_type: "refresh_token",
                refresh_token,
            })
            .build()?;
        let response = checked(self.http_client.execute(request).await?).await?;
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    async fn post_action<R, S>(&self, action: &str, body: &R) -> error::Result<S>
    where
        R: Serialize,
        S: DeserializeOwned,
    {
        debug!(action, "identity request");
        let request = self
            .http_client
            .post(format!("{}/{action}", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .build()?;
        let response = checked(self.http_client.execute(request).await?).await?;
        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }
}
