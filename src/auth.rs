//! REST authentication against the vendor cloud.
//!
//! Produces the [`UserCredentials`] the protocol session logs in with. The
//! cloud requires two-factor confirmation for most accounts: a plain login
//! attempt triggers an emailed code, and the login is retried with
//! [`Auth::login_with_code`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CyncError, CyncResult};

pub const REST_API_BASE_URL: &str = "https://api.gelighting.com";

/// Vendor corporation id sent with every auth request.
const CORP_ID: &str = "1007d2ad150c4000";

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Tokens identifying a logged-in user.
///
/// `authorize_token` is what the TCP session's login frame carries;
/// `access_token` authenticates REST calls until `expires_at`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserCredentials {
    pub user_id: u32,
    pub authorize_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    corp_id: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct TwoFactorLoginRequest<'a> {
    corp_id: &'a str,
    email: &'a str,
    password: &'a str,
    two_factor: &'a str,
    resource: u32,
}

#[derive(Serialize)]
struct RequestCodeRequest<'a> {
    corp_id: &'a str,
    email: &'a str,
    local_lang: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    access_token: String,
    refresh_token: String,
    authorize: String,
    user_id: u32,
    expire_in: i64,
}

pub struct Auth {
    http: reqwest::Client,
    base_url: Url,
    email: String,
    password: String,
    credentials: Option<UserCredentials>,
}

impl Auth {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> CyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: Url::parse(REST_API_BASE_URL)?,
            email: email.into(),
            password: password.into(),
            credentials: None,
        })
    }

    /// Points the client at a different API host (test rigs).
    pub fn set_base_url(&mut self, base_url: Url) {
        self.base_url = base_url;
    }

    pub fn credentials(&self) -> CyncResult<&UserCredentials> {
        self.credentials.as_ref().ok_or(CyncError::MissingAuth)
    }

    /// Attempts a plain password login. Accounts with two-factor enabled get
    /// a code mailed to them and the call fails with
    /// [`CyncError::TwoFactorRequired`]; follow up with
    /// [`Auth::login_with_code`].
    pub async fn login(&mut self) -> CyncResult<&UserCredentials> {
        let request = LoginRequest {
            corp_id: CORP_ID,
            email: &self.email,
            password: &self.password,
        };
        match self.post_auth("/v2/user_auth", &request).await {
            Ok(response) => Ok(self.store(response)),
            Err(CyncError::BadRequest(_)) => {
                self.request_email_code().await?;
                Err(CyncError::TwoFactorRequired)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn login_with_code(&mut self, code: &str) -> CyncResult<&UserCredentials> {
        let request = TwoFactorLoginRequest {
            corp_id: CORP_ID,
            email: &self.email,
            password: &self.password,
            two_factor: code,
            resource: 1,
        };
        let response = self.post_auth("/v2/user_auth/two_factor", &request).await?;
        Ok(self.store(response))
    }

    /// Exchanges the refresh token for a fresh access token.
    pub async fn refresh(&mut self) -> CyncResult<&UserCredentials> {
        let refresh_token = self.credentials()?.refresh_token.clone();
        let request = RefreshRequest {
            refresh_token: &refresh_token,
        };
        let response = self.post_auth("/v2/user/token/refresh", &request).await?;
        Ok(self.store(response))
    }

    async fn request_email_code(&self) -> CyncResult<()> {
        let request = RequestCodeRequest {
            corp_id: CORP_ID,
            email: &self.email,
            local_lang: "en-us",
        };
        let url = self.base_url.join("/v2/two_factor/email/verifycode")?;
        let response = self.http.post(url).json(&request).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn post_auth<T: Serialize>(&self, endpoint: &str, body: &T) -> CyncResult<AuthResponse> {
        let url = self.base_url.join(endpoint)?;
        let response = self.http.post(url).json(body).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    fn store(&mut self, response: AuthResponse) -> &UserCredentials {
        let expires_at = Utc::now() + chrono::Duration::seconds(response.expire_in);
        self.credentials.insert(UserCredentials {
            user_id: response.user_id,
            authorize_token: response.authorize,
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        })
    }
}

/// Maps cloud HTTP failures onto the auth error kinds.
pub(crate) async fn check_status(response: reqwest::Response) -> CyncResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::BAD_REQUEST {
        return Err(CyncError::BadRequest(body));
    }
    Err(CyncError::AuthFailed(format!("{status}: {body}")))
}
