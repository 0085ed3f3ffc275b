// Gateway authentication
//
// Token auth needs nothing beyond the bearer header set at client
// construction. Session auth follows the web UI flow: GET / to seed
// cookies, POST /logincheck with form credentials, then every later
// request rides the cookie jar.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::client::GatewayClient;
use crate::error::Error;

/// Credentials for authenticating with the gateway.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// REST API administrator token, sent as `Authorization: Bearer`.
    ApiToken(SecretString),

    /// Interactive administrator login backed by a session cookie.
    Session {
        username: String,
        password: SecretString,
    },
}

impl Credentials {
    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session { .. })
    }
}

impl GatewayClient {
    /// Establish a session. A no-op for token credentials.
    ///
    /// `/logincheck` answers 200 either way; the body's leading `1`
    /// signals success and `0` a rejected login.
    pub async fn login(&self) -> Result<(), Error> {
        let Credentials::Session { username, password } = self.credentials() else {
            return Ok(());
        };

        let root = self.url("/")?;
        debug!("seeding session cookies from {}", root);
        self.http().get(root).send().await.map_err(Error::Transport)?;

        let url = self.url("/logincheck")?;
        debug!("logging in at {}", url);

        let form = [
            ("username", username.as_str()),
            ("secretkey", password.expose_secret()),
            ("ajax", "1"),
        ];
        let resp = self
            .http()
            .post(url)
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status})"),
            });
        }
        if !body.trim_start().starts_with('1') {
            return Err(Error::Authentication {
                message: "login rejected by gateway".into(),
            });
        }

        self.session_established();
        debug!("login successful");
        Ok(())
    }

    /// End the current session. A no-op for token credentials.
    pub async fn logout(&self) -> Result<(), Error> {
        if !self.credentials().is_session() {
            return Ok(());
        }

        let url = self.url("/logout")?;
        debug!("logging out at {}", url);

        let _resp = self
            .http()
            .post(url)
            .send()
            .await
            .map_err(Error::Transport)?;

        debug!("logout complete");
        Ok(())
    }
}
