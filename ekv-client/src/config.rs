//! Connection settings for the backing store.

use std::fmt;
use std::str::FromStr;

use percent_encoding::percent_decode_str;
use url::Url;

use ekv_common::{EkvError, EkvResult};

/// Default backing store address.
pub const DEFAULT_URL: &str = "redis://127.0.0.1:6379";

/// Default RESP port.
pub const DEFAULT_PORT: u16 = 6379;

/// Where and how to reach the backing store.
///
/// Parsed from `redis://[[user]:password@]host[:port][/db]`.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            db: 0,
        }
    }
}

impl ClientConfig {
    /// Parses a `redis://` URL.
    pub fn from_url(raw: &str) -> EkvResult<Self> {
        let url = Url::parse(raw).map_err(|err| EkvError::invalid(format!("invalid store url {raw:?}: {err}")))?;
        if url.scheme() != "redis" {
            return Err(EkvError::invalid(format!(
                "unsupported store url scheme {:?}, expected \"redis\"",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| EkvError::invalid(format!("store url {raw:?} has no host")))?
            .to_string();

        let username = Some(url.username())
            .filter(|user| !user.is_empty())
            .map(|user| decode_credential(user, "username"))
            .transpose()?;
        let password = url
            .password()
            .map(|password| decode_credential(password, "password"))
            .transpose()?;

        let db = match url.path().trim_start_matches('/') {
            "" => 0,
            path => path
                .parse::<u32>()
                .map_err(|_| EkvError::invalid(format!("store url database {path:?} is not a number")))?,
        };

        Ok(ClientConfig {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            username,
            password,
            db,
        })
    }

    /// `host:port` for socket connects and logs.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// URL userinfo is percent-encoded; the store expects the raw text.
fn decode_credential(raw: &str, field: &str) -> EkvResult<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| EkvError::invalid(format!("store url {field} is not valid UTF-8 once decoded")))
}

impl FromStr for ClientConfig {
    type Err = EkvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_url(s)
    }
}

// Keeps the password out of logs.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .finish()
    }
}
