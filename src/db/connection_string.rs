//! Parsing of `mysql://[user[:password]@]host[:port][/database]` connection URLs.

use percent_encoding::percent_decode_str;
use url::Url;

/// The only scheme the gateway connects to.
pub const MYSQL_SCHEME: &str = "mysql";

/// Port used when the URL does not carry one.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionStringError {
    #[error("Invalid protocol. Expected {MYSQL_SCHEME}://, got: {0}")]
    InvalidProtocol(String),

    #[error("Invalid connection URL: {0}")]
    InvalidConnectionString(String),
}

/// Structured form of a connection URL. Rebuilt from the stored URL on each use.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl std::fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionDescriptor {
    /// `host:port`, for log lines and error messages.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a connection URL into a [`ConnectionDescriptor`].
pub fn parse_connection_url(raw: &str) -> Result<ConnectionDescriptor, ConnectionStringError> {
    let trimmed = raw.trim();
    let prefix = format!("{MYSQL_SCHEME}://");
    let has_prefix = trimmed
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(&prefix));
    if !has_prefix {
        let scheme = trimmed.split("://").next().filter(|_| trimmed.contains("://"));
        return Err(ConnectionStringError::InvalidProtocol(
            scheme.unwrap_or("<none>").to_string(),
        ));
    }

    let url = Url::parse(trimmed)
        .map_err(|e| ConnectionStringError::InvalidConnectionString(e.to_string()))?;

    let host = url
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
        .unwrap_or_default();
    if host.is_empty() {
        return Err(ConnectionStringError::InvalidConnectionString(
            "Host is required".to_string(),
        ));
    }

    let user = match url.username() {
        "" => None,
        encoded => Some(decode(encoded)?),
    };
    let password = url.password().map(decode).transpose()?;

    let path = url.path().trim_start_matches('/');
    let database = if path.is_empty() {
        None
    } else {
        Some(decode(path)?)
    };

    Ok(ConnectionDescriptor {
        host: host.to_string(),
        port: url.port().unwrap_or(DEFAULT_MYSQL_PORT),
        user,
        password,
        database,
    })
}

fn decode(segment: &str) -> Result<String, ConnectionStringError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| ConnectionStringError::InvalidConnectionString(e.to_string()))
}

/// Replace the password of a connection URL so it can be logged.
pub fn mask_password(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some("****")).is_ok() {
                url.to_string()
            } else {
                "<unprintable url>".to_string()
            }
        }
        Ok(url) => url.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}
