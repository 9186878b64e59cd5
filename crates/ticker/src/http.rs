//! Shared HTTP client construction.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::Result;

pub const USER_AGENT: &str = concat!("twitch-ticker/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Install the process-wide rustls crypto provider exactly once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the client used for both the token and the Helix endpoints.
///
/// `request_timeout` bounds every request end to end; the connect phase is
/// additionally capped so an unreachable host fails fast.
pub fn build_client(request_timeout: Duration) -> Result<Client> {
    install_rustls_provider();

    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
        .pool_max_idle_per_host(2);

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    Ok(builder.build()?)
}

/// Join `path` onto `base`, treating `base` as a directory even without a trailing slash.
pub fn endpoint(base: &str, path: &str) -> Result<Url> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}
