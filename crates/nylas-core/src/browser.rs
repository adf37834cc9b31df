//! System browser launching

use tracing::debug;

use crate::error::Result;

/// Capability to open a URL in the user's browser, so the login flow
/// never branches on the platform.
pub trait Browser: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Opens the system default browser, detached from the CLI's process
/// group: killing the CLI (Ctrl+C) must not take the browser with it.
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        debug!(url, "Opening system browser");
        open::that_detached(url)?;
        Ok(())
    }
}
