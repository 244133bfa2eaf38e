//! Per-test ownership of the host application.

use tracing::{debug, info, warn};
use uia_sync::Synchronizer;

use crate::config::Timeouts;
use crate::error::Result;
use crate::tree::{ElementRef, HostApplication};

/// How the host went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Exited within the grace period after being asked to quit.
    Quit,
    /// Had to be killed.
    Killed,
    /// Was already gone when asked to quit.
    AlreadyExited,
}

/// Scoped handle on a running host.
///
/// Closing (explicitly or on drop) asks the host to quit, gives it the quit
/// grace period to exit, and kills it otherwise.
pub struct HostFixture<H: HostApplication> {
    host: H,
    sync: Synchronizer,
    timeouts: Timeouts,
    closed: Option<Shutdown>,
}

impl<H: HostApplication> HostFixture<H> {
    pub fn new(host: H, timeouts: Timeouts) -> Self {
        Self::with_synchronizer(host, timeouts, Synchronizer::new())
    }

    pub fn with_synchronizer(host: H, timeouts: Timeouts, sync: Synchronizer) -> Self {
        Self {
            host,
            sync,
            timeouts,
            closed: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn app_root(&self) -> Result<ElementRef> {
        Ok(self.host.app_root()?)
    }

    /// True for host versions that put the add-in tab in the 2010+ ribbon.
    pub fn is_version_2010_or_above(&self) -> Result<bool> {
        let version = self.host.version()?;
        let major = version
            .split('.')
            .next()
            .and_then(|m| m.trim().parse::<u32>().ok())
            .unwrap_or(0);
        Ok(major >= 14)
    }

    /// Shut the host down. Repeated calls return the first outcome.
    pub fn close(&mut self) -> Result<Shutdown> {
        if let Some(outcome) = self.closed {
            return Ok(outcome);
        }
        let outcome = self.shut_down()?;
        self.closed = Some(outcome);
        Ok(outcome)
    }

    fn shut_down(&self) -> Result<Shutdown> {
        if let Err(e) = self.host.quit() {
            warn!(error = %e, "host quit request failed");
            if self.host.has_exited().unwrap_or(false) {
                return Ok(Shutdown::AlreadyExited);
            }
            self.host.kill()?;
            return Ok(Shutdown::Killed);
        }

        let policy = self.timeouts.policy(self.timeouts.quit_grace);
        match self
            .sync
            .wait_until("host to exit", &policy, || self.host.has_exited())
        {
            Ok(()) => {
                info!("host exited");
                Ok(Shutdown::Quit)
            }
            Err(e) => {
                warn!(error = %e, "host still running, killing");
                self.host.kill()?;
                Ok(Shutdown::Killed)
            }
        }
    }
}

impl<H: HostApplication> Drop for HostFixture<H> {
    fn drop(&mut self) {
        if self.closed.is_none() {
            match self.close() {
                Ok(outcome) => debug!(?outcome, "host fixture dropped"),
                Err(e) => warn!(error = %e, "failed to shut down host"),
            }
        }
    }
}
