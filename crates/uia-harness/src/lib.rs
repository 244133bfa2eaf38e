//! UI automation harness for testing a spreadsheet add-in.
//!
//! The harness drives the host application through a bridge process that
//! owns the UI Automation client. Every lookup and state check is a bounded
//! wait on [`uia_sync::Synchronizer`], so tests describe what they expect and
//! the harness waits for it.
//!
//! # Architecture
//!
//! ```text
//! Test code
//!     ├── Harness / RibbonController / Dialog / Worksheets (this crate)
//!     │     └── uia-sync (polling, stability, aggregate matching)
//!     └── UiaBridge: UiTree + WorkbookAccess + AddinControl + HostApplication
//!           └── spawns: wine uia-bridge.exe
//!                 └── UI Automation + COM: the host application
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use uia_harness::{Dialog, Harness, HarnessConfig, HostFixture, RibbonController, UiaBridge};
//! use uia_harness::tree::HostApplication;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarnessConfig::from_json_file("harness.json")?;
//!     let bridge = UiaBridge::start(&config.bridge)?;
//!     let host = HostFixture::new(&bridge, config.timeouts.clone());
//!     let root = host.app_root()?;
//!
//!     let harness = Harness::new(&bridge, config.timeouts.clone());
//!     let ribbon = RibbonController::locate(&harness, root, config.ribbon.clone())?;
//!     ribbon.invoke_button("Login")?;
//!
//!     let mut login = Dialog::find_by_id(&harness, root, "LoginDialog", config.timeouts.web_service_populate)?;
//!     login.set_text("EmailTextBox", "user@example.test")?;
//!     login.set_secret("PasswordTextBox", "secret")?;
//!     login.submit_expect_close("OKButton", config.timeouts.authentication)?;
//!     Ok(())
//! }
//! ```

mod bridge;
pub mod config;
mod dialog;
pub mod error;
mod fixture;
mod harness;
mod ribbon;
pub mod tree;
mod workbook;

pub use bridge::UiaBridge;
pub use config::{BridgeConfig, HarnessConfig, RibbonLayout, Timeouts};
pub use dialog::{ActiveError, Dialog, ErrorBanners};
pub use error::{BridgeError, HarnessError, Result};
pub use fixture::{HostFixture, Shutdown};
pub use harness::Harness;
pub use ribbon::{ButtonExpectation, ButtonState, RibbonController, BUTTON_TYPES};
pub use workbook::Worksheets;
