//! Generic driver for the add-in's dialogs.
//!
//! A dialog is located by automation id (or as "the" modal window), its
//! controls by automation id below it. Values typed into the dialog are kept
//! so failures can report what was submitted.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tracing::debug;
use uia_sync::{QueryResult, WaitError};

use crate::error::Result;
use crate::harness::Harness;
use crate::tree::{ElementRef, Key, TreeScope};

/// Ordered error banners a dialog can show. The first visible one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBanners {
    banners: Vec<(String, String)>,
}

impl ErrorBanners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a banner: `category` names it, `automation_id` finds it.
    pub fn banner(mut self, category: impl Into<String>, automation_id: impl Into<String>) -> Self {
        self.banners.push((category.into(), automation_id.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.banners.is_empty()
    }
}

/// The error a dialog is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveError {
    pub category: String,
    pub text: String,
}

impl fmt::Display for ActiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: '{}'", self.category, self.text)
    }
}

fn category(error: &Option<ActiveError>) -> Option<&str> {
    error.as_ref().map(|e| e.category.as_str())
}

pub struct Dialog<'h, 'a> {
    harness: &'h Harness<'a>,
    parent: ElementRef,
    element: ElementRef,
    /// `None` for dialogs found as the modal window.
    dialog_id: Option<String>,
    banners: ErrorBanners,
    inputs: BTreeMap<String, String>,
}

impl<'h, 'a> Dialog<'h, 'a> {
    pub fn find_by_id(
        harness: &'h Harness<'a>,
        parent: ElementRef,
        dialog_id: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let element = harness.find_by_id(parent, dialog_id, TreeScope::Children, timeout)?;
        Ok(Self::new(harness, parent, element, Some(dialog_id.to_string())))
    }

    pub fn find_modal(harness: &'h Harness<'a>, parent: ElementRef, timeout: Duration) -> Result<Self> {
        let element = harness.find_modal_dialog(parent, timeout)?;
        Ok(Self::new(harness, parent, element, None))
    }

    fn new(harness: &'h Harness<'a>, parent: ElementRef, element: ElementRef, dialog_id: Option<String>) -> Self {
        Self {
            harness,
            parent,
            element,
            dialog_id,
            banners: ErrorBanners::default(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn with_error_banners(mut self, banners: ErrorBanners) -> Self {
        self.banners = banners;
        self
    }

    pub fn element(&self) -> ElementRef {
        self.element
    }

    fn name(&self) -> String {
        match &self.dialog_id {
            Some(id) => id.clone(),
            None => format!("modal {}", self.element),
        }
    }

    /// A control of this dialog, allowing it a moment to render.
    pub fn control(&self, automation_id: &str) -> Result<ElementRef> {
        self.harness.find_by_id(
            self.element,
            automation_id,
            TreeScope::Descendants,
            self.harness.timeouts().dialog_init,
        )
    }

    pub fn set_text(&mut self, automation_id: &str, text: &str) -> Result<()> {
        self.record(automation_id, text);
        let control = self.control(automation_id)?;
        self.harness.insert_text(control, text)
    }

    /// Like [`set_text`](Self::set_text), without recording the value.
    pub fn set_secret(&mut self, automation_id: &str, text: &str) -> Result<()> {
        self.record(automation_id, "***");
        let control = self.control(automation_id)?;
        self.harness.insert_text(control, text)
    }

    pub fn text(&self, automation_id: &str) -> Result<String> {
        self.harness.get_text(self.control(automation_id)?)
    }

    pub fn set_checkbox(&mut self, automation_id: &str, checked: bool) -> Result<()> {
        self.record(automation_id, &checked.to_string());
        let control = self.control(automation_id)?;
        self.harness.set_checkbox(control, checked)
    }

    pub fn checkbox(&self, automation_id: &str) -> Result<bool> {
        self.harness.checkbox_value(self.control(automation_id)?)
    }

    fn record(&mut self, key: &str, value: &str) {
        self.inputs.insert(key.to_string(), value.to_string());
    }

    /// Value last entered for `key`, or `""` if none was.
    pub fn input(&self, key: &str) -> &str {
        self.inputs.get(key).map(String::as_str).unwrap_or("")
    }

    fn describe_inputs(&self) -> String {
        self.inputs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_open(&self) -> Result<bool> {
        let tree = self.harness.tree();
        Ok(match &self.dialog_id {
            Some(id) => tree.find_by_id(self.parent, id, TreeScope::Children)?.is_some(),
            None => tree.state(self.element)?.is_some(),
        })
    }

    /// First visible error banner, if any.
    pub fn current_error(&self) -> Result<Option<ActiveError>> {
        let tree = self.harness.tree();
        for (category, id) in &self.banners.banners {
            let Some(banner) = tree.find_by_id(self.element, id, TreeScope::Descendants)? else {
                continue;
            };
            if let Some(state) = tree.state(banner)? {
                if !state.is_offscreen {
                    return Ok(Some(ActiveError {
                        category: category.clone(),
                        text: state.name,
                    }));
                }
            }
        }
        Ok(None)
    }

    fn press(&self, button_id: &str) -> Result<()> {
        let button = self.control(button_id)?;
        self.harness
            .wait_for_enabled(button, self.harness.timeouts().control_state_update)?;
        self.harness.press_button(button)
    }

    /// Press `button_id` and wait for the dialog to close.
    ///
    /// Fails as soon as an error banner appears that was not showing before
    /// the press.
    pub fn submit_expect_close(&self, button_id: &str, timeout: Duration) -> Result<()> {
        let prior = self.current_error()?;
        self.press(button_id)?;

        let what = format!("dialog '{}' to close", self.name());
        self.harness
            .sync()
            .wait_for(&what, &self.harness.policy(timeout), || {
                match self.is_open() {
                    Ok(false) => return QueryResult::Satisfied(()),
                    Ok(true) => {}
                    Err(e) => return QueryResult::failed(e),
                }
                match self.current_error() {
                    Ok(Some(err)) if Some(err.category.as_str()) != category(&prior) => {
                        QueryResult::failed(format!("error {err} (inputs: {})", self.describe_inputs()))
                    }
                    Ok(Some(err)) => QueryResult::pending(format!("still open, showing {err}")),
                    Ok(None) => QueryResult::pending("still open"),
                    Err(e) => QueryResult::failed(e),
                }
            })?;
        debug!(dialog = %self.name(), "closed after submit");
        Ok(())
    }

    /// Press `button_id` and expect the dialog to stay open showing the
    /// `expected` error category.
    ///
    /// The dialog closing is a failure. The first change of error category
    /// decides the outcome. If nothing changes before the deadline, the
    /// category showing at that point decides.
    pub fn submit_expect_error(&self, button_id: &str, expected: &str, timeout: Duration) -> Result<()> {
        let prior = self.current_error()?;
        self.press(button_id)?;

        let what = format!("dialog '{}' to show {expected} error", self.name());
        let outcome = self
            .harness
            .sync()
            .wait_for(&what, &self.harness.policy(timeout), || {
                match self.is_open() {
                    Ok(false) => {
                        return QueryResult::failed(format!(
                            "dialog closed when it was expected to fail (inputs: {})",
                            self.describe_inputs()
                        ))
                    }
                    Ok(true) => {}
                    Err(e) => return QueryResult::failed(e),
                }
                match self.current_error() {
                    Ok(current) if category(&current) == category(&prior) => {
                        QueryResult::pending("error unchanged")
                    }
                    Ok(Some(err)) if err.category == expected => QueryResult::Satisfied(()),
                    Ok(Some(err)) => QueryResult::failed(format!("expected {expected} error but got {err}")),
                    Ok(None) => QueryResult::failed(format!("expected {expected} error but the error cleared")),
                    Err(e) => QueryResult::failed(e),
                }
            });

        match outcome {
            Ok(()) => Ok(()),
            Err(e @ WaitError::TimedOut { .. }) => {
                if category(&self.current_error()?) == Some(expected) {
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Press a closing button (Cancel, Close) and wait for the dialog to go.
    pub fn dismiss(&self, button_id: &str) -> Result<()> {
        let button = self.control(button_id)?;
        self.harness.press_button(button)?;
        self.wait_closed(self.harness.timeouts().dialog_cancel)
    }

    pub fn dismiss_with_key(&self, key: Key) -> Result<()> {
        self.harness.tree().press_key(key)?;
        self.wait_closed(self.harness.timeouts().dialog_cancel)
    }

    pub fn wait_closed(&self, timeout: Duration) -> Result<()> {
        let what = format!("dialog '{}' to close", self.name());
        Ok(self
            .harness
            .sync()
            .wait_for(&what, &self.harness.policy(timeout), || match self.is_open() {
                Ok(false) => QueryResult::Satisfied(()),
                Ok(true) => QueryResult::pending("still open"),
                Err(e) => QueryResult::failed(e),
            })?)
    }
}
