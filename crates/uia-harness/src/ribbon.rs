//! The add-in's ribbon tab and the state of its buttons.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uia_sync::{QueryResult, StateExpectation};

use crate::config::RibbonLayout;
use crate::error::Result;
use crate::harness::Harness;
use crate::tree::{ControlType, ElementRef, ElementState, TreeScope};

/// Ribbon buttons are exposed as either of these, depending on host version.
pub const BUTTON_TYPES: [ControlType; 2] = [ControlType::Button, ControlType::Custom];

/// Observable state of a ribbon button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ButtonState {
    NonVisible,
    Enabled,
    EnabledNotVisible,
    VisibleNotEnabled,
}

impl ButtonState {
    /// Classify a button from its element state. `None` means not in the tree.
    ///
    /// A disabled offscreen button is indistinguishable from a hidden one, so
    /// both classify as [`ButtonState::NonVisible`].
    pub fn classify(state: Option<&ElementState>) -> Self {
        match state {
            None => ButtonState::NonVisible,
            Some(s) if s.is_enabled && s.is_offscreen => ButtonState::EnabledNotVisible,
            Some(s) if s.is_enabled => ButtonState::Enabled,
            Some(s) if s.is_offscreen => ButtonState::NonVisible,
            Some(_) => ButtonState::VisibleNotEnabled,
        }
    }
}

impl fmt::Display for ButtonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Expected state per button name.
pub type ButtonExpectation = StateExpectation<String, ButtonState>;

/// Handle on the add-in's ribbon tab panel.
pub struct RibbonController<'h, 'a> {
    harness: &'h Harness<'a>,
    app_root: ElementRef,
    layout: RibbonLayout,
    panel: ElementRef,
}

impl<'h, 'a> RibbonController<'h, 'a> {
    /// Find the add-in tab, select it, and find its panel in the lower ribbon.
    pub fn locate(harness: &'h Harness<'a>, app_root: ElementRef, layout: RibbonLayout) -> Result<Self> {
        let panel = Self::find_panel(harness, app_root, &layout)?;
        Ok(Self {
            harness,
            app_root,
            layout,
            panel,
        })
    }

    fn find_panel(harness: &Harness<'_>, app_root: ElementRef, layout: &RibbonLayout) -> Result<ElementRef> {
        let t = harness.timeouts();
        let tabs = harness.find_by_name(
            app_root,
            &layout.tabs_container,
            TreeScope::Descendants,
            t.ribbon_buttons_activated,
        )?;
        let tab = harness.find_by_name(tabs, &layout.tab_name, TreeScope::Descendants, t.control_state_update)?;
        harness.tree().select(tab)?;

        let lower = harness.find_by_name(
            app_root,
            &layout.lower_ribbon,
            TreeScope::Descendants,
            t.ribbon_buttons_activated,
        )?;
        harness.find_by_name(lower, &layout.tab_name, TreeScope::Descendants, t.ribbon_buttons_activated)
    }

    /// Locate the panel again, for when the host has rebuilt its ribbon.
    pub fn relocate(&mut self) -> Result<()> {
        self.panel = Self::find_panel(self.harness, self.app_root, &self.layout)?;
        Ok(())
    }

    pub fn panel(&self) -> ElementRef {
        self.panel
    }

    /// Single, non-waiting read of a button's state.
    pub fn button_state(&self, name: &str) -> Result<ButtonState> {
        let tree = self.harness.tree();
        let state = match tree.find_by_name(self.panel, name, &BUTTON_TYPES, TreeScope::Descendants)? {
            Some(button) => tree.state(button)?,
            None => None,
        };
        Ok(ButtonState::classify(state.as_ref()))
    }

    pub fn wait_for_button_state(&self, name: &str, expected: ButtonState) -> Result<()> {
        self.wait_for_button_state_within(name, expected, self.harness.timeouts().ribbon_buttons_activated)
    }

    pub fn wait_for_button_state_within(
        &self,
        name: &str,
        expected: ButtonState,
        timeout: Duration,
    ) -> Result<()> {
        let what = format!("button '{name}' to be {expected}");
        let policy = self.harness.policy(timeout);
        Ok(self.harness.sync().wait_for(&what, &policy, || match self.button_state(name) {
            Ok(state) if state == expected => QueryResult::Satisfied(()),
            Ok(state) => QueryResult::pending(state),
            Err(e) => QueryResult::failed(e),
        })?)
    }

    /// Wait until every button in `expected` is in its expected state at
    /// once. On timeout the error lists every button still mismatched.
    pub fn validate_states(&self, expected: &ButtonExpectation) -> Result<()> {
        let policy = self.harness.policy(self.harness.timeouts().control_state_update);
        self.harness
            .sync()
            .wait_for_aggregate_match("ribbon button states", expected, &policy, |name: &String| {
                self.button_state(name)
            })?;
        Ok(())
    }

    /// Invoke a button through its invoke pattern once it is enabled.
    pub fn invoke_button(&self, name: &str) -> Result<()> {
        let t = self.harness.timeouts();
        let button = self.harness.find_by_control_type_and_name(
            self.panel,
            &BUTTON_TYPES,
            name,
            TreeScope::Descendants,
            t.find_ribbon_buttons,
        )?;
        self.harness.wait_for_enabled(button, t.ribbon_buttons_activated)?;
        self.harness.press_button(button)
    }

    /// Click a button with the mouse.
    ///
    /// Needed where invoking would block on a modal dialog. The pointer rests
    /// long enough for the tooltip to settle before clicking.
    pub fn click_button(&self, name: &str) -> Result<()> {
        let t = self.harness.timeouts();
        self.harness.find_by_name_and_click(
            self.panel,
            name,
            &BUTTON_TYPES,
            TreeScope::Descendants,
            t.find_ribbon_buttons,
            t.ribbon_tooltip_click_delay,
        )
    }

    /// Wait for `ready_button` to show as enabled.
    ///
    /// If it does not, run `refresh` once (typically open and close a dialog
    /// so the host repaints the ribbon) and wait again.
    pub fn wait_until_ready<F>(&self, ready_button: &str, refresh: F) -> Result<()>
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        match self.wait_for_button_state(ready_button, ButtonState::Enabled) {
            Ok(()) => {
                info!(button = ready_button, "ribbon ready");
                Ok(())
            }
            Err(e) if e.is_timeout() => {
                warn!(button = ready_button, error = %e, "ribbon not ready, forcing refresh");
                refresh(self)?;
                self.wait_for_button_state(ready_button, ButtonState::Enabled)
            }
            Err(e) => Err(e),
        }
    }
}
