//! Waiting lookups and guarded actions over a [`UiTree`].

use std::time::Duration;

use tracing::debug;
use uia_sync::{PollPolicy, QueryResult, Synchronizer, WaitError};

use crate::config::Timeouts;
use crate::error::{BridgeError, HarnessError, Result};
use crate::tree::{ControlType, ElementRef, ElementState, ToggleState, TreeScope, UiTree};

/// Every lookup and precondition check the drivers perform, expressed as a
/// bounded wait on a [`Synchronizer`].
pub struct Harness<'a> {
    tree: &'a dyn UiTree,
    sync: Synchronizer,
    timeouts: Timeouts,
}

/// Turn a single find into a poll answer.
fn found<T>(probe: std::result::Result<Option<T>, BridgeError>) -> QueryResult<T> {
    match probe {
        Ok(Some(value)) => QueryResult::Satisfied(value),
        Ok(None) => QueryResult::pending("not found"),
        Err(e) => QueryResult::failed(e),
    }
}

fn absent<T>(probe: std::result::Result<Option<T>, BridgeError>) -> QueryResult<()> {
    match probe {
        Ok(None) => QueryResult::Satisfied(()),
        Ok(Some(_)) => QueryResult::pending("still present"),
        Err(e) => QueryResult::failed(e),
    }
}

impl<'a> Harness<'a> {
    pub fn new(tree: &'a dyn UiTree, timeouts: Timeouts) -> Self {
        Self::with_synchronizer(tree, timeouts, Synchronizer::new())
    }

    pub fn with_synchronizer(tree: &'a dyn UiTree, timeouts: Timeouts, sync: Synchronizer) -> Self {
        Self {
            tree,
            sync,
            timeouts,
        }
    }

    pub fn tree(&self) -> &'a dyn UiTree {
        self.tree
    }

    pub fn sync(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn policy(&self, timeout: Duration) -> PollPolicy {
        self.timeouts.policy(timeout)
    }

    /// Current state of `element`, failing if it has left the tree.
    pub fn state(&self, element: ElementRef) -> Result<ElementState> {
        self.tree
            .state(element)?
            .ok_or_else(|| HarnessError::ElementGone(element.to_string()))
    }

    fn describe(&self, element: ElementRef) -> String {
        match self.tree.state(element) {
            Ok(Some(state)) if !state.id_or_name().is_empty() => state.id_or_name().to_string(),
            Ok(_) => element.to_string(),
            Err(e) => {
                debug!(%element, error = %e, "could not read element state to name it");
                element.to_string()
            }
        }
    }

    /// Name the subject of a failed wait by its id or name. The state is read
    /// only here, so successful waits cost no extra tree call.
    fn relabel(&self, element: ElementRef, err: WaitError, what: impl Fn(&str) -> String) -> WaitError {
        match err {
            WaitError::TimedOut {
                elapsed,
                last_observed,
                ..
            } => WaitError::TimedOut {
                what: what(&self.describe(element)),
                elapsed,
                last_observed,
            },
            WaitError::ConditionFailed {
                elapsed, reason, ..
            } => WaitError::ConditionFailed {
                what: what(&self.describe(element)),
                elapsed,
                reason,
            },
            other => other,
        }
    }

    // -- Lookups --

    pub fn find_by_id(
        &self,
        parent: ElementRef,
        automation_id: &str,
        scope: TreeScope,
        timeout: Duration,
    ) -> Result<ElementRef> {
        let what = format!("element with id '{automation_id}'");
        Ok(self.sync.wait_for(&what, &self.policy(timeout), || {
            found(self.tree.find_by_id(parent, automation_id, scope))
        })?)
    }

    pub fn find_by_name(
        &self,
        parent: ElementRef,
        name: &str,
        scope: TreeScope,
        timeout: Duration,
    ) -> Result<ElementRef> {
        self.find_by_control_type_and_name(parent, &[], name, scope, timeout)
    }

    pub fn find_by_control_type_and_name(
        &self,
        parent: ElementRef,
        control_types: &[ControlType],
        name: &str,
        scope: TreeScope,
        timeout: Duration,
    ) -> Result<ElementRef> {
        let what = format!("element named '{name}'");
        Ok(self.sync.wait_for(&what, &self.policy(timeout), || {
            found(self.tree.find_by_name(parent, name, control_types, scope))
        })?)
    }

    pub fn find_modal_dialog(&self, parent: ElementRef, timeout: Duration) -> Result<ElementRef> {
        Ok(self.sync.wait_for("modal dialog", &self.policy(timeout), || {
            found(self.tree.find_modal(parent, TreeScope::Children))
        })?)
    }

    pub fn wait_for_modal_gone(&self, parent: ElementRef, timeout: Duration) -> Result<()> {
        Ok(self
            .sync
            .wait_for("modal dialog to close", &self.policy(timeout), || {
                absent(self.tree.find_modal(parent, TreeScope::Children))
            })?)
    }

    pub fn wait_for_gone_by_id(
        &self,
        parent: ElementRef,
        automation_id: &str,
        timeout: Duration,
    ) -> Result<()> {
        let what = format!("'{automation_id}' to disappear");
        Ok(self.sync.wait_for(&what, &self.policy(timeout), || {
            absent(self.tree.find_by_id(parent, automation_id, TreeScope::Children))
        })?)
    }

    pub fn wait_for_gone_by_name(
        &self,
        parent: ElementRef,
        name: &str,
        timeout: Duration,
    ) -> Result<()> {
        let what = format!("'{name}' to disappear");
        Ok(self.sync.wait_for(&what, &self.policy(timeout), || {
            absent(self.tree.find_by_name(parent, name, &[], TreeScope::Children))
        })?)
    }

    // -- Element state --

    pub fn wait_for_enabled(&self, element: ElementRef, timeout: Duration) -> Result<()> {
        let what = |label: &str| format!("'{label}' to become enabled");
        self.sync
            .wait_for(&what(&element.to_string()), &self.policy(timeout), || {
                match self.tree.state(element) {
                    Ok(Some(state)) if state.is_enabled => QueryResult::Satisfied(()),
                    Ok(Some(_)) => QueryResult::pending("IsEnabled=false"),
                    Ok(None) => QueryResult::failed("element no longer exists"),
                    Err(e) => QueryResult::failed(e),
                }
            })
            .map_err(|e| self.relabel(element, e, what))?;
        Ok(())
    }

    pub fn wait_for_visible(&self, element: ElementRef, timeout: Duration) -> Result<()> {
        let what = |label: &str| format!("'{label}' to become visible");
        self.sync
            .wait_for(&what(&element.to_string()), &self.policy(timeout), || {
                match self.tree.state(element) {
                    Ok(Some(state)) if !state.is_offscreen => QueryResult::Satisfied(()),
                    Ok(Some(_)) => QueryResult::pending("IsOffscreen=true"),
                    Ok(None) => QueryResult::failed("element no longer exists"),
                    Err(e) => QueryResult::failed(e),
                }
            })
            .map_err(|e| self.relabel(element, e, what))?;
        Ok(())
    }

    /// Wait until the grid's row count is non-zero and has held steady for
    /// the configured stability window. Returns the settled count.
    pub fn wait_for_populated_grid(&self, grid: ElementRef, timeout: Duration) -> Result<u32> {
        let what = |label: &str| format!("grid '{label}' to populate");
        Ok(self
            .sync
            .wait_for_stable(&what(&grid.to_string()), &self.policy(timeout), || {
                self.tree.grid_row_count(grid)
            })
            .map_err(|e| self.relabel(grid, e, what))?)
    }

    /// Find an element by name and type, wait until it is enabled and on
    /// screen, then mouse-click it after `click_delay`.
    ///
    /// On timeout the error says whether the element was ever seen disabled,
    /// seen offscreen, or never found at all.
    pub fn find_by_name_and_click(
        &self,
        parent: ElementRef,
        name: &str,
        control_types: &[ControlType],
        scope: TreeScope,
        find_timeout: Duration,
        click_delay: Duration,
    ) -> Result<()> {
        let what = format!("'{name}' to become clickable");
        let mut seen_disabled = false;
        let mut seen_offscreen = false;

        let outcome = self.sync.wait_for(&what, &self.policy(find_timeout), || {
            let element = match self.tree.find_by_name(parent, name, control_types, scope) {
                Ok(Some(element)) => element,
                Ok(None) => return QueryResult::pending("not found"),
                Err(e) => return QueryResult::failed(e),
            };
            match self.tree.state(element) {
                Ok(Some(state)) if !state.is_enabled => {
                    seen_disabled = true;
                    QueryResult::pending("IsEnabled=false")
                }
                Ok(Some(state)) if state.is_offscreen => {
                    seen_offscreen = true;
                    QueryResult::pending("IsOffscreen=true")
                }
                Ok(Some(_)) => QueryResult::Satisfied(element),
                Ok(None) => QueryResult::pending("not found"),
                Err(e) => QueryResult::failed(e),
            }
        });

        let element = match outcome {
            Ok(element) => element,
            Err(WaitError::TimedOut { what, elapsed, .. }) => {
                let last_observed = if seen_disabled {
                    "found but IsEnabled=false"
                } else if seen_offscreen {
                    "found but IsOffscreen=true"
                } else {
                    "never found"
                };
                return Err(WaitError::TimedOut {
                    what,
                    elapsed,
                    last_observed: last_observed.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        debug!(name, ?click_delay, "mouse click");
        self.tree.click(element, click_delay)?;
        Ok(())
    }

    // -- Actions --

    fn ensure_enabled(&self, element: ElementRef) -> Result<ElementState> {
        let state = self.state(element)?;
        if !state.is_enabled {
            return Err(HarnessError::NotEnabled(state.id_or_name().to_string()));
        }
        Ok(state)
    }

    /// Invoke a button. Fails without waiting if it is disabled.
    pub fn press_button(&self, button: ElementRef) -> Result<()> {
        let state = self.ensure_enabled(button)?;
        debug!(button = state.id_or_name(), "invoke");
        self.tree.invoke(button)?;
        Ok(())
    }

    /// Bring a checkbox to `checked`, toggling only if it differs.
    pub fn set_checkbox(&self, checkbox: ElementRef, checked: bool) -> Result<()> {
        self.ensure_enabled(checkbox)?;
        if self.checkbox_value(checkbox)? != checked {
            self.tree.toggle(checkbox)?;
        }
        Ok(())
    }

    pub fn checkbox_value(&self, checkbox: ElementRef) -> Result<bool> {
        match self.tree.toggle_state(checkbox)? {
            ToggleState::On => Ok(true),
            ToggleState::Off => Ok(false),
            ToggleState::Indeterminate => Err(HarnessError::Indeterminate(self.describe(checkbox))),
        }
    }

    pub fn insert_text(&self, element: ElementRef, text: &str) -> Result<()> {
        self.ensure_enabled(element)?;
        self.tree.focus(element)?;
        self.tree.set_value(element, text)?;
        Ok(())
    }

    pub fn get_text(&self, element: ElementRef) -> Result<String> {
        Ok(self.tree.text(element)?)
    }

    /// Select the grid row whose `name_col` cell is named `value`.
    ///
    /// Rows are searched from the bottom up. The matching row must become
    /// enabled before it is selected. Returns the row element.
    pub fn select_grid_row(&self, grid: ElementRef, value: &str, name_col: u32) -> Result<ElementRef> {
        let rows = self.tree.grid_row_count(grid)?;
        let mut matched = None;

        for row in (0..rows).rev() {
            // Items scrolled out of view may need a second request to realize.
            let item = match self.tree.grid_item(grid, row, name_col)? {
                Some(item) => Some(item),
                None => self.tree.grid_item(grid, row, name_col)?,
            };
            let Some(item) = item else { continue };
            if self.tree.state(item)?.is_some_and(|s| s.name == value) {
                matched = self.tree.parent(item)?;
                break;
            }
        }

        let row = matched.ok_or_else(|| HarnessError::RowNotFound(value.to_string()))?;
        self.wait_for_enabled(row, self.timeouts.control_state_update)?;
        self.tree.select(row)?;
        debug!(value, "grid row selected");
        Ok(row)
    }
}
