//! Capability traits the harness drives.
//!
//! [`UiaBridge`](crate::UiaBridge) implements all of them over the bridge
//! process. Tests implement them over scripted in-memory state.

use std::time::Duration;

pub use uia_bridge_protocol::{
    CellValue, ControlType, ElementRef, ElementState, Key, ToggleState, TreeScope,
};

use crate::error::BridgeError;

/// Read and act on the UI automation tree of the host application.
///
/// Every call is a single, non-blocking probe. Waiting is the harness's job.
pub trait UiTree {
    /// First element under `parent` with the given automation id.
    fn find_by_id(
        &self,
        parent: ElementRef,
        automation_id: &str,
        scope: TreeScope,
    ) -> Result<Option<ElementRef>, BridgeError>;

    /// First element under `parent` named `name` (case-insensitive) whose
    /// control type is one of `control_types`. An empty filter matches any type.
    fn find_by_name(
        &self,
        parent: ElementRef,
        name: &str,
        control_types: &[ControlType],
        scope: TreeScope,
    ) -> Result<Option<ElementRef>, BridgeError>;

    /// First enabled modal window under `parent`.
    fn find_modal(&self, parent: ElementRef, scope: TreeScope)
        -> Result<Option<ElementRef>, BridgeError>;

    /// Current properties, or `None` once the element has left the tree.
    fn state(&self, element: ElementRef) -> Result<Option<ElementState>, BridgeError>;

    fn parent(&self, element: ElementRef) -> Result<Option<ElementRef>, BridgeError>;

    fn text(&self, element: ElementRef) -> Result<String, BridgeError>;

    fn set_value(&self, element: ElementRef, value: &str) -> Result<(), BridgeError>;

    fn focus(&self, element: ElementRef) -> Result<(), BridgeError>;

    fn invoke(&self, element: ElementRef) -> Result<(), BridgeError>;

    /// Move the pointer onto the element, wait `delay`, then left click.
    fn click(&self, element: ElementRef, delay: Duration) -> Result<(), BridgeError>;

    fn select(&self, element: ElementRef) -> Result<(), BridgeError>;

    fn toggle_state(&self, element: ElementRef) -> Result<ToggleState, BridgeError>;

    fn toggle(&self, element: ElementRef) -> Result<(), BridgeError>;

    fn grid_row_count(&self, grid: ElementRef) -> Result<u32, BridgeError>;

    /// Cell element at (row, col). `None` if the item is not realized.
    fn grid_item(
        &self,
        grid: ElementRef,
        row: u32,
        col: u32,
    ) -> Result<Option<ElementRef>, BridgeError>;

    fn press_key(&self, key: Key) -> Result<(), BridgeError>;
}

/// Worksheet access on the host's active workbook. Rows and columns are 1-based.
pub trait WorkbookAccess {
    fn worksheet_names(&self) -> Result<Vec<String>, BridgeError>;

    fn cell_value(&self, sheet: &str, row: u32, col: u32) -> Result<CellValue, BridgeError>;

    fn set_cell_value(
        &self,
        sheet: &str,
        row: u32,
        col: u32,
        value: CellValue,
    ) -> Result<(), BridgeError>;
}

/// Out-of-band calls on the add-in's automation object.
pub trait AddinControl {
    fn call(&self, method: &str) -> Result<(), BridgeError>;

    /// Drop the add-in's session so the next test starts logged out.
    fn logout(&self) -> Result<(), BridgeError> {
        self.call("Logout")
    }
}

/// Lifecycle of the host application process.
pub trait HostApplication {
    /// Root element of the host's main window.
    fn app_root(&self) -> Result<ElementRef, BridgeError>;

    fn version(&self) -> Result<String, BridgeError>;

    /// Ask the host to quit. Returns once the request is delivered.
    fn quit(&self) -> Result<(), BridgeError>;

    fn has_exited(&self) -> Result<bool, BridgeError>;

    fn kill(&self) -> Result<(), BridgeError>;
}

impl<T: HostApplication + ?Sized> HostApplication for &T {
    fn app_root(&self) -> Result<ElementRef, BridgeError> {
        (**self).app_root()
    }

    fn version(&self) -> Result<String, BridgeError> {
        (**self).version()
    }

    fn quit(&self) -> Result<(), BridgeError> {
        (**self).quit()
    }

    fn has_exited(&self) -> Result<bool, BridgeError> {
        (**self).has_exited()
    }

    fn kill(&self) -> Result<(), BridgeError> {
        (**self).kill()
    }
}
