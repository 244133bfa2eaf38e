//! Shared protocol types for communication between the test harness and the
//! Windows bridge process that owns the UI Automation client and the host
//! application's COM handle.
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each direction.
//! The harness sends a [`Request`], the bridge answers with a [`Response`]
//! carrying the same id.

use serde::{Deserialize, Serialize};

/// A command sent from the harness to the bridge process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    /// The command to execute.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the harness can send to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum Command {
    /// Initialize COM and UI Automation, launch the host and load the add-in.
    Init,

    /// Root automation element of the host's main window.
    AppRoot,

    /// Host application version string (e.g. "16.0").
    HostVersion,

    /// First element under `parent` with the given automation id.
    FindById {
        parent: ElementRef,
        automation_id: String,
        scope: TreeScope,
    },

    /// First element under `parent` whose name matches (case-insensitive) and
    /// whose control type is one of `control_types` (any type if empty).
    FindByName {
        parent: ElementRef,
        name: String,
        scope: TreeScope,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        control_types: Vec<ControlType>,
    },

    /// First enabled window under `parent` that reports itself modal.
    FindModal { parent: ElementRef, scope: TreeScope },

    /// Current properties of an element.
    GetState { element: ElementRef },

    /// Parent in the content view.
    GetParent { element: ElementRef },

    /// Document text of a text-pattern element.
    GetText { element: ElementRef },

    /// Value pattern.
    SetValue { element: ElementRef, value: String },

    SetFocus { element: ElementRef },

    /// Invoke pattern.
    Invoke { element: ElementRef },

    /// Move the mouse to the element's centre, wait `delay_ms`, left click.
    Click { element: ElementRef, delay_ms: u64 },

    /// Selection-item pattern.
    Select { element: ElementRef },

    GetToggleState { element: ElementRef },

    Toggle { element: ElementRef },

    /// Grid pattern row count.
    GridRowCount { element: ElementRef },

    /// Grid item at (row, col), if the item is realized.
    GridItem {
        element: ElementRef,
        row: u32,
        col: u32,
    },

    /// Press and release a key on the focused window.
    PressKey { key: Key },

    /// Names of the worksheets in the active workbook.
    WorksheetNames,

    /// Read a cell value (1-based row/col).
    GetCellValue { sheet: String, row: u32, col: u32 },

    /// Write a cell value (1-based row/col).
    SetCellValue {
        sheet: String,
        row: u32,
        col: u32,
        value: CellValue,
    },

    /// Out-of-band call on the add-in's automation object (e.g. "Logout").
    AddinCall { method: String },

    /// Ask the host application to quit.
    QuitHost,

    /// Whether the host process has exited.
    HostExited,

    /// Terminate the host process.
    KillHost,

    /// Shut down the bridge: release COM objects, exit the process.
    Shutdown,
}

/// Opaque handle to an automation element cached by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRef(pub u64);

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How far below the parent a search reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeScope {
    #[default]
    Children,
    Descendants,
}

/// UI Automation control types the harness filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Button,
    CheckBox,
    Custom,
    DataGrid,
    DataItem,
    Edit,
    Hyperlink,
    Pane,
    TabItem,
    Text,
    Window,
}

/// Snapshot of the properties the harness reads from an element.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElementState {
    #[serde(default)]
    pub automation_id: String,
    #[serde(default)]
    pub name: String,
    pub is_enabled: bool,
    pub is_offscreen: bool,
    /// True for windows whose window pattern reports `IsModal`.
    #[serde(default)]
    pub is_modal: bool,
}

impl ElementState {
    /// Automation id if set, otherwise the name. Used in diagnostics.
    pub fn id_or_name(&self) -> &str {
        if self.automation_id.is_empty() {
            &self.name
        } else {
            &self.automation_id
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleState {
    On,
    Off,
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Escape,
    Enter,
    Tab,
}

/// A worksheet cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Error(CellError),
}

/// Worksheet error values (`#N/A`, `#DIV/0!`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellError {
    pub code: String,
}

/// A response sent from the bridge back to the harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: u64,
    /// The result of the command.
    #[serde(flatten)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Data returned in successful responses.
///
/// Tagged by `kind`: several variants carry optional fields, so shape-based
/// matching would be ambiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseData {
    /// Result of a find; `None` when nothing matched.
    Element { element: Option<ElementRef> },
    /// Element properties; `None` when the element no longer exists.
    State { state: Option<ElementState> },
    Text { text: String },
    Toggle { state: ToggleState },
    Count { count: u32 },
    Flag { value: bool },
    Names { names: Vec<String> },
    Value { value: CellValue },
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => write!(f, "<empty>"),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Error(e) => write!(f, "{}", e.code),
        }
    }
}
