//! Subprocess management and JSON IPC for the UI automation bridge process.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, info, warn};
use uia_bridge_protocol::{Command as BridgeCommand, Request, Response, ResponseData, ResponseResult};

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::tree::{
    AddinControl, CellValue, ControlType, ElementRef, ElementState, HostApplication, Key, ToggleState,
    TreeScope, UiTree, WorkbookAccess,
};

/// Client for the bridge process.
///
/// Each call writes one request line and blocks for the matching response
/// line. Implements every capability trait the harness needs.
pub struct UiaBridge {
    child: Mutex<Option<Child>>,
    writer: Mutex<Box<dyn Write + Send>>,
    reader: Mutex<Box<dyn BufRead + Send>>,
    next_id: AtomicU64,
}

impl UiaBridge {
    /// Spawn the configured bridge command and initialize the host.
    pub fn start(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args);
        cmd.envs(config.environment());
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit()); // Bridge diagnostics go to our stderr

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::ProgramNotFound(config.program.display().to_string())
            } else {
                BridgeError::SpawnFailed(e)
            }
        })?;

        let stdin = child.stdin.take().ok_or(BridgeError::NotRunning)?;
        let stdout = child.stdout.take().ok_or(BridgeError::NotRunning)?;

        let bridge = Self::from_streams(stdout, stdin);
        *bridge.child.lock().unwrap_or_else(PoisonError::into_inner) = Some(child);

        info!(program = %config.program.display(), "bridge process started");
        bridge.init()?;
        Ok(bridge)
    }

    /// Speak the protocol over existing streams, e.g. a bridge reached over a
    /// socket. No process is owned and no `Init` is sent.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            child: Mutex::new(None),
            writer: Mutex::new(Box::new(writer)),
            reader: Mutex::new(Box::new(BufReader::new(reader))),
            next_id: AtomicU64::new(1),
        }
    }

    /// Initialize UI Automation and launch the host with the add-in.
    pub fn init(&self) -> Result<(), BridgeError> {
        self.send_command(BridgeCommand::Init)?;
        Ok(())
    }

    /// Send a command to the bridge and wait for the response.
    fn send_command(&self, command: BridgeCommand) -> Result<Option<ResponseData>, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let request = Request { id, command };
        let json = serde_json::to_string(&request)?;
        debug!(id, request = %json, "bridge request");

        // Hold the reader for the whole exchange so responses cannot interleave.
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);

        {
            let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            writeln!(writer, "{json}").map_err(|e| BridgeError::SendFailed(e.to_string()))?;
            writer
                .flush()
                .map_err(|e| BridgeError::SendFailed(e.to_string()))?;
        }

        // Replies to earlier requests (e.g. after a failed parse) are stale.
        let response = loop {
            let mut line = String::new();
            reader
                .read_line(&mut line)
                .map_err(|e| BridgeError::ReadFailed(e.to_string()))?;
            if line.is_empty() {
                return Err(BridgeError::NotRunning);
            }

            let response: Response = serde_json::from_str(&line)?;
            if response.id < id {
                warn!(expected = id, got = response.id, "skipping stale bridge response");
                continue;
            }
            if response.id != id {
                return Err(BridgeError::IdMismatch {
                    expected: id,
                    got: response.id,
                });
            }
            break response;
        };

        match response.result {
            ResponseResult::Ok { data } => Ok(data),
            ResponseResult::Error { message } => Err(BridgeError::Remote(message)),
        }
    }

    fn element(&self, command: BridgeCommand) -> Result<Option<ElementRef>, BridgeError> {
        match self.send_command(command)? {
            Some(ResponseData::Element { element }) => Ok(element),
            _ => Err(BridgeError::UnexpectedResponse("element")),
        }
    }

    fn flag(&self, command: BridgeCommand) -> Result<bool, BridgeError> {
        match self.send_command(command)? {
            Some(ResponseData::Flag { value }) => Ok(value),
            _ => Err(BridgeError::UnexpectedResponse("flag")),
        }
    }

    fn text_of(&self, command: BridgeCommand) -> Result<String, BridgeError> {
        match self.send_command(command)? {
            Some(ResponseData::Text { text }) => Ok(text),
            _ => Err(BridgeError::UnexpectedResponse("text")),
        }
    }

    fn unit(&self, command: BridgeCommand) -> Result<(), BridgeError> {
        self.send_command(command)?;
        Ok(())
    }

    /// Shut down the bridge: release the host and terminate the process.
    pub fn shutdown(self) -> Result<(), BridgeError> {
        let _ = self.send_command(BridgeCommand::Shutdown);

        if let Some(mut child) = self
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = child.wait();
        }
        info!("bridge shut down");
        Ok(())
    }
}

impl UiTree for UiaBridge {
    fn find_by_id(
        &self,
        parent: ElementRef,
        automation_id: &str,
        scope: TreeScope,
    ) -> Result<Option<ElementRef>, BridgeError> {
        self.element(BridgeCommand::FindById {
            parent,
            automation_id: automation_id.to_string(),
            scope,
        })
    }

    fn find_by_name(
        &self,
        parent: ElementRef,
        name: &str,
        control_types: &[ControlType],
        scope: TreeScope,
    ) -> Result<Option<ElementRef>, BridgeError> {
        self.element(BridgeCommand::FindByName {
            parent,
            name: name.to_string(),
            scope,
            control_types: control_types.to_vec(),
        })
    }

    fn find_modal(&self, parent: ElementRef, scope: TreeScope) -> Result<Option<ElementRef>, BridgeError> {
        self.element(BridgeCommand::FindModal { parent, scope })
    }

    fn state(&self, element: ElementRef) -> Result<Option<ElementState>, BridgeError> {
        match self.send_command(BridgeCommand::GetState { element })? {
            Some(ResponseData::State { state }) => Ok(state),
            _ => Err(BridgeError::UnexpectedResponse("state")),
        }
    }

    fn parent(&self, element: ElementRef) -> Result<Option<ElementRef>, BridgeError> {
        self.element(BridgeCommand::GetParent { element })
    }

    fn text(&self, element: ElementRef) -> Result<String, BridgeError> {
        self.text_of(BridgeCommand::GetText { element })
    }

    fn set_value(&self, element: ElementRef, value: &str) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::SetValue {
            element,
            value: value.to_string(),
        })
    }

    fn focus(&self, element: ElementRef) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::SetFocus { element })
    }

    fn invoke(&self, element: ElementRef) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::Invoke { element })
    }

    fn click(&self, element: ElementRef, delay: Duration) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::Click {
            element,
            delay_ms: delay.as_millis() as u64,
        })
    }

    fn select(&self, element: ElementRef) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::Select { element })
    }

    fn toggle_state(&self, element: ElementRef) -> Result<ToggleState, BridgeError> {
        match self.send_command(BridgeCommand::GetToggleState { element })? {
            Some(ResponseData::Toggle { state }) => Ok(state),
            _ => Err(BridgeError::UnexpectedResponse("toggle")),
        }
    }

    fn toggle(&self, element: ElementRef) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::Toggle { element })
    }

    fn grid_row_count(&self, grid: ElementRef) -> Result<u32, BridgeError> {
        match self.send_command(BridgeCommand::GridRowCount { element: grid })? {
            Some(ResponseData::Count { count }) => Ok(count),
            _ => Err(BridgeError::UnexpectedResponse("count")),
        }
    }

    fn grid_item(&self, grid: ElementRef, row: u32, col: u32) -> Result<Option<ElementRef>, BridgeError> {
        self.element(BridgeCommand::GridItem {
            element: grid,
            row,
            col,
        })
    }

    fn press_key(&self, key: Key) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::PressKey { key })
    }
}

impl WorkbookAccess for UiaBridge {
    fn worksheet_names(&self) -> Result<Vec<String>, BridgeError> {
        match self.send_command(BridgeCommand::WorksheetNames)? {
            Some(ResponseData::Names { names }) => Ok(names),
            _ => Err(BridgeError::UnexpectedResponse("names")),
        }
    }

    fn cell_value(&self, sheet: &str, row: u32, col: u32) -> Result<CellValue, BridgeError> {
        match self.send_command(BridgeCommand::GetCellValue {
            sheet: sheet.to_string(),
            row,
            col,
        })? {
            Some(ResponseData::Value { value }) => Ok(value),
            _ => Err(BridgeError::UnexpectedResponse("value")),
        }
    }

    fn set_cell_value(&self, sheet: &str, row: u32, col: u32, value: CellValue) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::SetCellValue {
            sheet: sheet.to_string(),
            row,
            col,
            value,
        })
    }
}

impl AddinControl for UiaBridge {
    fn call(&self, method: &str) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::AddinCall {
            method: method.to_string(),
        })
    }
}

impl HostApplication for UiaBridge {
    fn app_root(&self) -> Result<ElementRef, BridgeError> {
        self.element(BridgeCommand::AppRoot)?
            .ok_or(BridgeError::UnexpectedResponse("app root"))
    }

    fn version(&self) -> Result<String, BridgeError> {
        self.text_of(BridgeCommand::HostVersion)
    }

    fn quit(&self) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::QuitHost)
    }

    fn has_exited(&self) -> Result<bool, BridgeError> {
        self.flag(BridgeCommand::HostExited)
    }

    fn kill(&self) -> Result<(), BridgeError> {
        self.unit(BridgeCommand::KillHost)
    }
}
