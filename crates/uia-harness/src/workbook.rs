//! Worksheet helpers that tolerate a busy host.
//!
//! The host rejects automation calls while it is processing its own events
//! (recalculation, add-in callbacks), so cell access is retried until it goes
//! through or the host-operation timeout passes.

use std::time::Duration;

use uia_sync::{PollPolicy, QueryResult, Synchronizer};

use crate::config::Timeouts;
use crate::error::Result;
use crate::tree::{CellValue, WorkbookAccess};

/// Cell access on a [`WorkbookAccess`] backend with retries.
pub struct Worksheets<'a> {
    book: &'a dyn WorkbookAccess,
    sync: Synchronizer,
    timeouts: Timeouts,
}

impl<'a> Worksheets<'a> {
    pub fn new(book: &'a dyn WorkbookAccess, timeouts: Timeouts) -> Self {
        Self::with_synchronizer(book, timeouts, Synchronizer::new())
    }

    pub fn with_synchronizer(book: &'a dyn WorkbookAccess, timeouts: Timeouts, sync: Synchronizer) -> Self {
        Self {
            book,
            sync,
            timeouts,
        }
    }

    fn host_policy(&self) -> PollPolicy {
        self.timeouts.policy(self.timeouts.host_operation)
    }

    /// Wait until a worksheet named exactly `name` exists.
    pub fn wait_for_worksheet(&self, name: &str, timeout: Duration) -> Result<()> {
        let what = format!("worksheet '{name}'");
        Ok(self
            .sync
            .wait_for(&what, &self.timeouts.policy(timeout), || match self.book.worksheet_names() {
                Ok(names) if names.iter().any(|n| n == name) => QueryResult::Satisfied(()),
                Ok(names) => QueryResult::pending(format!("sheets: [{}]", names.join(", "))),
                // Workbook may still be opening.
                Err(e) => QueryResult::pending(e),
            })?)
    }

    pub fn set_cell_with_retry(&self, sheet: &str, row: u32, col: u32, value: impl Into<CellValue>) -> Result<()> {
        let value = value.into();
        let what = format!("write {sheet}!R{row}C{col}");
        Ok(self.sync.retry(&what, &self.host_policy(), || {
            self.book.set_cell_value(sheet, row, col, value.clone())
        })?)
    }

    pub fn get_cell_with_retry(&self, sheet: &str, row: u32, col: u32) -> Result<CellValue> {
        let what = format!("read {sheet}!R{row}C{col}");
        Ok(self
            .sync
            .retry(&what, &self.host_policy(), || self.book.cell_value(sheet, row, col))?)
    }
}
