//! Common utilities for harness integration tests.
//!
//! [`FakeTree`] is a scripted automation tree on a virtual clock. Tests build
//! the elements they need, schedule changes at virtual times with
//! [`FakeTree::at`], and attach reactions to actions with
//! [`FakeTree::on_action`]. Every probe first applies the changes that are due,
//! so the harness sees the UI evolve as its polls advance the clock.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use uia_harness::tree::{
    CellValue, ControlType, ElementRef, ElementState, HostApplication, Key, ToggleState, TreeScope,
    UiTree, WorkbookAccess,
};
use uia_harness::{BridgeError, Harness, Timeouts};
use uia_sync::{ManualClock, Synchronizer};

pub const ROOT: ElementRef = ElementRef(1);

#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<u64>,
    pub automation_id: String,
    pub name: String,
    pub control_type: ControlType,
    pub enabled: bool,
    pub offscreen: bool,
    pub modal: bool,
    pub present: bool,
    pub text: String,
    pub toggle: ToggleState,
    pub row_count: u32,
    pub items: BTreeMap<(u32, u32), u64>,
}

impl Node {
    pub fn new(control_type: ControlType) -> Self {
        Self {
            parent: None,
            automation_id: String::new(),
            name: String::new(),
            control_type,
            enabled: true,
            offscreen: false,
            modal: false,
            present: true,
            text: String::new(),
            toggle: ToggleState::Off,
            row_count: 0,
            items: BTreeMap::new(),
        }
    }

    pub fn id(mut self, automation_id: &str) -> Self {
        self.automation_id = automation_id.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn offscreen(mut self) -> Self {
        self.offscreen = true;
        self
    }

    pub fn modal(mut self) -> Self {
        self.modal = true;
        self
    }

    pub fn toggled(mut self, state: ToggleState) -> Self {
        self.toggle = state;
        self
    }
}

pub struct Scene {
    nodes: BTreeMap<u64, Node>,
    next_id: u64,
}

impl Scene {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(ROOT.0, Node::new(ControlType::Window).name("Book1 - Excel"));
        Self { nodes, next_id: ROOT.0 }
    }

    pub fn add(&mut self, parent: ElementRef, mut node: Node) -> ElementRef {
        self.next_id += 1;
        node.parent = Some(parent.0);
        self.nodes.insert(self.next_id, node);
        ElementRef(self.next_id)
    }

    pub fn node(&mut self, element: ElementRef) -> &mut Node {
        self.nodes.get_mut(&element.0).expect("unknown element")
    }

    /// Take an element (and with it its subtree) out of the tree.
    pub fn remove(&mut self, element: ElementRef) {
        self.node(element).present = false;
    }

    fn is_live(&self, id: u64) -> bool {
        match self.nodes.get(&id) {
            Some(node) if node.present => node.parent.map_or(true, |p| self.is_live(p)),
            _ => false,
        }
    }

    fn children(&self, parent: u64) -> Vec<u64> {
        self.nodes
            .iter()
            .filter(|(id, n)| n.parent == Some(parent) && self.is_live(**id))
            .map(|(id, _)| *id)
            .collect()
    }

    fn search(&self, parent: u64, scope: TreeScope, pred: &dyn Fn(&Node) -> bool) -> Option<u64> {
        for child in self.children(parent) {
            if pred(&self.nodes[&child]) {
                return Some(child);
            }
            if scope == TreeScope::Descendants {
                if let Some(found) = self.search(child, scope, pred) {
                    return Some(found);
                }
            }
        }
        None
    }
}

type Event = Box<dyn FnOnce(&mut Scene)>;
type Handler = Box<dyn FnMut(&FakeTree)>;

pub struct FakeTree {
    pub clock: Arc<ManualClock>,
    scene: RefCell<Scene>,
    timeline: RefCell<Vec<(Duration, Event)>>,
    handlers: RefCell<HashMap<u64, Handler>>,
    key_handler: RefCell<Option<Handler>>,
    actions: RefCell<Vec<String>>,
    tree_calls: Cell<u32>,
}

impl FakeTree {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new()),
            scene: RefCell::new(Scene::new()),
            timeline: RefCell::new(Vec::new()),
            handlers: RefCell::new(HashMap::new()),
            key_handler: RefCell::new(None),
            actions: RefCell::new(Vec::new()),
            tree_calls: Cell::new(0),
        }
    }

    pub fn sync(&self) -> Synchronizer {
        Synchronizer::with_clock(self.clock.clone())
    }

    pub fn harness(&self) -> Harness<'_> {
        Harness::with_synchronizer(self, Timeouts::default(), self.sync())
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    pub fn add(&self, parent: ElementRef, node: Node) -> ElementRef {
        self.scene.borrow_mut().add(parent, node)
    }

    pub fn edit<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> R {
        f(&mut self.scene.borrow_mut())
    }

    /// Apply `change` once the virtual clock reaches `when`.
    pub fn at(&self, when: Duration, change: impl FnOnce(&mut Scene) + 'static) {
        self.timeline.borrow_mut().push((when, Box::new(change)));
    }

    /// Apply `change` `delay` after the current virtual time.
    pub fn after(&self, delay: Duration, change: impl FnOnce(&mut Scene) + 'static) {
        self.at(self.elapsed() + delay, change);
    }

    /// React every time `element` is invoked, clicked, selected or toggled.
    pub fn on_action(&self, element: ElementRef, handler: impl FnMut(&FakeTree) + 'static) {
        self.handlers.borrow_mut().insert(element.0, Box::new(handler));
    }

    pub fn on_key(&self, handler: impl FnMut(&FakeTree) + 'static) {
        *self.key_handler.borrow_mut() = Some(Box::new(handler));
    }

    /// Actions performed so far, e.g. `"invoke OKButton"`.
    pub fn actions(&self) -> Vec<String> {
        self.actions.borrow().clone()
    }

    /// Parent of the first element named `name`.
    pub fn parent_of_name(&self, name: &str) -> Option<ElementRef> {
        let scene = self.scene.borrow();
        scene
            .nodes
            .values()
            .find(|n| n.name == name)
            .and_then(|n| n.parent)
            .map(ElementRef)
    }

    /// Number of `UiTree` calls made so far.
    pub fn tree_calls(&self) -> u32 {
        self.tree_calls.get()
    }

    fn apply_due(&self) {
        self.tree_calls.set(self.tree_calls.get() + 1);
        let now = self.elapsed();
        let due: Vec<(Duration, Event)> = {
            let mut timeline = self.timeline.borrow_mut();
            timeline.sort_by_key(|(when, _)| *when);
            let split = timeline
                .iter()
                .position(|(when, _)| *when > now)
                .unwrap_or(timeline.len());
            timeline.drain(..split).collect()
        };
        let mut scene = self.scene.borrow_mut();
        for (_, change) in due {
            change(&mut scene);
        }
    }

    fn live(&self, element: ElementRef) -> Result<(), BridgeError> {
        if self.scene.borrow().is_live(element.0) {
            Ok(())
        } else {
            Err(BridgeError::Remote(format!("element {element} not available")))
        }
    }

    fn label(&self, element: ElementRef) -> String {
        let scene = self.scene.borrow();
        let node = &scene.nodes[&element.0];
        if node.automation_id.is_empty() {
            node.name.clone()
        } else {
            node.automation_id.clone()
        }
    }

    fn act(&self, element: ElementRef, verb: &str) -> Result<(), BridgeError> {
        self.apply_due();
        self.live(element)?;
        self.actions
            .borrow_mut()
            .push(format!("{verb} {}", self.label(element)));
        let handler = self.handlers.borrow_mut().remove(&element.0);
        if let Some(mut handler) = handler {
            handler(self);
            self.handlers.borrow_mut().entry(element.0).or_insert(handler);
        }
        Ok(())
    }
}

impl UiTree for FakeTree {
    fn find_by_id(
        &self,
        parent: ElementRef,
        automation_id: &str,
        scope: TreeScope,
    ) -> Result<Option<ElementRef>, BridgeError> {
        self.apply_due();
        let scene = self.scene.borrow();
        Ok(scene
            .search(parent.0, scope, &|n| n.automation_id.eq_ignore_ascii_case(automation_id))
            .map(ElementRef))
    }

    fn find_by_name(
        &self,
        parent: ElementRef,
        name: &str,
        control_types: &[ControlType],
        scope: TreeScope,
    ) -> Result<Option<ElementRef>, BridgeError> {
        self.apply_due();
        let scene = self.scene.borrow();
        Ok(scene
            .search(parent.0, scope, &|n| {
                n.name.eq_ignore_ascii_case(name)
                    && (control_types.is_empty() || control_types.contains(&n.control_type))
            })
            .map(ElementRef))
    }

    fn find_modal(&self, parent: ElementRef, scope: TreeScope) -> Result<Option<ElementRef>, BridgeError> {
        self.apply_due();
        let scene = self.scene.borrow();
        Ok(scene
            .search(parent.0, scope, &|n| n.enabled && n.modal)
            .map(ElementRef))
    }

    fn state(&self, element: ElementRef) -> Result<Option<ElementState>, BridgeError> {
        self.apply_due();
        let scene = self.scene.borrow();
        if !scene.is_live(element.0) {
            return Ok(None);
        }
        let node = &scene.nodes[&element.0];
        Ok(Some(ElementState {
            automation_id: node.automation_id.clone(),
            name: node.name.clone(),
            is_enabled: node.enabled,
            is_offscreen: node.offscreen,
            is_modal: node.modal,
        }))
    }

    fn parent(&self, element: ElementRef) -> Result<Option<ElementRef>, BridgeError> {
        self.apply_due();
        self.live(element)?;
        Ok(self.scene.borrow().nodes[&element.0].parent.map(ElementRef))
    }

    fn text(&self, element: ElementRef) -> Result<String, BridgeError> {
        self.apply_due();
        self.live(element)?;
        Ok(self.scene.borrow().nodes[&element.0].text.clone())
    }

    fn set_value(&self, element: ElementRef, value: &str) -> Result<(), BridgeError> {
        self.act(element, "set")?;
        self.scene.borrow_mut().node(element).text = value.to_string();
        Ok(())
    }

    fn focus(&self, element: ElementRef) -> Result<(), BridgeError> {
        self.apply_due();
        self.live(element)
    }

    fn invoke(&self, element: ElementRef) -> Result<(), BridgeError> {
        self.act(element, "invoke")
    }

    fn click(&self, element: ElementRef, delay: Duration) -> Result<(), BridgeError> {
        self.clock.advance(delay);
        self.act(element, "click")
    }

    fn select(&self, element: ElementRef) -> Result<(), BridgeError> {
        self.act(element, "select")
    }

    fn toggle_state(&self, element: ElementRef) -> Result<ToggleState, BridgeError> {
        self.apply_due();
        self.live(element)?;
        Ok(self.scene.borrow().nodes[&element.0].toggle)
    }

    fn toggle(&self, element: ElementRef) -> Result<(), BridgeError> {
        self.act(element, "toggle")?;
        let mut scene = self.scene.borrow_mut();
        let node = scene.node(element);
        node.toggle = match node.toggle {
            ToggleState::On => ToggleState::Off,
            _ => ToggleState::On,
        };
        Ok(())
    }

    fn grid_row_count(&self, grid: ElementRef) -> Result<u32, BridgeError> {
        self.apply_due();
        self.live(grid)?;
        Ok(self.scene.borrow().nodes[&grid.0].row_count)
    }

    fn grid_item(&self, grid: ElementRef, row: u32, col: u32) -> Result<Option<ElementRef>, BridgeError> {
        self.apply_due();
        self.live(grid)?;
        let scene = self.scene.borrow();
        Ok(scene.nodes[&grid.0]
            .items
            .get(&(row, col))
            .copied()
            .filter(|id| scene.is_live(*id))
            .map(ElementRef))
    }

    fn press_key(&self, key: Key) -> Result<(), BridgeError> {
        self.apply_due();
        self.actions.borrow_mut().push(format!("key {key:?}"));
        let handler = self.key_handler.borrow_mut().take();
        if let Some(mut handler) = handler {
            handler(self);
            self.key_handler.borrow_mut().get_or_insert(handler);
        }
        Ok(())
    }
}

/// Build a grid with one row element per name; the name cell sits in `name_col`.
pub fn grid_with_rows(tree: &FakeTree, parent: ElementRef, id: &str, names: &[&str], name_col: u32) -> ElementRef {
    let grid = tree.add(parent, Node::new(ControlType::DataGrid).id(id));
    for (row, name) in names.iter().enumerate() {
        let row_el = tree.add(grid, Node::new(ControlType::DataItem).name(&format!("row {row}")));
        let cell = tree.add(row_el, Node::new(ControlType::Text).name(name));
        tree.edit(|s| {
            let g = s.node(grid);
            g.items.insert((row as u32, name_col), cell.0);
            g.row_count = g.row_count.max(row as u32 + 1);
        });
    }
    grid
}

/// Host process double for fixture tests.
pub struct FakeHost {
    pub clock: Arc<ManualClock>,
    /// Virtual time at which the host exits after `quit`. `None` never exits.
    pub exits_after_quit: Option<Duration>,
    pub quit_fails: bool,
    pub already_exited: bool,
    quit_at: Cell<Option<Duration>>,
    pub killed: Cell<bool>,
    pub calls: RefCell<Vec<&'static str>>,
}

impl FakeHost {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            exits_after_quit: Some(Duration::from_millis(300)),
            quit_fails: false,
            already_exited: false,
            quit_at: Cell::new(None),
            killed: Cell::new(false),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl HostApplication for FakeHost {
    fn app_root(&self) -> Result<ElementRef, BridgeError> {
        Ok(ROOT)
    }

    fn version(&self) -> Result<String, BridgeError> {
        Ok("16.0".to_string())
    }

    fn quit(&self) -> Result<(), BridgeError> {
        self.calls.borrow_mut().push("quit");
        if self.quit_fails {
            return Err(BridgeError::Remote("RPC server unavailable".into()));
        }
        self.quit_at.set(Some(self.clock.elapsed()));
        Ok(())
    }

    fn has_exited(&self) -> Result<bool, BridgeError> {
        self.calls.borrow_mut().push("has_exited");
        if self.already_exited || self.killed.get() {
            return Ok(true);
        }
        Ok(match (self.quit_at.get(), self.exits_after_quit) {
            (Some(at), Some(delay)) => self.clock.elapsed() >= at + delay,
            _ => false,
        })
    }

    fn kill(&self) -> Result<(), BridgeError> {
        self.calls.borrow_mut().push("kill");
        self.killed.set(true);
        Ok(())
    }
}

/// Workbook double that rejects calls until `busy_until`.
pub struct FakeBook {
    pub clock: Arc<ManualClock>,
    pub busy_until: Duration,
    pub sheets: RefCell<Vec<String>>,
    pub cells: RefCell<HashMap<(String, u32, u32), CellValue>>,
    pub attempts: Cell<u32>,
}

impl FakeBook {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            busy_until: Duration::ZERO,
            sheets: RefCell::new(vec!["Sheet1".to_string()]),
            cells: RefCell::new(HashMap::new()),
            attempts: Cell::new(0),
        }
    }

    fn check_busy(&self) -> Result<(), BridgeError> {
        self.attempts.set(self.attempts.get() + 1);
        if self.clock.elapsed() < self.busy_until {
            Err(BridgeError::Remote("Call was rejected by callee".into()))
        } else {
            Ok(())
        }
    }
}

impl WorkbookAccess for FakeBook {
    fn worksheet_names(&self) -> Result<Vec<String>, BridgeError> {
        Ok(self.sheets.borrow().clone())
    }

    fn cell_value(&self, sheet: &str, row: u32, col: u32) -> Result<CellValue, BridgeError> {
        self.check_busy()?;
        Ok(self
            .cells
            .borrow()
            .get(&(sheet.to_string(), row, col))
            .cloned()
            .unwrap_or(CellValue::Null))
    }

    fn set_cell_value(&self, sheet: &str, row: u32, col: u32, value: CellValue) -> Result<(), BridgeError> {
        self.check_busy()?;
        self.cells
            .borrow_mut()
            .insert((sheet.to_string(), row, col), value);
        Ok(())
    }
}
