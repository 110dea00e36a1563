//! Shared fixtures for integration tests.

#![allow(dead_code)]

use flagstate::core::{BoxedState, ReplaceMerger, State, StateContext, StateFactory};
use flagstate::{Controller, Message};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub const EAT: u32 = 1;
pub const WORK: u32 = 2;
pub const SLEEP: u32 = 4;
pub const WORK2: u32 = 8;

pub type Log = Rc<RefCell<Vec<String>>>;

/// Records every hook call as `hook:name[:detail]`.
pub struct Recorder {
    pub name: &'static str,
    pub log: Log,
    pub handles: Vec<i32>,
    pub saved: Option<Vec<u8>>,
}

impl State for Recorder {
    type Param = String;

    fn name(&self) -> &str {
        self.name
    }

    fn on_enter(&mut self, ctx: &StateContext<String>) {
        self.log
            .borrow_mut()
            .push(format!("enter:{}:{}", self.name, ctx.enter_count()));
    }

    fn on_reenter(&mut self, ctx: &StateContext<String>) {
        let team = if ctx.is_team_triggered() { ":team" } else { "" };
        self.log
            .borrow_mut()
            .push(format!("reenter:{}:{}{team}", self.name, ctx.enter_count()));
    }

    fn on_exit(&mut self, ctx: &StateContext<String>) {
        let how = if ctx.is_mutex_triggered() {
            ":mutex"
        } else if ctx.is_team_triggered() {
            ":team"
        } else {
            ""
        };
        self.log.borrow_mut().push(format!("exit:{}{how}", self.name));
    }

    fn on_update(
        &mut self,
        _ctx: &StateContext<String>,
        _delta: Duration,
        _param: Option<&String>,
    ) {
        self.log.borrow_mut().push(format!("update:{}", self.name));
    }

    fn handle_message(&mut self, _ctx: &StateContext<String>, msg: &Message) -> bool {
        self.log
            .borrow_mut()
            .push(format!("msg:{}:{}", self.name, msg.what));
        self.handles.contains(&msg.what)
    }

    fn on_dispose(&mut self) {
        self.log.borrow_mut().push(format!("dispose:{}", self.name));
    }

    fn save_state(&self) -> Option<Vec<u8>> {
        self.saved.clone()
    }

    fn restore_state(&mut self, saved: Option<&[u8]>) {
        self.log
            .borrow_mut()
            .push(format!("restore:{}:{:?}", self.name, saved));
    }
}

/// Builds recorders for the Eat/Work/Sleep/Work2 flags and counts creations.
#[derive(Clone, Default)]
pub struct RecorderFactory {
    pub log: Log,
    pub created: Rc<RefCell<u32>>,
    pub handles: Vec<i32>,
    pub saved: Option<Vec<u8>>,
}

impl RecorderFactory {
    pub fn created(&self) -> u32 {
        *self.created.borrow()
    }
}

impl StateFactory<String> for RecorderFactory {
    fn create_state(&self, flag: u32, _param: Option<&String>) -> Option<BoxedState<String>> {
        let name = match flag {
            EAT => "Eat",
            WORK => "Work",
            SLEEP => "Sleep",
            WORK2 => "Work2",
            _ => return None,
        };
        *self.created.borrow_mut() += 1;
        Some(Box::new(Recorder {
            name,
            log: self.log.clone(),
            handles: self.handles.clone(),
            saved: self.saved.clone(),
        }))
    }
}

/// A configured controller and the log its states write to.
pub fn controller_with(factory: RecorderFactory) -> (Controller<String>, RecorderFactory) {
    let controller = Controller::new();
    controller.set_state_factory(factory.clone()).unwrap();
    controller.set_parameter_merger(ReplaceMerger).unwrap();
    (controller, factory)
}

pub fn controller() -> (Controller<String>, RecorderFactory) {
    controller_with(RecorderFactory::default())
}

pub fn take(log: &Log) -> Vec<String> {
    log.borrow_mut().drain(..).collect()
}
