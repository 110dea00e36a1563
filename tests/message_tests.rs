//! Message routing, delayed delivery and cross-thread senders.

mod common;

use common::*;
use flagstate::core::{BoxedState, State, StateContext};
use flagstate::{Controller, ControllerError, Message, MessagePolicy, MessageScope, ReplaceMerger};
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn handling(what: &[i32]) -> (Controller<String>, RecorderFactory) {
    controller_with(RecorderFactory {
        handles: what.to_vec(),
        ..RecorderFactory::default()
    })
}

fn messages(factory: &RecorderFactory) -> Vec<String> {
    take(&factory.log)
        .into_iter()
        .filter(|line| line.starts_with("msg:"))
        .collect()
}

#[test]
fn delayed_message_is_delivered_once_after_it_is_due() {
    let (controller, factory) = handling(&[3]);
    controller.add_state(EAT, None).unwrap();
    take(&factory.log);

    let msg = Message::new(3).with_delay(Duration::from_millis(30));
    assert!(!controller.send_message(msg).unwrap());
    assert!(controller.has_message(3).unwrap());

    controller.update(Duration::ZERO, None).unwrap();
    assert!(messages(&factory).is_empty());

    thread::sleep(Duration::from_millis(40));
    controller.update(Duration::from_millis(40), None).unwrap();
    assert_eq!(messages(&factory), vec!["msg:Eat:3"]);
    assert!(!controller.has_message(3).unwrap());

    controller.update(Duration::ZERO, None).unwrap();
    assert!(messages(&factory).is_empty());
}

#[test]
fn consume_stops_while_broadcast_reaches_everyone() {
    let (controller, factory) = handling(&[1]);
    controller.add_state(EAT | WORK, None).unwrap();
    take(&factory.log);

    assert!(controller
        .dispatch_message(Message::new(1), MessagePolicy::Consume, MessageScope::CURRENT)
        .unwrap());
    assert_eq!(messages(&factory), vec!["msg:Work:1"]);

    assert!(controller
        .dispatch_message(Message::new(1), MessagePolicy::Broadcast, MessageScope::CURRENT)
        .unwrap());
    assert_eq!(messages(&factory), vec!["msg:Work:1", "msg:Eat:1"]);

    assert!(!controller
        .dispatch_message(Message::new(2), MessagePolicy::Broadcast, MessageScope::CURRENT)
        .unwrap());
}

#[test]
fn scopes_select_current_cached_and_global_states() {
    let (controller, factory) = handling(&[]);
    controller.set_state_cache_enabled(true).unwrap();
    controller.add_state(SLEEP, None).unwrap();
    controller.remove_state(SLEEP, None).unwrap();
    controller.add_state(EAT, None).unwrap();
    controller.add_global_state(WORK, None).unwrap();
    take(&factory.log);

    controller
        .dispatch_message(Message::new(7), MessagePolicy::Broadcast, MessageScope::CACHED)
        .unwrap();
    assert_eq!(messages(&factory), vec!["msg:Sleep:7"]);

    controller
        .dispatch_message(Message::new(7), MessagePolicy::Broadcast, MessageScope::GLOBAL)
        .unwrap();
    assert_eq!(messages(&factory), vec!["msg:Work:7"]);

    controller
        .dispatch_message(Message::new(7), MessagePolicy::Broadcast, MessageScope::ALL)
        .unwrap();
    assert_eq!(
        messages(&factory),
        vec!["msg:Eat:7", "msg:Sleep:7", "msg:Work:7"]
    );
}

#[test]
fn consumed_current_message_skips_global_states() {
    let (controller, factory) = handling(&[5]);
    controller.add_state(EAT, None).unwrap();
    controller.add_global_state(WORK, None).unwrap();
    take(&factory.log);

    controller
        .dispatch_message(Message::new(5), MessagePolicy::Consume, MessageScope::ALL)
        .unwrap();
    assert_eq!(messages(&factory), vec!["msg:Eat:5"]);
}

#[test]
fn replier_receives_the_delivered_message() {
    let (controller, _) = handling(&[1]);
    controller.add_state(EAT, None).unwrap();

    let (tx, rx) = mpsc::channel();
    let msg = Message::new(1).with_args(10, 20).with_replier(move |m: Message| {
        let _ = tx.send(m);
    });
    assert!(controller.send_message(msg).unwrap());

    let replied = rx.recv().unwrap();
    assert_eq!((replied.what, replied.arg1, replied.arg2), (1, 10, 20));
    assert!(replied.is_in_use());
    assert_eq!(
        controller.send_message(replied),
        Err(ControllerError::MessageInUse { what: 1 })
    );
}

#[test]
fn in_use_messages_cannot_be_recycled() {
    let (controller, _) = handling(&[]);
    let (tx, rx) = mpsc::channel();
    let msg = controller
        .obtain_message(6)
        .unwrap()
        .with_replier(move |m: Message| {
            let _ = tx.send(m);
        });
    controller.send_message(msg).unwrap();

    let replied = rx.recv().unwrap();
    assert_eq!(
        controller.recycle_message(replied),
        Err(ControllerError::MessageInUse { what: 6 })
    );
    assert!(controller.recycle_message(Message::new(6)).is_ok());
}

#[test]
fn senders_post_from_other_threads() {
    let (controller, factory) = handling(&[4]);
    controller.add_state(EAT, None).unwrap();
    take(&factory.log);

    let sender = controller.message_sender().unwrap();
    thread::spawn(move || {
        sender
            .send(
                Message::new(4).with_obj(99u64),
                MessagePolicy::Consume,
                MessageScope::CURRENT,
            )
            .unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(controller.pending_message_count().unwrap(), 1);
    assert!(messages(&factory).is_empty());
    controller.update(Duration::ZERO, None).unwrap();
    assert_eq!(messages(&factory), vec!["msg:Eat:4"]);
    assert_eq!(controller.pending_message_count().unwrap(), 0);
}

#[test]
fn queued_messages_can_be_withdrawn() {
    let (controller, factory) = handling(&[]);
    controller.add_state(EAT, None).unwrap();
    let later = Duration::from_secs(60);
    controller
        .send_message(Message::new(1).with_delay(later))
        .unwrap();
    controller
        .send_message(Message::new(2).with_delay(later))
        .unwrap();

    controller.remove_messages(1).unwrap();
    assert!(!controller.has_message(1).unwrap());
    assert!(controller.has_message(2).unwrap());

    controller.clear_messages().unwrap();
    assert_eq!(controller.pending_message_count().unwrap(), 0);
    controller.update(Duration::ZERO, None).unwrap();
    assert!(messages(&factory).is_empty());
}

struct Poster {
    log: Log,
}

impl State for Poster {
    type Param = String;

    fn name(&self) -> &str {
        "Poster"
    }

    fn on_enter(&mut self, ctx: &StateContext<String>) {
        let controller = ctx.controller().unwrap().upgrade().unwrap();
        let queued = controller.send_message(Message::new(9)).unwrap();
        self.log.borrow_mut().push(format!("posted:{queued}"));
    }

    fn on_exit(&mut self, _ctx: &StateContext<String>) {}

    fn handle_message(&mut self, _ctx: &StateContext<String>, msg: &Message) -> bool {
        self.log.borrow_mut().push(format!("msg:Poster:{}", msg.what));
        true
    }
}

#[test]
fn messages_sent_from_hooks_wait_for_update() {
    let log = Log::default();
    let state_log = Rc::clone(&log);
    let controller: Controller<String> = Controller::new();
    controller
        .set_state_factory(
            move |_: u32, _: Option<&String>| -> Option<BoxedState<String>> {
                Some(Box::new(Poster {
                    log: Rc::clone(&state_log),
                }))
            },
        )
        .unwrap();
    controller.set_parameter_merger(ReplaceMerger).unwrap();

    controller.add_state(EAT, None).unwrap();
    assert_eq!(take(&log), vec!["posted:false"]);
    assert_eq!(controller.pending_message_count().unwrap(), 1);

    controller.update(Duration::ZERO, None).unwrap();
    assert_eq!(take(&log), vec!["msg:Poster:9"]);
}

#[test]
fn update_runs_global_states_first() {
    let (controller, factory) = handling(&[]);
    controller.add_state(EAT, None).unwrap();
    controller.add_global_state(SLEEP, None).unwrap();
    take(&factory.log);

    controller.update(Duration::from_millis(16), None).unwrap();
    assert_eq!(take(&factory.log), vec!["update:Sleep", "update:Eat"]);

    controller.notify_state_update(None).unwrap();
    assert_eq!(take(&factory.log), vec!["update:Sleep", "update:Eat"]);
}

#[test]
fn disposed_controllers_reject_messages() {
    let (controller, _) = handling(&[]);
    controller.dispose().unwrap();
    assert_eq!(
        controller.send_message(Message::new(1)),
        Err(ControllerError::Disposed)
    );
}

#[test]
fn senders_stop_working_once_the_controller_is_disposed() {
    let (controller, _) = handling(&[]);
    controller
        .send_message(Message::new(2).with_delay(Duration::from_secs(60)))
        .unwrap();
    let sender = controller.message_sender().unwrap();
    let early = sender.clone();
    controller.dispose().unwrap();

    let result = thread::spawn(move || {
        early.send(Message::new(9), MessagePolicy::Consume, MessageScope::CURRENT)
    })
    .join()
    .unwrap();
    assert_eq!(result, Err(ControllerError::Disposed));
    assert_eq!(
        sender.send(Message::new(9), MessagePolicy::Broadcast, MessageScope::ALL),
        Err(ControllerError::Disposed)
    );

    assert_eq!(controller.has_message(9), Err(ControllerError::Disposed));
    assert_eq!(controller.has_message(2), Err(ControllerError::Disposed));
    assert_eq!(controller.pending_message_count(), Err(ControllerError::Disposed));
    assert_eq!(controller.clear_messages(), Err(ControllerError::Disposed));
    assert_eq!(controller.remove_messages(9), Err(ControllerError::Disposed));
    assert!(controller.obtain_message(1).is_err());
    assert!(controller.message_sender().is_err());
    assert_eq!(controller.set_team_enabled(false), Err(ControllerError::Disposed));
    assert_eq!(controller.is_team_enabled(), Err(ControllerError::Disposed));
}
