#![allow(dead_code)]

pub mod http_server;
pub mod scripted_engine;

use std::cell::RefCell;
use std::rc::Rc;

use fetchq_core::{FetchEvent, FetchId, Scheduler, TransferEngine};

/// Shared log of `(label, event)` pairs in delivery order.
pub type EventLog = Rc<RefCell<Vec<(String, String)>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Event text used in assertions: like the `Display` form, but DATA shows
/// the chunk itself.
pub fn describe(event: &FetchEvent<'_>) -> String {
    match event {
        FetchEvent::Data(chunk) => format!("DATA {}", String::from_utf8_lossy(chunk)),
        other => other.to_string(),
    }
}

/// Callback that appends every event it receives to `log` under `label`.
pub fn recorder<E: TransferEngine + 'static>(
    log: &EventLog,
    label: &str,
) -> impl FnMut(&mut Scheduler<E>, FetchId, FetchEvent<'_>) + 'static {
    let log = Rc::clone(log);
    let label = label.to_string();
    move |_: &mut Scheduler<E>, _: FetchId, event: FetchEvent<'_>| {
        log.borrow_mut().push((label.clone(), describe(&event)))
    }
}

/// Events recorded for `label`, in order.
pub fn events_for(log: &EventLog, label: &str) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|(l, _)| l == label)
        .map(|(_, e)| e.clone())
        .collect()
}

/// Polls until nothing is outstanding. Panics if that takes unreasonably long.
pub fn run_until_idle<E: TransferEngine>(scheduler: &mut Scheduler<E>) {
    for _ in 0..1000 {
        scheduler.poll();
        if !scheduler.is_active() {
            return;
        }
        scheduler
            .wait(std::time::Duration::from_millis(10))
            .expect("engine wait");
    }
    panic!("scheduler still active after 1000 polls");
}
