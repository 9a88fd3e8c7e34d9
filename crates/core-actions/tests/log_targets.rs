use std::sync::{Arc, Mutex};

use core_actions::{CommandStateMachine, Session};
use tracing::dispatcher::{Dispatch, with_default};
use tracing::subscriber::Interest;
use tracing::{Metadata, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;

#[derive(Clone, Default)]
struct TargetCapture {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S: Subscriber> Layer<S> for TargetCapture {
    fn register_callsite(&self, _m: &'static Metadata<'static>) -> Interest {
        Interest::always()
    }

    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events
            .lock()
            .unwrap()
            .push(event.metadata().target().to_string());
    }
}

fn targets_for(keys: &str) -> Vec<String> {
    let capture = TargetCapture::default();
    let subscriber = Registry::default().with(capture.clone().with_filter(LevelFilter::TRACE));
    let dispatch = Dispatch::new(subscriber);
    with_default(&dispatch, || {
        let mut session = Session::new().unwrap();
        let mut machine = CommandStateMachine::new();
        machine.feed_notation(&mut session, keys).unwrap();
    });
    capture.events.lock().unwrap().clone()
}

#[test]
fn dispatch_logs_under_input_machine() {
    let targets = targets_for("2dd");
    assert!(targets.iter().any(|t| t == "input.machine"), "{targets:?}");
    assert!(targets.iter().any(|t| t == "input.map"), "{targets:?}");
}

#[test]
fn ex_lines_log_parse_and_dispatch() {
    let targets = targets_for(":w<cr>");
    assert!(targets.iter().any(|t| t == "ex.parse"), "{targets:?}");
    assert!(targets.iter().any(|t| t == "ex.dispatch"), "{targets:?}");
}

#[test]
fn macros_log_under_input_macro() {
    let targets = targets_for("qaxq@a");
    assert!(targets.iter().any(|t| t == "input.macro"), "{targets:?}");
}
