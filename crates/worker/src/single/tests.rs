use std::sync::mpsc;

use strand_primitives::Subscription;

use super::*;
use crate::TaskFailureKind;

const WAIT: Duration = Duration::from_secs(5);

type Log = Arc<Mutex<Vec<&'static str>>>;

fn completions(
	dispatcher: &SingleItemDispatcher<&'static str>,
) -> (mpsc::Receiver<Completion<&'static str, ()>>, Subscription) {
	let (tx, rx) = mpsc::channel();
	let sub = dispatcher.completed().subscribe(move |completion: &Completion<&'static str, ()>| {
		let _ = tx.send(completion.clone());
	});
	(rx, sub)
}

fn record(log: &Log, name: &'static str) -> impl FnOnce() -> Result<(), String> + Send + 'static {
	let log = Arc::clone(log);
	move || {
		log.lock().push(name);
		Ok(())
	}
}

fn wait_for_state(dispatcher: &SingleItemDispatcher<&'static str>, key: &'static str, state: SlotState) {
	let deadline = Instant::now() + WAIT;
	while dispatcher.state(&key) != state {
		assert!(Instant::now() < deadline, "key {key} never reached {state:?}");
		std::thread::sleep(Duration::from_millis(2));
	}
}

#[test]
fn intermediate_submission_is_discarded() {
	let dispatcher = SingleItemDispatcher::default();
	let (rx, _sub) = completions(&dispatcher);
	let log = Log::default();
	let (gate_tx, gate_rx) = mpsc::channel::<()>();

	let slow = {
		let log = Arc::clone(&log);
		move || {
			let _ = gate_rx.recv_timeout(WAIT);
			log.lock().push("A");
			Ok(())
		}
	};
	assert_eq!(dispatcher.submit("k", slow), SubmitOutcome::Started);
	assert_eq!(dispatcher.submit("k", record(&log, "B")), SubmitOutcome::Queued);
	assert_eq!(dispatcher.submit("k", record(&log, "C")), SubmitOutcome::Replaced);
	assert_eq!(dispatcher.state(&"k"), SlotState::InFlightPending);

	gate_tx.send(()).unwrap();
	assert!(rx.recv_timeout(WAIT).unwrap().is_ok());
	assert!(rx.recv_timeout(WAIT).unwrap().is_ok());
	wait_for_state(&dispatcher, "k", SlotState::Idle);
	assert_eq!(*log.lock(), vec!["A", "C"]);
	assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn delayed_submissions_coalesce_to_latest() {
	let dispatcher = SingleItemDispatcher::default();
	let (rx, _sub) = completions(&dispatcher);
	let log = Log::default();
	let delay = Duration::from_millis(100);

	assert_eq!(dispatcher.submit_delayed("k", delay, record(&log, "1")), SubmitOutcome::Scheduled);
	assert_eq!(dispatcher.submit_delayed("k", delay, record(&log, "2")), SubmitOutcome::Replaced);
	assert_eq!(dispatcher.submit_delayed("k", delay, record(&log, "3")), SubmitOutcome::Replaced);
	assert_eq!(dispatcher.state(&"k"), SlotState::Waiting);

	assert_eq!(rx.recv_timeout(WAIT).unwrap().id, "k");
	assert!(rx.recv_timeout(Duration::from_millis(250)).is_err());
	assert_eq!(*log.lock(), vec!["3"]);
}

#[test]
fn keys_are_independent() {
	let dispatcher = SingleItemDispatcher::default();
	let (rx, _sub) = completions(&dispatcher);
	let log = Log::default();

	dispatcher.submit_delayed("a", Duration::from_millis(50), record(&log, "a"));
	dispatcher.submit_delayed("b", Duration::from_millis(50), record(&log, "b"));

	let mut done = [rx.recv_timeout(WAIT).unwrap().id, rx.recv_timeout(WAIT).unwrap().id];
	done.sort_unstable();
	assert_eq!(done, ["a", "b"]);
}

#[test]
fn cancel_drops_pending_only_and_is_idempotent() {
	let dispatcher = SingleItemDispatcher::default();
	let log = Log::default();

	dispatcher.submit_delayed("k", Duration::from_millis(30), record(&log, "never"));
	assert!(dispatcher.cancel(&"k"));
	assert!(!dispatcher.cancel(&"k"));
	assert_eq!(dispatcher.state(&"k"), SlotState::Idle);
	assert!(!dispatcher.cancel(&"unknown"));

	std::thread::sleep(Duration::from_millis(100));
	assert!(log.lock().is_empty());
}

#[test]
fn cancel_keeps_running_job() {
	let dispatcher = SingleItemDispatcher::default();
	let (rx, _sub) = completions(&dispatcher);
	let log = Log::default();
	let (gate_tx, gate_rx) = mpsc::channel::<()>();

	dispatcher.submit("k", move || {
		let _ = gate_rx.recv_timeout(WAIT);
		Ok(())
	});
	dispatcher.submit("k", record(&log, "pending"));
	assert!(dispatcher.cancel(&"k"));
	assert_eq!(dispatcher.state(&"k"), SlotState::InFlight);
	assert!(!dispatcher.cancel(&"k"));

	gate_tx.send(()).unwrap();
	assert!(rx.recv_timeout(WAIT).unwrap().is_ok());
	wait_for_state(&dispatcher, "k", SlotState::Idle);
	assert!(log.lock().is_empty());
}

#[test]
fn failures_are_delivered_and_key_recovers() {
	let dispatcher = SingleItemDispatcher::default();
	let (rx, _sub) = completions(&dispatcher);

	dispatcher.submit("k", || Err("no route".to_string()));
	let failure = rx.recv_timeout(WAIT).unwrap().outcome.unwrap_err();
	assert_eq!(failure.kind(), TaskFailureKind::Error);
	assert_eq!(failure.message(), "no route");

	wait_for_state(&dispatcher, "k", SlotState::Idle);
	dispatcher.submit("k", || panic!("job blew up"));
	let failure = rx.recv_timeout(WAIT).unwrap().outcome.unwrap_err();
	assert_eq!(failure.kind(), TaskFailureKind::Panicked);

	wait_for_state(&dispatcher, "k", SlotState::Idle);
	dispatcher.submit("k", || Ok(()));
	assert!(rx.recv_timeout(WAIT).unwrap().is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_delay_applies_to_submit() {
	let dispatcher = SingleItemDispatcher::new(DispatcherSpec::default().delay(Duration::from_millis(40)));
	let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
	let _sub = dispatcher.completed().subscribe(move |completion: &Completion<u32, ()>| {
		let _ = tx.send(completion.id);
	});

	let submitted = Instant::now();
	assert_eq!(dispatcher.submit(7, || Ok(())), SubmitOutcome::Scheduled);
	let key = tokio::time::timeout(WAIT, rx.recv()).await.unwrap();
	assert_eq!(key, Some(7));
	assert!(submitted.elapsed() >= Duration::from_millis(40));
}
