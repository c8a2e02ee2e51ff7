//! Per-intent runtime state.

use preranker_types::Intent;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

const ACCEPTING: u8 = 0;
const FLUSHING: u8 = 1;
const TERMINATED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentState {
	Accepting,
	Flushing,
	Terminated,
}

/// State of one active intent.
///
/// Record commits and the flush both take `gate`, which serialises writes
/// against the flush's read of the passed set. The lifecycle state advances
/// through a CAS so exactly one caller wins the ACCEPTING -> FLUSHING edge.
pub struct IntentContext {
	pub intent: Intent,
	pub window_end_ms: u64,
	state: AtomicU8,
	pub passed_count: AtomicU64,
	pub failed_count: AtomicU64,
	pub gate: AsyncMutex<()>,
	timer: Mutex<Option<JoinHandle<()>>>,
}

impl IntentContext {
	pub fn new(intent: Intent) -> Self {
		let window_end_ms = intent.window_end_ms;
		Self {
			intent,
			window_end_ms,
			state: AtomicU8::new(ACCEPTING),
			passed_count: AtomicU64::new(0),
			failed_count: AtomicU64::new(0),
			gate: AsyncMutex::new(()),
			timer: Mutex::new(None),
		}
	}

	pub fn state(&self) -> IntentState {
		match self.state.load(Ordering::Acquire) {
			ACCEPTING => IntentState::Accepting,
			FLUSHING => IntentState::Flushing,
			_ => IntentState::Terminated,
		}
	}

	pub fn is_accepting(&self) -> bool {
		self.state.load(Ordering::Acquire) == ACCEPTING
	}

	/// Close the gate for new results. Returns true for exactly one caller.
	pub fn begin_flush(&self) -> bool {
		self.state
			.compare_exchange(ACCEPTING, FLUSHING, Ordering::AcqRel, Ordering::Acquire)
			.is_ok()
	}

	pub fn terminate(&self) {
		self.state.store(TERMINATED, Ordering::Release);
		self.cancel_timer();
	}

	/// Install the window-close timer task, replacing any previous one.
	pub fn set_timer(&self, handle: JoinHandle<()>) {
		let mut timer = self.timer.lock().expect("timer lock poisoned");
		if let Some(old) = timer.replace(handle) {
			old.abort();
		}
	}

	pub fn cancel_timer(&self) {
		if let Some(handle) = self.timer.lock().expect("timer lock poisoned").take() {
			handle.abort();
		}
	}
}

impl Drop for IntentContext {
	fn drop(&mut self) {
		self.cancel_timer();
	}
}
