//! Toast notification queue
//!
//! Toasts are shown one at a time in the order they were queued. A toast
//! stays on screen for the duration configured in the user's preferences,
//! then the slot stays empty for a short transition before the next one is
//! promoted. The queue does not spawn timers; the owner calls [`ToastQueue::poll`]
//! (for example from its event loop, at [`ToastQueue::next_deadline`]).

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::settings::{SettingsStore, ToastDurations};

/// Gap between one toast leaving and the next one appearing, in milliseconds
pub const TRANSITION_MILLIS: i64 = 350;

/// Visual style of a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Error,
}

/// A notification waiting for or occupying the toast slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub kind: ToastKind,
}

impl Toast {
    pub fn new(title: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            title: title.into(),
            kind,
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(title, ToastKind::Info)
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(title, ToastKind::Success)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(title, ToastKind::Error)
    }
}

/// Called with the promoted toast, or `None` when the slot clears
pub type ToastObserver = Box<dyn FnMut(Option<&Toast>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Showing { until: DateTime<Utc> },
    Transition { until: DateTime<Utc> },
}

/// FIFO of toasts with timed auto-dismiss
pub struct ToastQueue<C = SystemClock> {
    clock: C,
    settings: SettingsStore,
    pending: VecDeque<Toast>,
    current: Option<Toast>,
    state: State,
    observer: Option<ToastObserver>,
}

impl ToastQueue<SystemClock> {
    /// Creates a queue driven by the system clock
    pub fn with_system_clock(settings: SettingsStore) -> Self {
        Self::new(settings, SystemClock)
    }
}

impl<C: Clock> ToastQueue<C> {
    /// Creates an empty queue
    ///
    /// # Arguments
    /// * `settings` - where display durations are read from at promotion time
    /// * `clock` - time source for deadlines
    pub fn new(settings: SettingsStore, clock: C) -> Self {
        Self {
            clock,
            settings,
            pending: VecDeque::new(),
            current: None,
            state: State::Idle,
            observer: None,
        }
    }

    /// Sets the callback told about every change of the toast slot
    pub fn register_observer(&mut self, observer: ToastObserver) {
        self.observer = Some(observer);
    }

    /// Queues a toast, showing it right away if the slot is free
    pub fn enqueue(&mut self, toast: Toast) {
        debug!(title = %toast.title, kind = ?toast.kind, "queued toast");
        self.pending.push_back(toast);
        self.poll();
    }

    /// Advances the queue to the current time
    pub fn poll(&mut self) {
        let now = self.clock.now();

        loop {
            match self.state {
                State::Idle => {
                    if self.pending.is_empty() {
                        return;
                    }
                    self.promote(now);
                }
                State::Showing { until } if now >= until => {
                    self.current = None;
                    self.state = State::Transition {
                        until: until + Duration::milliseconds(TRANSITION_MILLIS),
                    };
                    self.notify();
                }
                State::Transition { until } if now >= until => {
                    if self.pending.is_empty() {
                        self.state = State::Idle;
                        return;
                    }
                    self.promote(until);
                }
                _ => return,
            }
        }
    }

    /// The toast currently on screen
    pub fn current(&self) -> Option<&Toast> {
        self.current.as_ref()
    }

    /// Toasts waiting behind the current one
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// When the next state change is due, if one is scheduled
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match self.state {
            State::Idle => None,
            State::Showing { until } | State::Transition { until } => Some(until),
        }
    }

    fn promote(&mut self, at: DateTime<Utc>) {
        let Some(toast) = self.pending.pop_front() else {
            return;
        };

        let durations = self.durations();
        let millis = match toast.kind {
            ToastKind::Error => durations.error_duration,
            ToastKind::Info | ToastKind::Success => durations.info_success_duration,
        };
        let until = i64::try_from(millis)
            .ok()
            .and_then(Duration::try_milliseconds)
            .and_then(|d| at.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.state = State::Showing { until };
        self.current = Some(toast);
        self.notify();
    }

    fn durations(&self) -> ToastDurations {
        match self.settings.preferences() {
            Ok(preferences) => preferences.toasts,
            Err(e) => {
                warn!("Falling back to default toast durations: {}", e);
                ToastDurations::default()
            }
        }
    }

    fn notify(&mut self) {
        if let Some(observer) = self.observer.as_mut() {
            observer(self.current.as_ref());
        }
    }
}
