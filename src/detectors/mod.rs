//! Motion detectors and their change state machine.
//!
//! A detector starts `Uninitialized`. Every [`MotionDetector::send`] compares
//! the new reading with the last one; the first reading always counts as a
//! change, after that only a different value does. Repeated identical
//! readings are silent.
//!
//! Changes are pushed to the environment that registered the detector
//! through its change listener. Hardware-bound variants (PIR) can also be
//! driven by a [`PinSource`](crate::input::PinSource), see
//! [`MotionDetector::start_monitoring`].

pub mod monitor;

pub use monitor::Monitor;

use crate::environment::WeakEnvironment;
use log::debug;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::fmt;
use std::sync::Arc;

/// One motion sample. `0` means no motion, anything else means motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reading(i64);

impl Reading {
    pub const NO_MOTION: Reading = Reading(0);
    pub const MOTION: Reading = Reading(1);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_motion(&self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Reading {
    fn from(level: bool) -> Self {
        if level { Self::MOTION } else { Self::NO_MOTION }
    }
}

impl From<i64> for Reading {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for Reading {
    fn from(value: i32) -> Self {
        Self(value.into())
    }
}

impl From<u8> for Reading {
    fn from(value: u8) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Detector variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    /// Fed only through `send`.
    Synthetic,
    /// Passive infrared sensor on a GPIO pin.
    Pir { pin: u8 },
}

impl DetectorKind {
    pub fn pin(&self) -> Option<u8> {
        match self {
            Self::Synthetic => None,
            Self::Pir { pin } => Some(*pin),
        }
    }

    pub fn is_hardware_bound(&self) -> bool {
        self.pin().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DetectorPhase {
    Uninitialized,
    Monitoring,
}

/// Callback receiving every change of a detector.
pub type ChangeListener = Arc<dyn Fn(&MotionDetector, Reading) + Send + Sync>;

#[derive(Debug)]
struct DetectorState {
    last: Option<Reading>,
    previous: Option<Reading>,
    phase: DetectorPhase,
}

struct DetectorInner {
    id: u64,
    name: String,
    kind: DetectorKind,
    state: Mutex<DetectorState>,
    /// Held from the state update until the listener returns, so changes of
    /// one detector reach notifiers in the order they were recorded.
    dispatch: ReentrantMutex<()>,
    listener: RwLock<Option<ChangeListener>>,
    owner: RwLock<Option<WeakEnvironment>>,
}

/// Shared handle to a motion detector.
///
/// Cloning yields another handle to the same detector, so a hardware monitor
/// task and the caller can both feed it.
#[derive(Clone)]
pub struct MotionDetector {
    inner: Arc<DetectorInner>,
}

impl MotionDetector {
    /// Build a detector. Only the engine calls this, since it owns the
    /// construction count and the environment check for hardware variants.
    pub(crate) fn new(id: u64, kind: DetectorKind, name: Option<String>) -> Self {
        let name = name.unwrap_or_else(|| match kind {
            DetectorKind::Synthetic => format!("Motion Detector #{}", id),
            DetectorKind::Pir { pin } => format!("PIR Motion Detector (pin {})", pin),
        });
        Self {
            inner: Arc::new(DetectorInner {
                id,
                name,
                kind,
                state: Mutex::new(DetectorState {
                    last: None,
                    previous: None,
                    phase: DetectorPhase::Uninitialized,
                }),
                dispatch: ReentrantMutex::new(()),
                listener: RwLock::new(None),
                owner: RwLock::new(None),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> DetectorKind {
        self.inner.kind
    }

    pub fn pin(&self) -> Option<u8> {
        self.inner.kind.pin()
    }

    pub fn phase(&self) -> DetectorPhase {
        self.inner.state.lock().phase
    }

    pub fn last_reading(&self) -> Option<Reading> {
        self.inner.state.lock().last
    }

    pub fn previous_reading(&self) -> Option<Reading> {
        self.inner.state.lock().previous
    }

    /// Feed a reading. Returns `true` if it was a change.
    ///
    /// The change is forwarded to the listener after the state lock is
    /// released, so listeners may read the detector freely. Concurrent
    /// callers are serialised: a second `send` waits until the listener of
    /// the first has returned.
    pub fn send(&self, reading: impl Into<Reading>) -> bool {
        let reading = reading.into();
        let _dispatch = self.inner.dispatch.lock();
        {
            let mut state = self.inner.state.lock();
            if state.last == Some(reading) {
                debug!("{}: reading {} unchanged", self.inner.name, reading);
                return false;
            }
            state.previous = state.last.replace(reading);
            state.phase = DetectorPhase::Monitoring;
        }

        debug!("{}: change to {}", self.inner.name, reading);
        let listener = self.inner.listener.read().clone();
        if let Some(listener) = listener {
            listener(self, reading);
        }
        true
    }

    /// Route future changes to `listener`, replacing any previous one.
    pub(crate) fn set_listener(&self, listener: ChangeListener) {
        *self.inner.listener.write() = Some(listener);
    }

    /// Attach the detector to `owner` with the listener feeding it.
    ///
    /// Returns the environment it was attached to before, if any.
    pub(crate) fn attach(
        &self,
        owner: WeakEnvironment,
        listener: ChangeListener,
    ) -> Option<WeakEnvironment> {
        let previous = self.inner.owner.write().replace(owner);
        self.set_listener(listener);
        previous
    }

    pub fn has_listener(&self) -> bool {
        self.inner.listener.read().is_some()
    }

    /// Whether both handles point at the same detector.
    pub fn same_as(&self, other: &MotionDetector) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MotionDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionDetector")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}
