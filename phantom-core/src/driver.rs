//! The session driver: load, transition, persist.
//!
//! `SessionDriver::drive` is the single operation callers use. It loads the
//! session's checkpoint, applies the supplied action through the
//! `PhaseMachine`, saves the result together with its suspend point and
//! returns a redacted `GameView`.

use crate::action::Action;
use crate::phase::{PhaseMachine, TransitionError};
use crate::state::SuspendPoint;
use crate::store::{SessionStore, StoreError};
use crate::view::GameView;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Errors surfaced by `drive`.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("no living participant named '{0}'")]
    InvalidTarget(String),

    #[error("the game is over; no further actions are accepted")]
    SessionTerminated,

    #[error("unknown session: {0}")]
    SessionNotFound(String),

    #[error("session {0} is already being driven; retry after the current call")]
    ConcurrentAccess(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl DriveError {
    /// Whether the caller caused the failure (a 4xx-style response).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DriveError::InvalidTarget(_)
                | DriveError::SessionTerminated
                | DriveError::SessionNotFound(_)
        )
    }
}

impl From<TransitionError> for DriveError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::InvalidTarget(name) => DriveError::InvalidTarget(name),
            TransitionError::SessionTerminated => DriveError::SessionTerminated,
        }
    }
}

impl From<StoreError> for DriveError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { session_id, .. } | StoreError::Locked(session_id) => {
                DriveError::ConcurrentAccess(session_id)
            }
            other => DriveError::Store(other),
        }
    }
}

type LockRegistry = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Held for the duration of one drive. Dropping it releases the session and
/// removes its registry entry once nobody else refers to it.
struct SessionLease<'a> {
    registry: &'a LockRegistry,
    session_id: &'a str,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        let mut locks = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.guard.take();
        let idle = locks
            .get(self.session_id)
            .map(|lock| Arc::strong_count(lock) == 1)
            .unwrap_or(false);
        if idle {
            locks.remove(self.session_id);
        }
    }
}

/// A fresh random session id.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Runs sessions against a store.
pub struct SessionDriver {
    machine: PhaseMachine,
    store: Arc<dyn SessionStore>,
    locks: LockRegistry,
    seed: Option<u64>,
}

impl SessionDriver {
    pub fn new(machine: PhaseMachine, store: Arc<dyn SessionStore>) -> Self {
        Self {
            machine,
            store,
            locks: StdMutex::new(HashMap::new()),
            seed: None,
        }
    }

    /// Seed the Setup draw so new sessions are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn machine(&self) -> &PhaseMachine {
        &self.machine
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Take the session's lock, or fail if a drive on it is in flight.
    fn acquire<'a>(&'a self, session_id: &'a str) -> Result<SessionLease<'a>, DriveError> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let lock = locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock
            .try_lock_owned()
            .map_err(|_| DriveError::ConcurrentAccess(session_id.to_string()))?;
        Ok(SessionLease {
            registry: &self.locks,
            session_id,
            guard: Some(guard),
        })
    }

    fn setup_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Advance a session by one action.
    ///
    /// With no record for `session_id`, `None` or `Start` runs Setup and any
    /// other action fails with `SessionNotFound`. With a record, `None`
    /// resolves a pending night and otherwise just returns the current view.
    pub async fn drive(
        &self,
        session_id: &str,
        action: Option<Action>,
    ) -> Result<GameView, DriveError> {
        let _lease = self.acquire(session_id)?;

        debug!(
            session_id,
            action = action.as_ref().map(Action::name).unwrap_or("none"),
            "Driving session"
        );

        let Some(record) = self.store.load(session_id).await? else {
            return match action {
                None | Some(Action::Start) => self.start(session_id).await,
                Some(_) => Err(DriveError::SessionNotFound(session_id.to_string())),
            };
        };

        let state = record.state;
        let transition = match action {
            None if record.suspend_point == SuspendPoint::NightPending => {
                self.machine.resolve_night(state).await
            }
            None => return Ok(GameView::new(session_id, &state)),
            Some(action) => self.machine.apply(state, action).await?,
        };

        if !transition.changed {
            return Ok(GameView::new(session_id, &transition.state));
        }

        let mut state = transition.state;
        state.revision += 1;
        self.store
            .save(session_id, &state, &transition.suspend_point)
            .await?;

        if state.is_finished() {
            info!(session_id, result = ?state.game_result, "Session finished");
        }
        Ok(GameView::new(session_id, &state))
    }

    async fn start(&self, session_id: &str) -> Result<GameView, DriveError> {
        let mut rng = self.setup_rng();
        let transition = self.machine.setup(&mut rng);
        let mut state = transition.state;
        state.revision = 1;
        self.store
            .save(session_id, &state, &transition.suspend_point)
            .await?;
        info!(session_id, "Session created");
        Ok(GameView::new(session_id, &state))
    }

    /// Current view of a session without applying anything.
    pub async fn view(&self, session_id: &str) -> Result<GameView, DriveError> {
        match self.store.load(session_id).await? {
            Some(record) => Ok(GameView::new(session_id, &record.state)),
            None => Err(DriveError::SessionNotFound(session_id.to_string())),
        }
    }
}
