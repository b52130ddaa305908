use crate::config::SessionConfig;
use crate::error::Error;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A live connection to a remote enumeration service.
pub trait RemoteSession {
    fn is_open(&self) -> bool;
    /// Release the connection. Called exactly once before the session is dropped.
    fn close(&mut self);
}

/// Performs the remote handshake that yields a new session.
pub trait Connector {
    type Session: RemoteSession;

    fn connect(&mut self) -> Result<Self::Session, Error>;
}

/// Time source for session ageing and back-off sleeps.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Expiring,
    Failed,
}

/// Keeps exactly one session alive across a long enumeration loop, renewing
/// it before the provider's lifetime limit and retrying failed handshakes a
/// bounded number of times.
pub struct SessionManager<C: Connector, K: Clock = SystemClock> {
    connector: C,
    clock: K,
    policy: SessionConfig,
    state: SessionState,
    session: Option<C::Session>,
    connected_at: Option<Instant>,
    consecutive_failures: u32,
    last_error: Option<String>,
}

impl<C: Connector> SessionManager<C, SystemClock> {
    pub fn new(connector: C, policy: SessionConfig) -> Self {
        Self::with_clock(connector, policy, SystemClock)
    }
}

impl<C: Connector, K: Clock> SessionManager<C, K> {
    pub fn with_clock(connector: C, policy: SessionConfig, clock: K) -> Self {
        Self {
            connector,
            clock,
            policy,
            state: SessionState::Disconnected,
            session: None,
            connected_at: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn connected_at(&self) -> Option<Instant> {
        self.connected_at
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Return a session that is open and younger than the age limit,
    /// reconnecting first when needed. Call before every remote operation.
    pub fn ensure_healthy_session(&mut self) -> Result<&mut C::Session, Error> {
        match self.state {
            SessionState::Failed => return Err(self.terminal_error()),
            SessionState::Disconnected | SessionState::Connecting => self.connect()?,
            SessionState::Connected | SessionState::Expiring => {
                let open = self.session.as_ref().is_some_and(|s| s.is_open());
                if !open {
                    warn!("Session is no longer open, re-establishing");
                    self.teardown();
                    self.connect()?;
                } else if self.session_age() > self.policy.max_session_age() {
                    info!(
                        "Session age {}s exceeds {}s, renewing",
                        self.session_age().as_secs(),
                        self.policy.max_session_secs
                    );
                    self.state = SessionState::Expiring;
                    self.renew()?;
                }
            }
        }

        self.session.as_mut().ok_or_else(|| Error::SessionFailed {
            attempts: 0,
            last_error: "no session after connect".to_string(),
        })
    }

    /// Tear down the current session and establish a fresh one.
    pub fn invalidate_and_reconnect(&mut self) -> Result<(), Error> {
        if self.state == SessionState::Failed {
            return Err(self.terminal_error());
        }
        self.renew()
    }

    /// Close the live session, if any.
    pub fn shutdown(&mut self) {
        self.teardown();
        if self.state != SessionState::Failed {
            self.state = SessionState::Disconnected;
        }
    }

    fn renew(&mut self) -> Result<(), Error> {
        self.teardown();
        let backoff = self.policy.reconnect_backoff();
        debug!("Waiting {}s before reconnecting", backoff.as_secs());
        self.clock.sleep(backoff);
        self.connect()
    }

    fn connect(&mut self) -> Result<(), Error> {
        self.state = SessionState::Connecting;
        loop {
            match self.connector.connect() {
                Ok(session) => {
                    self.session = Some(session);
                    self.connected_at = Some(self.clock.now());
                    self.consecutive_failures = 0;
                    self.last_error = None;
                    self.state = SessionState::Connected;
                    debug!("Session established");
                    return Ok(());
                }
                Err(err) => {
                    self.consecutive_failures += 1;
                    self.last_error = Some(err.to_string());
                    if err.is_permanent()
                        || self.consecutive_failures >= self.policy.max_consecutive_failures
                    {
                        self.state = SessionState::Failed;
                        return Err(self.terminal_error());
                    }
                    warn!(
                        "Session handshake failed (attempt {} of {}): {}; retrying in {}s",
                        self.consecutive_failures,
                        self.policy.max_consecutive_failures,
                        err,
                        self.policy.retry_delay_secs
                    );
                    self.clock.sleep(self.policy.retry_delay());
                }
            }
        }
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.connected_at = None;
    }

    fn session_age(&self) -> Duration {
        self.connected_at
            .map(|start| self.clock.now().saturating_duration_since(start))
            .unwrap_or_default()
    }

    fn terminal_error(&self) -> Error {
        Error::SessionFailed {
            attempts: self.consecutive_failures,
            last_error: self
                .last_error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        }
    }
}

impl<C: Connector, K: Clock> Drop for SessionManager<C, K> {
    fn drop(&mut self) {
        self.teardown();
    }
}
