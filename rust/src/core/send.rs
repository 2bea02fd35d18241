// Lifecycle of the single outgoing message:
//
//   Idle -> Sending -> {Confirmed | Superseded | TimedOut | Failed} -> Idle
//
// Every send gets a token. Send results and timer firings carry the token they were
// issued for; anything that doesn't match the in-flight token is a no-op, so whichever
// of (send result, timeout, matching history entry) lands first wins and the rest are
// ignored.

use tokio::task::AbortHandle;

use super::store::MessageStore;
use crate::state::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendPhase {
    Idle,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendResolution {
    /// Send service reported success.
    Confirmed,
    /// A matching user message showed up in history first.
    Superseded,
    TimedOut,
    Failed,
    /// Conversation was cleared while the send was outstanding.
    Cleared,
}

impl SendResolution {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Superseded => "superseded",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
            Self::Cleared => "cleared",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BeginRejected {
    Blank,
    AlreadySending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SendTicket {
    pub(crate) token: u64,
    pub(crate) epoch: u64,
    pub(crate) content: String,
}

#[derive(Debug)]
struct InFlight {
    token: u64,
    timer: Option<AbortHandle>,
}

#[derive(Debug, Default)]
pub(crate) struct SendCoordinator {
    next_token: u64,
    in_flight: Option<InFlight>,
    last_resolved: Option<(u64, SendResolution)>,
}

impl SendCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn phase(&self) -> SendPhase {
        if self.in_flight.is_some() {
            SendPhase::Sending
        } else {
            SendPhase::Idle
        }
    }

    pub(crate) fn in_flight_token(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.token)
    }

    pub(crate) fn last_resolution_for(&self, token: u64) -> Option<SendResolution> {
        match self.last_resolved {
            Some((t, r)) if t == token => Some(r),
            _ => None,
        }
    }

    /// Idle -> Sending. Installs the optimistic message in the store. The caller then arms
    /// the timeout (`arm_timer`) and dispatches the send.
    pub(crate) fn begin(
        &mut self,
        content: &str,
        now_ms: i64,
        store: &mut MessageStore,
    ) -> Result<SendTicket, BeginRejected> {
        let content = content.trim();
        if content.is_empty() {
            return Err(BeginRejected::Blank);
        }
        if self.in_flight.is_some() {
            return Err(BeginRejected::AlreadySending);
        }
        let epoch = store.epoch();
        store
            .set_pending_in_epoch(ChatMessage::pending(content, now_ms), epoch)
            .map_err(|_| BeginRejected::AlreadySending)?;

        self.next_token = self.next_token.wrapping_add(1);
        let token = self.next_token;
        self.in_flight = Some(InFlight { token, timer: None });
        Ok(SendTicket {
            token,
            epoch,
            content: content.to_string(),
        })
    }

    /// Attach the timeout task for `token`. A timer for a send that already resolved is
    /// aborted straight away.
    pub(crate) fn arm_timer(&mut self, token: u64, timer: AbortHandle) {
        match self.in_flight.as_mut() {
            Some(f) if f.token == token => {
                if let Some(old) = f.timer.replace(timer) {
                    old.abort();
                }
            }
            _ => timer.abort(),
        }
    }

    /// Send service resolved. Returns the resolution if `token` was still in flight.
    pub(crate) fn on_send_result(
        &mut self,
        token: u64,
        ok: bool,
        store: &mut MessageStore,
    ) -> Option<SendResolution> {
        let resolution = if ok {
            SendResolution::Confirmed
        } else {
            SendResolution::Failed
        };
        self.resolve_if_current(token, resolution, store)
    }

    pub(crate) fn on_timeout(
        &mut self,
        token: u64,
        store: &mut MessageStore,
    ) -> Option<SendResolution> {
        self.resolve_if_current(token, SendResolution::TimedOut, store)
    }

    /// Race path: run after every history change. Retires the pending message as soon as
    /// history holds its confirmed copy, whether or not the send call has returned.
    pub(crate) fn reconcile(&mut self, store: &mut MessageStore) -> Option<SendResolution> {
        if !store.supersedes_pending() {
            return None;
        }
        store.clear_pending();
        if let Some(f) = self.in_flight.take() {
            if let Some(timer) = f.timer {
                timer.abort();
            }
            self.last_resolved = Some((f.token, SendResolution::Superseded));
        }
        Some(SendResolution::Superseded)
    }

    /// Conversation cleared: drop all send bookkeeping regardless of phase.
    pub(crate) fn reset(&mut self, store: &mut MessageStore) -> Option<SendResolution> {
        store.clear_pending();
        let f = self.in_flight.take()?;
        if let Some(timer) = f.timer {
            timer.abort();
        }
        self.last_resolved = Some((f.token, SendResolution::Cleared));
        Some(SendResolution::Cleared)
    }

    fn resolve_if_current(
        &mut self,
        token: u64,
        resolution: SendResolution,
        store: &mut MessageStore,
    ) -> Option<SendResolution> {
        if self.in_flight_token() != Some(token) {
            return None;
        }
        if let Some(f) = self.in_flight.take() {
            if let Some(timer) = f.timer {
                timer.abort();
            }
        }
        store.clear_pending();
        self.last_resolved = Some((token, resolution));
        Some(resolution)
    }
}
