use crate::{
    character::CharacterRecord,
    contract::{
        AttackComplete,
        RawUint,
    },
};
use std::time::{
    Duration,
    Instant,
};
use tracing::warn;

/// How long the hit cue and its toast stay visible after a confirmed attack.
pub const HIT_CUE_DURATION: Duration = Duration::from_secs(5);

/// Merges one resolution event into the cached records: the hp fields are
/// replaced with the event-carried values, everything else stays untouched.
/// Events for rounds other clients fought land here too, so either record may
/// legitimately be missing.
pub fn merge_attack_event(
    boss: Option<&mut CharacterRecord>,
    character: Option<&mut CharacterRecord>,
    event: &AttackComplete,
) {
    if let Some(boss) = boss {
        replace_hp(boss, event.new_boss_hp, "boss");
    }
    if let Some(character) = character {
        replace_hp(character, event.new_player_hp, "character");
    }
}

/// Event hp values are authoritative, including increases (out-of-band
/// resets arrive as plain overwrites). Values above the record's max are
/// clamped so the hp invariant survives anomalous payloads.
fn replace_hp(record: &mut CharacterRecord, value: RawUint, which: &str) {
    let Ok(hp) = u64::try_from(value.0) else {
        warn!(which, raw = value.0, "event hp overflows u64, ignoring");
        return;
    };
    if hp > record.max_hp {
        warn!(which, hp, max_hp = record.max_hp, "event hp above max, clamping");
        record.hp = record.max_hp;
        return;
    }
    record.hp = hp;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttackState {
    Idle,
    /// Submitted to the ledger, finality still pending.
    Submitted,
    /// Finality reached at the recorded instant; auto-returns to idle once
    /// the hit cue expires.
    Confirmed { at: Instant },
    Failed { reason: String },
}

/// The per-session attack lifecycle. One command is live at a time: the
/// submit guard turns rapid repeat submissions into no-ops instead of
/// duplicate transactions.
#[derive(Debug)]
pub struct AttackCommand {
    state: AttackState,
}

impl AttackCommand {
    pub fn new() -> Self {
        Self {
            state: AttackState::Idle,
        }
    }

    pub fn state(&self) -> &AttackState {
        &self.state
    }

    pub fn in_flight(&self) -> bool {
        matches!(self.state, AttackState::Submitted)
    }

    /// Submit guard. A fresh command starts from `Idle`, and from `Failed`
    /// (retry is explicitly user-initiated). Anything in flight or still
    /// displaying its cue stays as it is and the call reports `false`.
    pub fn try_submit(&mut self) -> bool {
        match self.state {
            AttackState::Idle | AttackState::Failed { .. } => {
                self.state = AttackState::Submitted;
                true
            }
            AttackState::Submitted | AttackState::Confirmed { .. } => false,
        }
    }

    pub fn confirm(&mut self, at: Instant) {
        if self.in_flight() {
            self.state = AttackState::Confirmed { at };
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.in_flight() {
            self.state = AttackState::Failed {
                reason: reason.into(),
            };
        }
    }

    /// Teardown path: whatever was live is superseded by a fresh idle state.
    pub fn reset(&mut self) {
        self.state = AttackState::Idle;
    }

    /// Drives the confirmed → idle auto-return once the hit cue window has
    /// passed. Returns whether the state moved.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let AttackState::Confirmed { at } = self.state
            && now.duration_since(at) >= HIT_CUE_DURATION
        {
            self.state = AttackState::Idle;
            return true;
        }
        false
    }
}

/// Time-boxed hit notification, raised on confirmation and destroyed after
/// [`HIT_CUE_DURATION`] no matter what the attack machine does next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToastSignal {
    pub message: String,
    raised_at: Instant,
}

impl ToastSignal {
    pub fn new(message: impl Into<String>, raised_at: Instant) -> Self {
        Self {
            message: message.into(),
            raised_at,
        }
    }

    pub fn raised_at(&self) -> Instant {
        self.raised_at
    }

    pub fn expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.raised_at) >= HIT_CUE_DURATION
    }
}
