use crate::{
    contract::{
        ContractError,
        GameContract,
        RawCharacter,
        RawUint,
    },
    wallet::Address,
};
use tracing::{
    info,
    warn,
};

/// Normalized character read model. `hp` is the only field expected to move
/// after creation; everything else is carried verbatim from mint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharacterRecord {
    pub name: String,
    pub image_uri: String,
    pub hp: u64,
    pub max_hp: u64,
    pub attack_damage: u64,
    /// Connected account the record belongs to; `None` for the shared boss.
    pub owner: Option<Address>,
}

/// The boss shares the character shape but is singular and owned by no one.
pub type BossRecord = CharacterRecord;

impl CharacterRecord {
    /// Ingestion boundary: wide transport integers become native numerics
    /// here and nowhere else. An hp above max is clamped with a warning so
    /// the `0 <= hp <= max_hp` invariant holds from the first read.
    pub fn from_raw(
        raw: RawCharacter,
        owner: Option<Address>,
    ) -> Result<Self, ContractError> {
        let mut hp = narrow(raw.hp, "hp")?;
        let max_hp = narrow(raw.max_hp, "max_hp")?;
        let attack_damage = narrow(raw.attack_damage, "attack_damage")?;
        if hp > max_hp {
            warn!(name = %raw.name, hp, max_hp, "record hp above max, clamping");
            hp = max_hp;
        }
        Ok(Self {
            name: raw.name,
            image_uri: raw.image_uri,
            hp,
            max_hp,
            attack_damage,
            owner,
        })
    }
}

fn narrow(value: RawUint, field: &str) -> Result<u64, ContractError> {
    u64::try_from(value.0)
        .map_err(|_| ContractError::BadData(format!("{field} overflows u64: {}", value.0)))
}

/// Why an account has no usable character. Gameplay treats both reasons
/// identically; the split only feeds status lines and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbsentReason {
    NeverMinted,
    /// A record exists but its hp reached zero; a replacement must be minted.
    Fallen,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CharacterStatus {
    Ready(CharacterRecord),
    Absent(AbsentReason),
}

impl CharacterStatus {
    pub fn record(&self) -> Option<&CharacterRecord> {
        match self {
            CharacterStatus::Ready(record) => Some(record),
            CharacterStatus::Absent(_) => None,
        }
    }

    pub fn record_mut(&mut self) -> Option<&mut CharacterRecord> {
        match self {
            CharacterStatus::Ready(record) => Some(record),
            CharacterStatus::Absent(_) => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CharacterStatus::Absent(_))
    }
}

/// Asks the service whether `owner` holds a character and normalizes the
/// answer. Zero-hp records come back [`CharacterStatus::Absent`]: a fallen
/// character leaves gameplay until the external minting flow replaces it.
///
/// Runs once per successful bind and again on every rebind, never per poll.
pub async fn resolve_character<C: GameContract>(
    contract: &C,
    owner: Address,
) -> Result<CharacterStatus, ContractError> {
    let raw = contract.caller_character().await?;
    let Some(raw) = raw else {
        return Ok(CharacterStatus::Absent(AbsentReason::NeverMinted));
    };
    if raw.name.is_empty() {
        return Ok(CharacterStatus::Absent(AbsentReason::NeverMinted));
    }
    let record = CharacterRecord::from_raw(raw, Some(owner))?;
    if record.hp == 0 {
        info!(name = %record.name, "character has fallen, a new one must be minted");
        return Ok(CharacterStatus::Absent(AbsentReason::Fallen));
    }
    Ok(CharacterStatus::Ready(record))
}
