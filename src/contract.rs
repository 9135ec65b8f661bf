use crate::wallet::{
    Address,
    ReadyConnection,
};
use std::fmt;

/// Wide unsigned integer as delivered by the ledger transport. Narrowed to
/// native width exactly once, at the record ingestion boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawUint(pub u128);

impl From<u64> for RawUint {
    fn from(value: u64) -> Self {
        Self(value as u128)
    }
}

/// Character record in the shape the remote service returns it. A record
/// with an empty name is the service's way of saying "nothing minted".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawCharacter {
    pub name: String,
    pub image_uri: String,
    pub hp: RawUint,
    pub max_hp: RawUint,
    pub attack_damage: RawUint,
}

/// Combat resolution event fanned out by the service after any client's
/// attack settles, carrying the post-round hp of the boss and the attacker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttackComplete {
    pub new_boss_hp: RawUint,
    pub new_player_hp: RawUint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractError {
    /// The user dismissed the transaction prompt.
    Rejected,
    /// The ledger rejected execution.
    Reverted(String),
    Transport(String),
    /// The service answered with data the client cannot normalize.
    BadData(String),
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractError::Rejected => write!(f, "transaction rejected by user"),
            ContractError::Reverted(msg) => write!(f, "execution reverted: {msg}"),
            ContractError::Transport(msg) => write!(f, "ledger transport error: {msg}"),
            ContractError::BadData(msg) => write!(f, "malformed ledger data: {msg}"),
        }
    }
}

impl std::error::Error for ContractError {}

/// Submitted transaction awaiting finality.
pub trait PendingAttack {
    fn confirmed(self) -> impl Future<Output = Result<(), ContractError>> + Send;
}

/// Scoped subscription to the service's attack-resolution stream. The stream
/// is not restartable; dropping it without [`close`](Self::close) leaks the
/// registration on the service side.
pub trait AttackEvents {
    fn next(&mut self) -> impl Future<Output = Option<AttackComplete>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Account-bound surface of the remote game service. Instances are cheap to
/// clone so spawned work can carry its own copy.
pub trait GameContract: Clone + Send + Sync + 'static {
    type Pending: PendingAttack + Send + 'static;
    type Events: AttackEvents + Send + 'static;

    fn caller_character(
        &self,
    ) -> impl Future<Output = Result<Option<RawCharacter>, ContractError>> + Send;

    fn big_boss(
        &self,
    ) -> impl Future<Output = Result<RawCharacter, ContractError>> + Send;

    fn attack_boss(
        &self,
    ) -> impl Future<Output = Result<Self::Pending, ContractError>> + Send;

    fn subscribe_attacks(
        &self,
    ) -> impl Future<Output = Result<Self::Events, ContractError>> + Send;
}

/// Local construction seam for account-bound service instances. No network
/// round trip happens here.
pub trait ContractConnector {
    type Contract: GameContract;

    fn connect(&self, account: &Address) -> Self::Contract;
}

/// Identity of one handle incarnation; the key stale background results are
/// filtered by after an account or network change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl HandleId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Authenticated capability for one (provider, account) pair. Rebuilt with a
/// fresh identity whenever the connection changes; never shared across
/// accounts.
pub struct ContractHandle<C> {
    id: HandleId,
    account: Address,
    contract: C,
}

impl<C: GameContract> ContractHandle<C> {
    /// Binding only accepts a [`ReadyConnection`], so an absent account or a
    /// wrong network cannot reach this point.
    pub fn bind<K>(connector: &K, connection: &ReadyConnection, id: HandleId) -> Self
    where
        K: ContractConnector<Contract = C>,
    {
        let contract = connector.connect(&connection.account);
        Self {
            id,
            account: connection.account,
            contract,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }
}
