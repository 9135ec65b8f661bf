use crate::{
    contract::{
        AttackComplete,
        AttackEvents,
        ContractConnector,
        ContractError,
        GameContract,
        PendingAttack,
        RawCharacter,
        RawUint,
    },
    wallet::{
        Address,
        ChainId,
        ProviderError,
        WalletProvider,
    },
};
use rand::Rng;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::info;

/// Chain the simulated wallet sits on unless configured otherwise.
pub const DEFAULT_CHAIN_ID: ChainId = ChainId::new(4);

/// A character as the simulated ledger stores it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerCharacter {
    pub name: String,
    pub image_uri: String,
    pub hp: u64,
    pub max_hp: u64,
    pub attack_damage: u64,
}

impl LedgerCharacter {
    pub fn new(
        name: impl Into<String>,
        image_uri: impl Into<String>,
        hp: u64,
        attack_damage: u64,
    ) -> Self {
        Self {
            name: name.into(),
            image_uri: image_uri.into(),
            hp,
            max_hp: hp,
            attack_damage,
        }
    }

    fn to_raw(&self) -> RawCharacter {
        RawCharacter {
            name: self.name.clone(),
            image_uri: self.image_uri.clone(),
            hp: RawUint(u128::from(self.hp)),
            max_hp: RawUint(u128::from(self.max_hp)),
            attack_damage: RawUint(u128::from(self.attack_damage)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LocalConfig {
    pub chain_id: ChainId,
    /// Confirmation wait before an attack settles. Zero in tests; the demo
    /// binary sets something human-visible.
    pub latency: Duration,
    pub boss: LedgerCharacter,
    pub roster: Vec<LedgerCharacter>,
}

impl LocalConfig {
    /// The deployment the original game shipped with.
    pub fn seeded() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            latency: Duration::ZERO,
            boss: LedgerCharacter::new(
                "Darth Vader",
                "https://i.imgur.com/zsEQWXH.jpeg",
                10000,
                50,
            ),
            roster: vec![
                LedgerCharacter::new(
                    "Han Solo",
                    "https://i.imgur.com/TqNFDMU.jpeg",
                    100,
                    100,
                ),
                LedgerCharacter::new(
                    "Chewbacca",
                    "https://i.imgur.com/b8Xw46P.jpeg",
                    200,
                    50,
                ),
                LedgerCharacter::new(
                    "Luke SkyWalker",
                    "https://i.imgur.com/bjNgTne.jpeg",
                    300,
                    25,
                ),
            ],
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self::seeded()
    }
}

/// Tallies of remote calls the simulation has served, for asserting that
/// gated states issue none.
#[derive(Clone, Copy, Debug, Default)]
pub struct CallCounters {
    pub character_fetches: u64,
    pub boss_fetches: u64,
    pub attacks: u64,
    pub subscribes: u64,
}

struct LedgerState {
    chain_id: ChainId,
    authorized: Vec<Address>,
    grantable: Vec<Address>,
    reject_next_access: bool,
    contract_address: Address,
    boss: LedgerCharacter,
    roster: Vec<LedgerCharacter>,
    characters: HashMap<Address, LedgerCharacter>,
    subscribers: Vec<(u64, mpsc::UnboundedSender<AttackComplete>)>,
    next_subscriber: u64,
    counters: CallCounters,
    latency: Duration,
    reject_next_attack: bool,
    revert_next_attack: Option<String>,
    rounds: u64,
}

/// In-process wallet-and-ledger pair: one shared state serves the provider,
/// the per-account contract instances and the event fan-out. Clones share
/// the state, so a test or the demo binary can script it from outside while
/// a session runs against it.
#[derive(Clone)]
pub struct LocalChain {
    state: Arc<Mutex<LedgerState>>,
}

impl LocalChain {
    pub fn launch(config: LocalConfig) -> Self {
        let contract_address = Address::from_bytes(rand::rng().random::<[u8; 20]>());
        info!(
            chain = %config.chain_id,
            contract = %contract_address,
            boss = %config.boss.name,
            "simulated ledger launched",
        );
        let state = LedgerState {
            chain_id: config.chain_id,
            authorized: Vec::new(),
            grantable: Vec::new(),
            reject_next_access: false,
            contract_address,
            boss: config.boss,
            roster: config.roster,
            characters: HashMap::new(),
            subscribers: Vec::new(),
            next_subscriber: 0,
            counters: CallCounters::default(),
            latency: config.latency,
            reject_next_attack: false,
            revert_next_attack: None,
            rounds: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn provider(&self) -> LocalProvider {
        LocalProvider {
            state: self.state.clone(),
        }
    }

    pub fn connector(&self) -> LocalConnector {
        LocalConnector {
            state: self.state.clone(),
        }
    }

    pub fn contract_address(&self) -> Address {
        self.state.lock().unwrap().contract_address
    }

    pub fn boss(&self) -> LedgerCharacter {
        self.state.lock().unwrap().boss.clone()
    }

    pub fn roster(&self) -> Vec<LedgerCharacter> {
        self.state.lock().unwrap().roster.clone()
    }

    pub fn counters(&self) -> CallCounters {
        self.state.lock().unwrap().counters
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().unwrap().subscribers.len()
    }

    /// Mints the roster entry at `index` to `owner`, replacing whatever
    /// record the account held before.
    pub fn mint(&self, owner: Address, index: usize) -> Result<LedgerCharacter, ContractError> {
        let mut state = self.state.lock().unwrap();
        let Some(minted) = state.roster.get(index).cloned() else {
            return Err(ContractError::Reverted(format!(
                "no recruit at roster index {index}"
            )));
        };
        info!(owner = %owner, name = %minted.name, "character minted");
        state.characters.insert(owner, minted.clone());
        Ok(minted)
    }

    /// Writes a record directly, bypassing the roster. Lets tests seed
    /// states `mint` cannot produce, a fallen character in particular.
    pub fn seed_character(&self, owner: Address, character: LedgerCharacter) {
        self.state.lock().unwrap().characters.insert(owner, character);
    }

    pub fn set_chain_id(&self, chain_id: ChainId) {
        self.state.lock().unwrap().chain_id = chain_id;
    }

    /// Replaces the set of accounts the silent probe sees.
    pub fn set_authorized(&self, accounts: &[Address]) {
        self.state.lock().unwrap().authorized = accounts.to_vec();
    }

    /// Accounts a `request_access` prompt would grant.
    pub fn allow_grant(&self, accounts: &[Address]) {
        self.state.lock().unwrap().grantable = accounts.to_vec();
    }

    /// The next `request_access` call fails as dismissed-by-user.
    pub fn script_access_rejection(&self) {
        self.state.lock().unwrap().reject_next_access = true;
    }

    /// The next `attack_boss` call fails as dismissed-by-user.
    pub fn script_attack_rejection(&self) {
        self.state.lock().unwrap().reject_next_attack = true;
    }

    /// The next attack submits fine but reverts at finality with `reason`.
    pub fn script_attack_revert(&self, reason: impl Into<String>) {
        self.state.lock().unwrap().revert_next_attack = Some(reason.into());
    }

    /// Delivers an event to every live subscriber without running a round,
    /// standing in for an attack resolved for some other client.
    pub fn broadcast_attack(&self, event: AttackComplete) {
        let mut state = self.state.lock().unwrap();
        state.subscribers.retain(|(_, tx)| tx.send(event).is_ok());
    }

    /// Severs every subscription from the service side; each open stream
    /// ends on its next read.
    pub fn drop_subscribers(&self) {
        self.state.lock().unwrap().subscribers.clear();
    }
}

#[derive(Clone)]
pub struct LocalProvider {
    state: Arc<Mutex<LedgerState>>,
}

impl WalletProvider for LocalProvider {
    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn authorized_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(self.state.lock().unwrap().authorized.clone())
    }

    async fn request_access(&self) -> Result<Vec<Address>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.reject_next_access {
            state.reject_next_access = false;
            return Err(ProviderError::Rejected);
        }
        let granted: Vec<Address> = state.grantable.drain(..).collect();
        for account in granted {
            if !state.authorized.contains(&account) {
                state.authorized.push(account);
            }
        }
        Ok(state.authorized.clone())
    }
}

#[derive(Clone)]
pub struct LocalContract {
    account: Address,
    state: Arc<Mutex<LedgerState>>,
}

impl GameContract for LocalContract {
    type Pending = LocalPending;
    type Events = LocalEvents;

    async fn caller_character(&self) -> Result<Option<RawCharacter>, ContractError> {
        let mut state = self.state.lock().unwrap();
        state.counters.character_fetches += 1;
        Ok(state.characters.get(&self.account).map(LedgerCharacter::to_raw))
    }

    async fn big_boss(&self) -> Result<RawCharacter, ContractError> {
        let mut state = self.state.lock().unwrap();
        state.counters.boss_fetches += 1;
        Ok(state.boss.to_raw())
    }

    async fn attack_boss(&self) -> Result<Self::Pending, ContractError> {
        let mut state = self.state.lock().unwrap();
        state.counters.attacks += 1;
        if state.reject_next_attack {
            state.reject_next_attack = false;
            info!(account = %self.account, "attack prompt dismissed");
            return Err(ContractError::Rejected);
        }
        Ok(LocalPending {
            account: self.account,
            latency: state.latency,
            state: self.state.clone(),
        })
    }

    async fn subscribe_attacks(&self) -> Result<Self::Events, ContractError> {
        let mut state = self.state.lock().unwrap();
        state.counters.subscribes += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let key = state.next_subscriber;
        state.next_subscriber += 1;
        state.subscribers.push((key, tx));
        Ok(LocalEvents {
            key,
            rx,
            state: self.state.clone(),
        })
    }
}

pub struct LocalPending {
    account: Address,
    latency: Duration,
    state: Arc<Mutex<LedgerState>>,
}

impl PendingAttack for LocalPending {
    /// The finality wait. Resolution happens here, under one lock: the
    /// attacker's damage comes off the boss, the boss strikes back on every
    /// second round, both floored at zero, and the resulting event fans out
    /// to every subscriber before the caller sees `Ok`.
    async fn confirmed(self) -> Result<(), ContractError> {
        if !self.latency.is_zero() {
            let base = self.latency.as_millis() as u64;
            let jitter = rand::rng().random_range(0..=base / 2);
            time::sleep(self.latency + Duration::from_millis(jitter)).await;
        }

        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if let Some(reason) = state.revert_next_attack.take() {
            return Err(ContractError::Reverted(reason));
        }
        let Some(attacker) = state.characters.get_mut(&self.account) else {
            return Err(ContractError::Reverted(
                "attacker has no character minted".to_string(),
            ));
        };
        if attacker.hp == 0 {
            return Err(ContractError::Reverted("character has fallen".to_string()));
        }
        if state.boss.hp == 0 {
            return Err(ContractError::Reverted("boss is already defeated".to_string()));
        }

        state.rounds += 1;
        state.boss.hp = state.boss.hp.saturating_sub(attacker.attack_damage);
        if state.rounds % 2 == 0 {
            attacker.hp = attacker.hp.saturating_sub(state.boss.attack_damage);
        }
        let event = AttackComplete {
            new_boss_hp: RawUint(u128::from(state.boss.hp)),
            new_player_hp: RawUint(u128::from(attacker.hp)),
        };
        info!(
            attacker = %self.account,
            round = state.rounds,
            boss_hp = state.boss.hp,
            player_hp = attacker.hp,
            "attack resolved",
        );
        state.subscribers.retain(|(_, tx)| tx.send(event).is_ok());
        Ok(())
    }
}

pub struct LocalEvents {
    key: u64,
    rx: mpsc::UnboundedReceiver<AttackComplete>,
    state: Arc<Mutex<LedgerState>>,
}

impl AttackEvents for LocalEvents {
    async fn next(&mut self) -> Option<AttackComplete> {
        self.rx.recv().await
    }

    async fn close(self) {
        let mut state = self.state.lock().unwrap();
        state.subscribers.retain(|(key, _)| *key != self.key);
    }
}

#[derive(Clone)]
pub struct LocalConnector {
    state: Arc<Mutex<LedgerState>>,
}

impl ContractConnector for LocalConnector {
    type Contract = LocalContract;

    fn connect(&self, account: &Address) -> LocalContract {
        LocalContract {
            account: *account,
            state: self.state.clone(),
        }
    }
}
