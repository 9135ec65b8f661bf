use crate::{
    arena::{
        AttackCommand,
        AttackState,
        ToastSignal,
        merge_attack_event,
    },
    character::{
        AbsentReason,
        BossRecord,
        CharacterRecord,
        CharacterStatus,
        resolve_character,
    },
    contract::{
        AttackComplete,
        AttackEvents,
        ContractConnector,
        ContractError,
        ContractHandle,
        GameContract,
        HandleId,
        PendingAttack,
    },
    wallet::{
        Connection,
        ConnectionManager,
        ProviderError,
        WalletProvider,
    },
};
use std::time::Instant;
use tokio::{
    sync::{
        mpsc,
        oneshot,
    },
    task::JoinHandle,
};
use tracing::{
    error,
    info,
    warn,
};

const MAX_ERROR_LOG: usize = 50;

/// Read model handed to the surrounding application.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub connection: Connection,
    pub character: Option<CharacterStatus>,
    pub boss: Option<BossRecord>,
    pub attack: AttackState,
    pub toast: Option<ToastSignal>,
    pub status: String,
    pub errors: Vec<String>,
}

/// Reports from the session's background work: the character resolver, the
/// boss/event sync worker and attack settlement. Every report carries the
/// handle it was started under; [`Session::ingest`] drops reports whose
/// handle has since been torn down.
#[derive(Debug)]
pub enum SessionUpdate {
    CharacterResolved {
        handle: HandleId,
        outcome: Result<CharacterStatus, ContractError>,
    },
    BossFetched {
        handle: HandleId,
        outcome: Result<BossRecord, ContractError>,
    },
    AttackObserved {
        handle: HandleId,
        event: AttackComplete,
    },
    AttackSettled {
        handle: HandleId,
        outcome: Result<(), ContractError>,
    },
    SyncFailed {
        handle: HandleId,
        error: ContractError,
    },
    SyncClosed {
        handle: HandleId,
    },
}

/// Receiving half of the session's background channel. Drive it from the
/// application loop and feed every update back through [`Session::ingest`].
pub struct SessionInbox {
    rx: mpsc::UnboundedReceiver<SessionUpdate>,
}

impl SessionInbox {
    pub async fn next(&mut self) -> SessionUpdate {
        match self.rx.recv().await {
            Some(update) => update,
            // all senders gone means the session itself was dropped
            None => std::future::pending().await,
        }
    }

    pub fn try_next(&mut self) -> Option<SessionUpdate> {
        self.rx.try_recv().ok()
    }
}

struct SyncWorker {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// The session engine: owns the wallet connection, the contract handle and
/// the cached combat state, and keeps them consistent while reads, the
/// confirmation wait and event delivery complete out of order.
pub struct Session<P, K: ContractConnector> {
    wallet: ConnectionManager<P>,
    connector: K,
    connection: Connection,
    handle: Option<ContractHandle<K::Contract>>,
    next_handle: u64,
    sync: Option<SyncWorker>,
    character: Option<CharacterStatus>,
    boss: Option<BossRecord>,
    attack: AttackCommand,
    toast: Option<ToastSignal>,
    status: String,
    errors: Vec<String>,
    inbox_tx: mpsc::UnboundedSender<SessionUpdate>,
}

impl<P: WalletProvider, K: ContractConnector> Session<P, K> {
    pub fn new(wallet: ConnectionManager<P>, connector: K) -> (Self, SessionInbox) {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let session = Self {
            wallet,
            connector,
            connection: Connection::absent(),
            handle: None,
            next_handle: 0,
            sync: None,
            character: None,
            boss: None,
            attack: AttackCommand::new(),
            toast: None,
            status: String::from("Starting"),
            errors: Vec::new(),
            inbox_tx,
        };
        (session, SessionInbox { rx: inbox_rx })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection: self.connection.clone(),
            character: self.character.clone(),
            boss: self.boss.clone(),
            attack: self.attack.state().clone(),
            toast: self.toast.clone(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    /// Silent wallet probe, run on startup and on explicit user interaction,
    /// never on a poll loop.
    pub async fn probe(&mut self) {
        let connection = self.wallet.probe().await;
        self.apply_connection(connection).await;
    }

    /// Explicit connect action; the one path that may raise the wallet's
    /// authorization UI. A rejection leaves the connection exactly as it was.
    pub async fn connect(&mut self) {
        match self.wallet.request().await {
            Ok(connection) => self.apply_connection(connection).await,
            Err(ProviderError::Rejected) => {
                info!("wallet connection request rejected by user");
                self.set_status("Connection request rejected");
            }
            Err(err) => self.push_error(format!("wallet connection failed: {err}")),
        }
    }

    /// Recomputes bindings when, and only when, the connection identity
    /// changed. Identical input on a live binding is a no-op; any change
    /// tears the old handle down (releasing its event subscription first)
    /// before a rebind. With nothing bound the idle status is refreshed, so
    /// the startup probe reports a missing provider instead of staying on
    /// the boot banner.
    async fn apply_connection(&mut self, connection: Connection) {
        let changed = self.connection != connection;
        if !changed && self.handle.is_some() {
            return;
        }
        self.connection = connection;
        if changed {
            self.teardown().await;
        }

        match self.connection.ready() {
            Some(ready) => {
                self.next_handle += 1;
                let id = HandleId::new(self.next_handle);
                let handle = ContractHandle::bind(&self.connector, &ready, id);
                info!(account = %ready.account, handle = %id, "bound game contract");
                self.set_status("Loading arena...");
                self.spawn_resolver(&handle);
                self.spawn_sync(&handle);
                self.handle = Some(handle);
            }
            None => {
                let status = if !self.connection.provider_present {
                    "No wallet provider detected".to_string()
                } else if !self.connection.network_ok {
                    match self.connection.chain_id {
                        Some(observed) => format!(
                            "Wrong network: wallet reports {observed}, required {}",
                            self.wallet.required_chain(),
                        ),
                        None => "Wallet network unavailable".to_string(),
                    }
                } else {
                    "Wallet not connected".to_string()
                };
                self.set_status(status);
            }
        }
    }

    /// Releases everything owned by the current handle. The event
    /// subscription is closed and the worker joined before this returns, so a
    /// rebind can never race a stale subscription.
    async fn teardown(&mut self) {
        if let Some(sync) = self.sync.take() {
            let _ = sync.shutdown.send(());
            if let Err(err) = sync.task.await {
                warn!(%err, "sync worker did not shut down cleanly");
            }
        }
        self.handle = None;
        self.character = None;
        self.boss = None;
        self.attack.reset();
    }

    fn spawn_resolver(&self, handle: &ContractHandle<K::Contract>) {
        let contract = handle.contract().clone();
        let owner = handle.account();
        let id = handle.id();
        let updates = self.inbox_tx.clone();
        tokio::spawn(async move {
            let outcome = resolve_character(&contract, owner).await;
            let _ = updates.send(SessionUpdate::CharacterResolved {
                handle: id,
                outcome,
            });
        });
    }

    fn spawn_sync(&mut self, handle: &ContractHandle<K::Contract>) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(sync_worker(
            handle.contract().clone(),
            handle.id(),
            shutdown_rx,
            self.inbox_tx.clone(),
        ));
        self.sync = Some(SyncWorker {
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Dispatches one attack. Returns the lifecycle state as seen right
    /// after the call: a repeat submission while a command is live returns
    /// that existing command's state and sends nothing to the ledger.
    pub fn submit_attack(&mut self) -> AttackState {
        let Some(handle) = &self.handle else {
            info!("attack ignored: no contract binding");
            return self.attack.state().clone();
        };
        if !self.attack.try_submit() {
            info!("attack ignored: another command is live");
            return self.attack.state().clone();
        }
        let contract = handle.contract().clone();
        let id = handle.id();
        self.set_status("Attacking...");
        let updates = self.inbox_tx.clone();
        tokio::spawn(async move {
            let outcome = match contract.attack_boss().await {
                Ok(pending) => pending.confirmed().await,
                Err(err) => Err(err),
            };
            let _ = updates.send(SessionUpdate::AttackSettled {
                handle: id,
                outcome,
            });
        });
        self.attack.state().clone()
    }

    /// Entry point for the external character-selection flow: a freshly
    /// minted record replaces whatever the session held.
    pub fn adopt_character(&mut self, record: CharacterRecord) {
        info!(name = %record.name, "adopting character from the selection flow");
        self.character = Some(CharacterStatus::Ready(record));
        self.set_status("Ready");
    }

    /// Merges one background report, discarding it when its handle is no
    /// longer the live one.
    pub fn ingest(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::CharacterResolved { handle, outcome } => {
                if !self.is_live(handle) {
                    info!(stale = %handle, "dropping character result from a dead handle");
                    return;
                }
                match outcome {
                    Ok(status) => {
                        match &status {
                            CharacterStatus::Ready(record) => {
                                info!(name = %record.name, hp = record.hp, "character loaded");
                                self.set_status("Ready");
                            }
                            CharacterStatus::Absent(AbsentReason::NeverMinted) => {
                                self.set_status("No character minted; selection required");
                            }
                            CharacterStatus::Absent(AbsentReason::Fallen) => {
                                self.set_status("Character has fallen; mint a new one");
                            }
                        }
                        self.character = Some(status);
                    }
                    Err(err) => {
                        self.push_error(format!("character lookup failed: {err}"))
                    }
                }
            }
            SessionUpdate::BossFetched { handle, outcome } => {
                if !self.is_live(handle) {
                    info!(stale = %handle, "dropping boss result from a dead handle");
                    return;
                }
                match outcome {
                    Ok(boss) => {
                        info!(name = %boss.name, hp = boss.hp, "boss loaded");
                        self.boss = Some(boss);
                    }
                    Err(err) => self.push_error(format!("boss fetch failed: {err}")),
                }
            }
            SessionUpdate::AttackObserved { handle, event } => {
                if !self.is_live(handle) {
                    return;
                }
                merge_attack_event(
                    self.boss.as_mut(),
                    self.character.as_mut().and_then(|c| c.record_mut()),
                    &event,
                );
            }
            SessionUpdate::AttackSettled { handle, outcome } => {
                if !self.is_live(handle) {
                    info!(stale = %handle, "dropping attack outcome from a dead handle");
                    return;
                }
                match outcome {
                    Ok(()) => {
                        let now = Instant::now();
                        let message = self.hit_message();
                        self.attack.confirm(now);
                        self.toast = Some(ToastSignal::new(message, now));
                        self.set_status("Hit landed!");
                    }
                    Err(err) => {
                        self.status = "Attack failed".to_string();
                        self.attack.fail(err.to_string());
                        self.push_error(format!("attack failed: {err}"));
                    }
                }
            }
            SessionUpdate::SyncFailed { handle, error } => {
                if !self.is_live(handle) {
                    return;
                }
                self.push_error(format!("combat sync failed: {error}"));
            }
            SessionUpdate::SyncClosed { handle } => {
                if !self.is_live(handle) {
                    return;
                }
                // the stream is not restartable; state stays put until a rebind
                warn!("combat event stream closed by the service");
                self.status = "Combat event stream lost".to_string();
            }
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Clock-driven housekeeping: toast expiry and the confirmed → idle
    /// auto-return, both on the same cue window.
    pub fn tick_at(&mut self, now: Instant) {
        if self.toast.as_ref().is_some_and(|toast| toast.expired_at(now)) {
            self.toast = None;
        }
        if self.attack.tick(now) {
            self.set_status("Ready");
        }
    }

    fn is_live(&self, handle: HandleId) -> bool {
        self.handle.as_ref().is_some_and(|live| live.id() == handle)
    }

    fn hit_message(&self) -> String {
        let damage = self
            .character
            .as_ref()
            .and_then(|c| c.record())
            .map(|record| record.attack_damage);
        match (&self.boss, damage) {
            (Some(boss), Some(damage)) => {
                format!("{} was hit for {damage}!", boss.name)
            }
            (Some(boss), None) => format!("{} was hit!", boss.name),
            _ => "Attack confirmed!".to_string(),
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.errors.clear();
    }

    fn push_error(&mut self, item: impl Into<String>) {
        let item = item.into();
        error!("{item}");
        self.errors.push(item);
        if self.errors.len() > MAX_ERROR_LOG {
            let drain = self.errors.len() - MAX_ERROR_LOG;
            self.errors.drain(0..drain);
        }
    }
}

/// One read of the boss record, then the event subscription, then the pump.
/// A shutdown signal wins every race and the subscription is released before
/// the worker exits, on every path that acquired it.
async fn sync_worker<C: GameContract>(
    contract: C,
    handle: HandleId,
    mut shutdown: oneshot::Receiver<()>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
) {
    let outcome = tokio::select! {
        fetched = contract.big_boss() => {
            fetched.and_then(|raw| BossRecord::from_raw(raw, None))
        }
        _ = &mut shutdown => return,
    };
    let _ = updates.send(SessionUpdate::BossFetched { handle, outcome });

    let subscribed = tokio::select! {
        subscribed = contract.subscribe_attacks() => subscribed,
        _ = &mut shutdown => return,
    };
    let mut events = match subscribed {
        Ok(events) => events,
        Err(error) => {
            let _ = updates.send(SessionUpdate::SyncFailed { handle, error });
            return;
        }
    };

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(event) => {
                    let _ = updates.send(SessionUpdate::AttackObserved { handle, event });
                }
                None => {
                    let _ = updates.send(SessionUpdate::SyncClosed { handle });
                    return;
                }
            },
            _ = &mut shutdown => {
                events.close().await;
                return;
            }
        }
    }
}
