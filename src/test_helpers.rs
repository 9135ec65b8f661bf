use crate::{
    local::{
        DEFAULT_CHAIN_ID,
        LocalChain,
        LocalConfig,
        LocalConnector,
        LocalProvider,
    },
    session::{
        Session,
        SessionInbox,
    },
    wallet::{
        Address,
        ChainId,
        ConnectionManager,
    },
};

pub fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

/// A session wired to a scripted simulated chain, plus the handles tests
/// need to drive and observe both sides.
pub struct TestContext {
    pub chain: LocalChain,
    pub session: Session<LocalProvider, LocalConnector>,
    pub inbox: SessionInbox,
    pub alice: Address,
}

impl TestContext {
    /// Seeded happy path: `alice` is authorized on the required chain and
    /// already owns Chewbacca.
    pub fn new() -> Self {
        let ctx = Self::bare();
        ctx.chain.mint(ctx.alice, 1).unwrap();
        ctx
    }

    /// Authorized wallet, nothing minted.
    pub fn bare() -> Self {
        let ctx = Self::with_config(LocalConfig::default());
        ctx.chain.set_authorized(&[ctx.alice]);
        ctx
    }

    /// Wallet present but not yet authorized; a connect prompt grants
    /// `alice`.
    pub fn fresh_wallet() -> Self {
        let ctx = Self::with_config(LocalConfig::default());
        ctx.chain.allow_grant(&[ctx.alice]);
        ctx
    }

    /// Wallet reports chain 0x1 while the session requires 0x4. The ledger
    /// is fully seeded, so any fetch that slipped past the gate would find
    /// data to return.
    pub fn wrong_network() -> Self {
        let config = LocalConfig {
            chain_id: ChainId::new(1),
            ..LocalConfig::default()
        };
        let ctx = Self::with_config(config);
        ctx.chain.set_authorized(&[ctx.alice]);
        ctx.chain.mint(ctx.alice, 1).unwrap();
        ctx
    }

    /// No injected provider at all.
    pub fn no_provider() -> Self {
        let chain = LocalChain::launch(LocalConfig::default());
        let wallet = ConnectionManager::new(None::<LocalProvider>, DEFAULT_CHAIN_ID);
        let (session, inbox) = Session::new(wallet, chain.connector());
        Self {
            chain,
            session,
            inbox,
            alice: addr(0xA1),
        }
    }

    pub fn with_config(config: LocalConfig) -> Self {
        let chain = LocalChain::launch(config);
        let wallet = ConnectionManager::new(Some(chain.provider()), DEFAULT_CHAIN_ID);
        let (session, inbox) = Session::new(wallet, chain.connector());
        Self {
            chain,
            session,
            inbox,
            alice: addr(0xA1),
        }
    }

    /// Lets every spawned task run and funnels whatever it reported back
    /// into the session. Bounded, so a quiet session returns promptly.
    pub async fn settle(&mut self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
            while let Some(update) = self.inbox.try_next() {
                self.session.ingest(update);
            }
        }
    }
}
