use std::{
    fmt,
    str::FromStr,
};
use tracing::{
    info,
    warn,
};

/// 20-byte account address, rendered as `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Shortened `0xabcd..ef01` form for status lines.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}..{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseAddressError(String);

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid account address: {}", self.0)
    }
}

impl std::error::Error for ParseAddressError {}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(stripped).map_err(|_| ParseAddressError(s.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| ParseAddressError(s.to_string()))?;
        Ok(Self(bytes))
    }
}

/// Numeric chain identifier. Wallet providers report it as a hex string
/// (`"0x4"`), which is the form accepted by `FromStr` alongside plain decimal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChainId(u64);

impl ChainId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseChainIdError(String);

impl fmt::Display for ParseChainIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid chain id: {}", self.0)
    }
}

impl std::error::Error for ParseChainIdError {}

impl FromStr for ChainId {
    type Err = ParseChainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix("0x") {
            Some(hex_digits) => u64::from_str_radix(hex_digits, 16),
            None => s.parse::<u64>(),
        };
        parsed
            .map(ChainId)
            .map_err(|_| ParseChainIdError(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderError {
    /// The user dismissed the wallet's authorization prompt.
    Rejected,
    Transport(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Rejected => write!(f, "authorization rejected by user"),
            ProviderError::Transport(msg) => write!(f, "wallet transport error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Injected wallet capability. `authorized_accounts` is the silent check;
/// `request_access` may raise the wallet's own authorization UI.
pub trait WalletProvider {
    fn chain_id(&self) -> impl Future<Output = Result<ChainId, ProviderError>>;

    fn authorized_accounts(
        &self,
    ) -> impl Future<Output = Result<Vec<Address>, ProviderError>>;

    fn request_access(
        &self,
    ) -> impl Future<Output = Result<Vec<Address>, ProviderError>>;
}

/// Wallet-facing session state. Mutated only by [`ConnectionManager`];
/// reset on provider absence or network mismatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub provider_present: bool,
    pub network_ok: bool,
    pub account: Option<Address>,
    /// Chain the provider reported, kept for mismatch status lines.
    pub chain_id: Option<ChainId>,
}

impl Connection {
    pub fn absent() -> Self {
        Self {
            provider_present: false,
            network_ok: false,
            account: None,
            chain_id: None,
        }
    }

    /// The only door to contract binding: yields a proof value exactly when
    /// the provider is present, the network matched and an account is active.
    pub fn ready(&self) -> Option<ReadyConnection> {
        if !self.provider_present || !self.network_ok {
            return None;
        }
        let account = self.account?;
        Some(ReadyConnection { account })
    }
}

/// Proof that a [`Connection`] passed every gate. Only obtainable through
/// [`Connection::ready`], and the only input contract binding accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadyConnection {
    pub account: Address,
}

pub struct ConnectionManager<P> {
    provider: Option<P>,
    required: ChainId,
}

impl<P: WalletProvider> ConnectionManager<P> {
    pub fn new(provider: Option<P>, required: ChainId) -> Self {
        Self { provider, required }
    }

    pub fn required_chain(&self) -> ChainId {
        self.required
    }

    /// Silent probe: never prompts. Provider absence and network mismatch are
    /// states, not errors; transport failures degrade to an unusable
    /// connection with a warn log.
    pub async fn probe(&self) -> Connection {
        let Some(provider) = &self.provider else {
            info!("no wallet provider detected");
            return Connection::absent();
        };

        let chain_id = match provider.chain_id().await {
            Ok(chain_id) => chain_id,
            Err(err) => {
                warn!(%err, "wallet chain query failed");
                return Connection {
                    provider_present: true,
                    network_ok: false,
                    account: None,
                    chain_id: None,
                };
            }
        };
        if chain_id != self.required {
            warn!(
                observed = %chain_id,
                required = %self.required,
                "wallet is on the wrong network",
            );
            return Connection {
                provider_present: true,
                network_ok: false,
                account: None,
                chain_id: Some(chain_id),
            };
        }

        let account = match provider.authorized_accounts().await {
            Ok(accounts) => accounts.first().copied(),
            Err(err) => {
                warn!(%err, "authorized account query failed");
                None
            }
        };
        Connection {
            provider_present: true,
            network_ok: true,
            account,
            chain_id: Some(chain_id),
        }
    }

    /// Prompting variant of [`probe`](Self::probe), for an explicit connect
    /// action. A user rejection surfaces as `Err(ProviderError::Rejected)` and
    /// the caller keeps whatever connection it already had. The prompt is
    /// skipped entirely while the wallet sits on the wrong network.
    pub async fn request(&self) -> Result<Connection, ProviderError> {
        let Some(provider) = &self.provider else {
            info!("no wallet provider detected");
            return Ok(Connection::absent());
        };

        let chain_id = provider.chain_id().await?;
        if chain_id != self.required {
            warn!(
                observed = %chain_id,
                required = %self.required,
                "wallet is on the wrong network",
            );
            return Ok(Connection {
                provider_present: true,
                network_ok: false,
                account: None,
                chain_id: Some(chain_id),
            });
        }

        let accounts = provider.request_access().await?;
        Ok(Connection {
            provider_present: true,
            network_ok: true,
            account: accounts.first().copied(),
            chain_id: Some(chain_id),
        })
    }
}
