use crate::wallet::ChainId;
use chrono::Utc;
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Local,
    Testnet,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Local => "local",
            DeploymentEnv::Testnet => "testnet",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Local => "Local",
            DeploymentEnv::Testnet => "Testnet",
        };
        write!(f, "{name}")
    }
}

/// One known game deployment: where the arena contract lives and which
/// chain a client must be on to reach it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub contract_address: String,
    pub chain_id: u64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub boss: Option<String>,
}

impl DeploymentRecord {
    pub fn is_on_chain(&self, chain: ChainId) -> bool {
        self.chain_id == chain.as_u64()
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(env)?;
        Ok(Self { path })
    }

    pub fn load(&self) -> Result<Vec<DeploymentRecord>> {
        read_records(&self.path)
    }

    pub fn append(&self, record: DeploymentRecord) -> Result<()> {
        let mut records = self.load()?;
        records.push(record);
        write_records(&self.path, &records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn record_deployment(
    env: DeploymentEnv,
    contract_address: impl AsRef<str>,
    chain_id: ChainId,
    label: Option<impl AsRef<str>>,
    boss: Option<impl AsRef<str>>,
) -> Result<()> {
    let store = DeploymentStore::new(env)?;
    let record = DeploymentRecord {
        deployed_at: Utc::now().to_rfc3339(),
        contract_address: contract_address.as_ref().to_string(),
        chain_id: chain_id.as_u64(),
        label: label.map(|label| label.as_ref().to_string()),
        boss: boss.map(|boss| boss.as_ref().to_string()),
    };
    store.append(record)
}

pub fn ensure_structure() -> Result<()> {
    for env in [DeploymentEnv::Local, DeploymentEnv::Testnet] {
        let _ = ensure_store(env)?;
    }
    Ok(())
}

fn ensure_store(env: DeploymentEnv) -> Result<PathBuf> {
    let root = Path::new(DEPLOYMENTS_ROOT);
    if !root.exists() {
        fs::create_dir_all(root).wrap_err("Failed to create .deployments directory")?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).wrap_err_with(|| {
            format!("Failed to create .deployments/{} directory", env.dir_name())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).wrap_err_with(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"[]").wrap_err_with(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_records(path: impl AsRef<Path>) -> Result<Vec<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).wrap_err("Failed to read deployment records")?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let records = serde_json::from_slice::<Vec<DeploymentRecord>>(&data)
        .wrap_err("Failed to parse deployment records JSON")?;
    Ok(records)
}

fn write_records(path: impl AsRef<Path>, records: &[DeploymentRecord]) -> Result<()> {
    let json = serde_json::to_vec_pretty(records)
        .wrap_err("Failed to serialize deployment records")?;
    fs::write(path.as_ref(), json).wrap_err("Failed to write deployment records")?;
    Ok(())
}
