use arena_client::{
    arena::AttackState,
    character::{
        CharacterRecord,
        CharacterStatus,
    },
    deployment::{
        self,
        DeploymentEnv,
    },
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
        SessionSnapshot,
    },
    wallet::{
        Address,
        ChainId,
        ConnectionManager,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::time::Duration;
use tokio::{
    io::{
        AsyncBufReadExt,
        BufReader,
    },
    time,
};
use tracing::info;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

struct DemoConfig {
    wallet_chain: ChainId,
    account: Address,
    no_wallet: bool,
    boss_hp: Option<u64>,
    latency: Duration,
    log_dir: Option<String>,
}

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: arena-client [--chain-id <id>] [--account <address>] [--no-wallet]\n\
         [--boss-hp <hp>] [--latency-ms <ms>] [--log-dir <path>]\n\
         \n\
         Runs a full game session against an in-process simulated ledger.\n\
         \n\
         Flags:\n\
           --chain-id <id>     Chain the simulated wallet reports (default 0x4;\n\
                               anything else demonstrates the wrong-network gate)\n\
           --account <address> Authorized wallet account (0x-prefixed, 20 bytes)\n\
           --no-wallet         Start without an injected wallet provider\n\
           --boss-hp <hp>      Override the seeded boss hit points\n\
           --latency-ms <ms>   Base attack confirmation latency (default 250)\n\
           --log-dir <path>    Write logs to a daily-rolling file instead of stderr"
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<DemoConfig> {
    let mut args = std::env::args().skip(1);
    let mut wallet_chain = DEFAULT_CHAIN_ID;
    let mut account = Address::from_bytes([0xA1; 20]);
    let mut no_wallet = false;
    let mut boss_hp = None;
    let mut latency = Duration::from_millis(250);
    let mut log_dir = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--chain-id" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--chain-id requires a chain id argument"))?;
                wallet_chain = raw
                    .parse()
                    .wrap_err_with(|| format!("Invalid chain id: {raw}"))?;
            }
            "--account" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--account requires an address argument"))?;
                account = raw
                    .parse()
                    .wrap_err_with(|| format!("Invalid account address: {raw}"))?;
            }
            "--no-wallet" => no_wallet = true,
            "--boss-hp" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--boss-hp requires a number argument"))?;
                boss_hp = Some(
                    raw.parse::<u64>()
                        .wrap_err_with(|| format!("Invalid boss hp: {raw}"))?,
                );
            }
            "--latency-ms" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--latency-ms requires a number argument"))?;
                let ms = raw
                    .parse::<u64>()
                    .wrap_err_with(|| format!("Invalid latency: {raw}"))?;
                latency = Duration::from_millis(ms);
            }
            "--log-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--log-dir requires a path argument"))?;
                log_dir = Some(dir);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    Ok(DemoConfig {
        wallet_chain,
        account,
        no_wallet,
        boss_hp,
        latency,
        log_dir,
    })
}

fn init_logging(log_dir: Option<&str>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(rolling::daily(dir, "arena-client.log"));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let config = parse_cli_args()?;
    let _log_guard = init_logging(config.log_dir.as_deref());

    let mut ledger = LocalConfig {
        chain_id: config.wallet_chain,
        latency: config.latency,
        ..LocalConfig::seeded()
    };
    if let Some(hp) = config.boss_hp {
        ledger.boss.hp = hp;
        ledger.boss.max_hp = hp;
    }
    let chain = LocalChain::launch(ledger);
    chain.set_authorized(&[config.account]);

    deployment::ensure_structure()?;
    let boss_name = chain.boss().name;
    deployment::record_deployment(
        DeploymentEnv::Local,
        chain.contract_address().to_string(),
        DEFAULT_CHAIN_ID,
        Some("simulated arena"),
        Some(boss_name.as_str()),
    )?;
    let store = deployment::DeploymentStore::new(DeploymentEnv::Local)?;
    let runs = store
        .load()?
        .iter()
        .filter(|record| record.is_on_chain(DEFAULT_CHAIN_ID))
        .count();
    info!(runs, path = %store.path().display(), "recorded simulated deployment");

    let provider = if config.no_wallet {
        None
    } else {
        Some(chain.provider())
    };
    let wallet = ConnectionManager::new(provider, DEFAULT_CHAIN_ID);
    let (mut session, mut inbox) = Session::new(wallet, chain.connector());

    session.probe().await;
    run(&mut session, &mut inbox, &chain).await
}

async fn run(
    session: &mut Session<LocalProvider, LocalConnector>,
    inbox: &mut SessionInbox,
    chain: &LocalChain,
) -> Result<()> {
    println!("arena-client demo: type 'help' for commands");
    let mut ticker = time::interval(Duration::from_millis(250));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_render = String::new();
    render(&session.snapshot(), &mut last_render);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => session.tick(),
            update = inbox.next() => session.ingest(update),
            line = lines.next_line() => {
                match line.wrap_err("failed to read stdin")? {
                    None => break,
                    Some(line) => {
                        if !handle_command(line.trim(), session, chain).await {
                            break;
                        }
                    }
                }
            }
        }
        render(&session.snapshot(), &mut last_render);
    }
    Ok(())
}

async fn handle_command(
    line: &str,
    session: &mut Session<LocalProvider, LocalConnector>,
    chain: &LocalChain,
) -> bool {
    let mut words = line.split_whitespace();
    match words.next() {
        None => {}
        Some("help") => print_commands(),
        Some("connect") => session.connect().await,
        Some("probe") => session.probe().await,
        Some("attack") => {
            session.submit_attack();
        }
        Some("mint") => match words.next().and_then(|raw| raw.parse::<usize>().ok()) {
            Some(index) => mint_for_session(index, session, chain),
            None => println!("usage: mint <roster index>"),
        },
        Some("roster") => {
            for (index, entry) in chain.roster().iter().enumerate() {
                println!(
                    "  {index}: {} ({} hp, {} damage)",
                    entry.name, entry.hp, entry.attack_damage,
                );
            }
        }
        Some("state") => print_state(&session.snapshot()),
        Some("chain") => match words.next().and_then(|raw| raw.parse::<ChainId>().ok()) {
            Some(chain_id) => {
                chain.set_chain_id(chain_id);
                session.probe().await;
            }
            None => println!("usage: chain <id> (hex 0x1 or decimal)"),
        },
        Some("switch") => match words.next().and_then(|raw| raw.parse::<Address>().ok()) {
            Some(account) => {
                chain.set_authorized(&[account]);
                session.probe().await;
            }
            None => println!("usage: switch <0x-address>"),
        },
        Some("quit") | Some("exit") => return false,
        Some(other) => println!("unknown command: {other} (try 'help')"),
    }
    true
}

fn mint_for_session(
    index: usize,
    session: &mut Session<LocalProvider, LocalConnector>,
    chain: &LocalChain,
) {
    let Some(account) = session.snapshot().connection.account else {
        println!("mint requires a connected account; run 'connect' first");
        return;
    };
    match chain.mint(account, index) {
        Ok(minted) => {
            println!("minted {} for {}", minted.name, account.short());
            session.adopt_character(CharacterRecord {
                name: minted.name,
                image_uri: minted.image_uri,
                hp: minted.hp,
                max_hp: minted.max_hp,
                attack_damage: minted.attack_damage,
                owner: Some(account),
            });
        }
        Err(err) => println!("mint failed: {err}"),
    }
}

fn print_commands() {
    println!(
        "Commands:\n\
           connect             Ask the wallet for access (prompts on first use)\n\
           probe               Silent wallet re-check\n\
           attack              Submit one attack against the boss\n\
           mint <n>            Mint roster entry <n> for the connected account\n\
           roster              List mintable characters\n\
           state               Dump the full session snapshot\n\
           chain <id>          Move the simulated wallet to another chain\n\
           switch <address>    Authorize a different account in the wallet\n\
           quit                Exit"
    );
}

fn render(snapshot: &SessionSnapshot, last: &mut String) {
    let line = render_line(snapshot);
    if line != *last {
        println!("{line}");
        *last = line;
    }
}

fn render_line(snapshot: &SessionSnapshot) -> String {
    let account = match &snapshot.connection.account {
        Some(account) => account.short(),
        None => "-".to_string(),
    };
    let character = match &snapshot.character {
        Some(CharacterStatus::Ready(record)) => {
            format!("{} {}/{}hp", record.name, record.hp, record.max_hp)
        }
        Some(CharacterStatus::Absent(_)) => "absent".to_string(),
        None => "-".to_string(),
    };
    let boss = match &snapshot.boss {
        Some(boss) => format!("{} {}/{}hp", boss.name, boss.hp, boss.max_hp),
        None => "-".to_string(),
    };
    let attack = match &snapshot.attack {
        AttackState::Idle => "idle".to_string(),
        AttackState::Submitted => "submitted".to_string(),
        AttackState::Confirmed { .. } => "confirmed".to_string(),
        AttackState::Failed { reason } => format!("failed ({reason})"),
    };
    let mut line = format!(
        "[{}] account={account} character={character} boss={boss} attack={attack}",
        snapshot.status,
    );
    if let Some(toast) = &snapshot.toast {
        line.push_str(&format!("  ** {} **", toast.message));
    }
    line
}

fn print_state(snapshot: &SessionSnapshot) {
    let chain_id = match snapshot.connection.chain_id {
        Some(chain_id) => chain_id.to_string(),
        None => "-".to_string(),
    };
    let account = match &snapshot.connection.account {
        Some(account) => account.to_string(),
        None => "-".to_string(),
    };
    println!("status:    {}", snapshot.status);
    println!(
        "wallet:    present={} network_ok={} chain={chain_id} account={account}",
        snapshot.connection.provider_present, snapshot.connection.network_ok,
    );
    match &snapshot.character {
        Some(CharacterStatus::Ready(record)) => println!(
            "character: {} {}/{}hp, {} damage",
            record.name, record.hp, record.max_hp, record.attack_damage,
        ),
        Some(CharacterStatus::Absent(reason)) => println!("character: absent ({reason:?})"),
        None => println!("character: -"),
    }
    match &snapshot.boss {
        Some(boss) => println!(
            "boss:      {} {}/{}hp, {} damage",
            boss.name, boss.hp, boss.max_hp, boss.attack_damage,
        ),
        None => println!("boss:      -"),
    }
    println!("attack:    {:?}", snapshot.attack);
    if let Some(toast) = &snapshot.toast {
        println!("toast:     {}", toast.message);
    }
    for error in &snapshot.errors {
        println!("error:     {error}");
    }
}
