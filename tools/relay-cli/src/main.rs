use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy_primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use intent_relay::{
    Intent, IntentAuthorizer, IntentRelay, LocalExecutor, LocalKeySigner, Nonce, NonceLedger,
    RelayClient, RelayConfig, RelayError, Session, SignatureScheme, SignedIntent, Signer,
};
use intent_relay_types::parse_address;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing_subscriber::EnvFilter;

/// Sign, verify and simulate relayed wallet intents.
///
/// Settings come from `--config` (JSON), then flags, then their environment variables.
/// A `.env` file in the working directory is loaded first.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON file with relay settings (chain_id, wallet, relay_timeout_ms, kdf_iterations, scheme).
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "CHAIN_ID")]
    chain_id: Option<u64>,

    /// Smart wallet address (0x...).
    #[arg(long, env = "WALLET_ADDRESS")]
    wallet: Option<String>,

    #[arg(long, env = "RELAY_TIMEOUT_MS")]
    relay_timeout_ms: Option<u64>,

    /// `personal_message` (EIP-191, default) or `raw_digest`.
    #[arg(long, value_parser = parse_scheme)]
    scheme: Option<SignatureScheme>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the address of the local signing key.
    Address {
        #[command(flatten)]
        key: KeyArgs,
    },
    /// Sign an intent and write it out with its `execute` calldata.
    Sign {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        intent: IntentArgs,
        /// Wallet nonce to sign for (the executor's stored nonce).
        #[arg(long, default_value_t = 0)]
        nonce: u64,
        /// Output path; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check a file written by `sign` and print the recovered signer.
    Verify {
        path: PathBuf,
        /// Fail unless the signature recovers to this address.
        #[arg(long)]
        expect: Option<String>,
    },
    /// Relay intents through an in-process executor owned by the signer, then replay one.
    Simulate {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        intent: IntentArgs,
        /// How many times to send the intent.
        #[arg(long, default_value_t = 2)]
        count: u32,
    },
}

#[derive(Args, Debug)]
struct KeyArgs {
    /// Private key (hex string, 0x...).
    #[arg(long, env = "PKEY", conflicts_with = "email")]
    private_key: Option<String>,

    /// Email for the password-derived demo key. Insecure, never use with real funds.
    #[arg(long, requires = "password")]
    email: Option<String>,

    #[arg(long, env = "RELAY_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct IntentArgs {
    /// Contract or account the wallet calls.
    #[arg(long)]
    target: String,

    /// Value in ether (eg 0.5).
    #[arg(long, default_value = "0")]
    value: String,

    /// Hex call data (0x for a plain transfer).
    #[arg(long, default_value = "0x")]
    data: String,
}

/// What `sign` writes and `verify` reads.
#[derive(Debug, Serialize, Deserialize)]
struct SignedIntentFile {
    signed_intent: SignedIntent,
    /// `execute(...)` calldata for the wallet, 0x-hex.
    calldata: String,
    signer: Address,
    signed_at: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Address { key } => {
            let signer = local_signer(key, &config)?;
            println!("{}", signer.address());
        }
        Command::Sign {
            key,
            intent,
            nonce,
            out,
        } => sign(&config, key, intent, Nonce(*nonce), out.as_deref()).await?,
        Command::Verify { path, expect } => verify(path, expect.as_deref())?,
        Command::Simulate { key, intent, count } => simulate(&config, key, intent, *count).await?,
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<RelayConfig> {
    let mut config = match &cli.config {
        Some(path) => RelayConfig::from_json_file(path)?,
        None => RelayConfig::default(),
    };
    if let Some(chain_id) = cli.chain_id {
        config.chain_id = chain_id;
    }
    if let Some(ref wallet) = cli.wallet {
        config.wallet = parse_address(wallet).context("invalid --wallet")?;
    }
    if let Some(ms) = cli.relay_timeout_ms {
        config.relay_timeout_ms = ms;
    }
    if let Some(scheme) = cli.scheme {
        config.scheme = scheme;
    }
    tracing::debug!(?config, "configuration loaded");
    Ok(config)
}

fn parse_scheme(s: &str) -> std::result::Result<SignatureScheme, String> {
    match s {
        "personal_message" | "personal" => Ok(SignatureScheme::PersonalMessage),
        "raw_digest" | "raw" => Ok(SignatureScheme::RawDigest),
        other => Err(format!("unknown signature scheme `{other}`")),
    }
}

fn local_signer(key: &KeyArgs, config: &RelayConfig) -> Result<LocalKeySigner> {
    let signer = match (&key.private_key, &key.email, &key.password) {
        (Some(pk), _, _) => LocalKeySigner::from_hex(pk).context("invalid private key")?,
        (None, Some(email), Some(password)) => {
            LocalKeySigner::from_credentials(email, password, config.kdf())
                .context("failed deriving key from credentials")?
        }
        _ => {
            return Err(anyhow!(
                "missing signing key: provide --private-key (or set PKEY), \
                 or --email and --password"
            ))
        }
    };
    Ok(signer.with_scheme(config.scheme))
}

fn build_intent(args: &IntentArgs) -> Result<Intent> {
    Intent::parse_with_ether(&args.target, &args.value, &args.data).context("invalid intent")
}

async fn sign(
    config: &RelayConfig,
    key: &KeyArgs,
    intent: &IntentArgs,
    nonce: Nonce,
    out: Option<&Path>,
) -> Result<()> {
    let signer = local_signer(key, config)?;
    let intent = build_intent(intent)?;
    let context = config.context();

    let ledger = Arc::new(NonceLedger::new());
    ledger.sync(context.wallet, nonce)?;
    let signed = IntentAuthorizer::new(ledger)
        .authorize(&context, intent, &signer)
        .await?;

    let file = SignedIntentFile {
        calldata: format!("0x{}", hex::encode(signed.calldata())),
        signer: signer.address(),
        signed_at: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        signed_intent: signed,
    };

    match out {
        Some(path) => {
            write_json_atomic(path, &file)?;
            println!(
                "Signed nonce {} for wallet {} -> {}",
                file.signed_intent.nonce,
                file.signed_intent.context.wallet,
                path.display()
            );
        }
        None => println!(
            "{}",
            serde_json::to_string_pretty(&file).context("failed serialising signed intent")?
        ),
    }
    Ok(())
}

fn verify(path: &Path, expect: Option<&str>) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    let file: SignedIntentFile = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing JSON in {}", path.display()))?;
    let signed = &file.signed_intent;

    let recovered = signed.recover_signer().context("signature does not verify")?;
    if file.calldata != format!("0x{}", hex::encode(signed.calldata())) {
        bail!("calldata does not match the signed intent");
    }
    if recovered != file.signer {
        bail!("signature recovers to {recovered}, file claims {}", file.signer);
    }
    if let Some(expect) = expect {
        let expected = parse_address(expect).context("invalid --expect")?;
        if recovered != expected {
            bail!("signature recovers to {recovered}, expected {expected}");
        }
    }

    println!(
        "OK: nonce {} on chain {} for wallet {} signed by {}",
        signed.nonce, signed.context.chain_id, signed.context.wallet, recovered
    );
    Ok(())
}

async fn simulate(
    config: &RelayConfig,
    key: &KeyArgs,
    intent: &IntentArgs,
    count: u32,
) -> Result<()> {
    let signer = Arc::new(local_signer(key, config)?);
    let intent = build_intent(intent)?;
    let context = config.context();

    let executor = Arc::new(LocalExecutor::new(config.chain_id, config.scheme));
    executor.register(context.wallet, signer.address());
    let client = RelayClient::new(Arc::clone(&executor), config.relay_timeout());

    let session = Arc::new(Session::new(context));
    session.connect(signer);
    let relay = IntentRelay::new(session, Arc::new(NonceLedger::new()), client.clone());

    let mut last = None;
    for _ in 0..count {
        let signed = relay.authorize(intent.clone()).await?;
        let receipt = relay.submit(&signed).await?;
        println!("Executed nonce {} (tx {})", receipt.nonce, receipt.tx_hash);
        last = Some(signed);
    }

    let Some(replayed) = last else {
        return Ok(());
    };
    match client.submit(&replayed).await {
        Err(RelayError::Rejected(reason)) => {
            println!("Replay of nonce {} rejected: {reason}", replayed.nonce);
        }
        other => bail!("replay was not rejected: {other:?}"),
    }
    println!(
        "Wallet {} executed {} intent(s); ledger next nonce {}",
        context.wallet,
        executor.executed(context.wallet).len(),
        relay.ledger().status(context.wallet).next
    );
    Ok(())
}

fn write_json_atomic(path: &Path, value: &impl Serialize) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating directory {}", parent.display()))?;
    }

    let serialised = serde_json::to_string_pretty(value).context("failed serialising JSON")?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, serialised.as_bytes())
        .with_context(|| format!("failed writing temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("failed replacing {}", path.display()))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}
