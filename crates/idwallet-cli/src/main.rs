//! idwallet CLI — `idw` command.
//!
//! Creates identities, issues and revokes credentials, publishes identity
//! state and checks revocation status against a wallet kept under `--home`.
//! Everything runs in-process: states are anchored to a local ledger that
//! also mirrors the published revocation nodes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::debug;
use serde_json::{Map, Value};

use idwallet::kms::EncryptedFileKeyStore;
use idwallet::storage::{CredentialFilter, CredentialSort, CredentialStore, FileStore, KeyValueStore};
use idwallet::{
    AgentResolver, CachePolicy, ChainEndpoint, CreateIdentityOptions, CredentialRequest,
    CredentialWallet, DataStorage, Did, IdentityWallet, IssuerResolver, KeyCustodian, KeyType,
    LocalAgentTransport, LocalIssuerClient, LocalLedger, OnChainResolver, PublishOutcome,
    ResolverRegistry, RevocationOptions, RevocationResolver, RhsResolver, StatusType,
    WalletConfig,
};

const DEFAULT_RHS_URL: &str = "https://rhs-staging.polygonid.me";
const PASSPHRASE_ENV: &str = "IDW_PASSPHRASE";
const LOCAL_CHAIN_ID: u64 = 31337;
const LOCAL_CONTRACT: &str = "0x0000000000000000000000000000000000000000";

// ── Directory helpers ─────────────────────────────────────────────────────────

fn default_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME not set; pass --home")?;
    Ok(PathBuf::from(home).join(".idwallet"))
}

// ── Passphrase helper ─────────────────────────────────────────────────────────

fn read_passphrase() -> Result<String> {
    if let Ok(passphrase) = std::env::var(PASSPHRASE_ENV) {
        return Ok(passphrase);
    }
    eprint!("Key store passphrase: ");
    let mut passphrase = String::new();
    std::io::stdin()
        .read_line(&mut passphrase)
        .context("failed to read passphrase")?;
    Ok(passphrase.trim().to_string())
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

/// Parse a duration string like "24h", "7d", "30d" or "1h30m".
fn parse_duration(s: &str) -> Result<chrono::Duration> {
    let s = s.trim();
    let mut total_secs: i64 = 0;
    let mut current = String::new();

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            current.push(ch);
        } else {
            let val: i64 = current
                .parse()
                .map_err(|_| anyhow!("invalid duration: {s}"))?;
            current.clear();
            match ch {
                'd' => total_secs += val * 86400,
                'h' => total_secs += val * 3600,
                'm' => total_secs += val * 60,
                's' => total_secs += val,
                _ => bail!("unknown duration unit '{ch}' in '{s}'"),
            }
        }
    }

    if !current.is_empty() {
        bail!("duration '{s}' is missing a unit (d/h/m/s)");
    }
    if total_secs == 0 {
        bail!("duration must be > 0");
    }
    Ok(chrono::Duration::seconds(total_secs))
}

/// Descriptor id used when `--status-id` is not given.
fn default_status_id(status_type: StatusType) -> String {
    match status_type {
        StatusType::ReverseHashService => DEFAULT_RHS_URL.to_string(),
        StatusType::Issuer => "local://issuer".to_string(),
        StatusType::OnChain => {
            format!("local://ledger?contractAddress={LOCAL_CHAIN_ID}:{LOCAL_CONTRACT}")
        }
        StatusType::Agent => "local://agent".to_string(),
    }
}

fn revocation_options(status: &str, status_id: Option<String>) -> Result<RevocationOptions> {
    let status_type: StatusType = status.parse()?;
    let id = status_id.unwrap_or_else(|| default_status_id(status_type));
    Ok(RevocationOptions::new(status_type, id))
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// idwallet CLI — self-sovereign identities and verifiable credentials.
#[derive(Parser, Debug)]
#[command(
    name = "idw",
    about = "idwallet CLI",
    version,
    long_about = "idw — idwallet CLI\n\nCreate DIDs, issue and revoke credentials, publish identity state\nand check revocation status. Set IDW_PASSPHRASE to skip the prompt."
)]
struct Cli {
    /// Wallet directory (default: ~/.idwallet)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an identity and print its DID and auth credential
    Create {
        #[arg(long, default_value = "iden3")]
        method: String,

        #[arg(long, default_value = "polygon")]
        blockchain: String,

        #[arg(long, default_value = "main")]
        network: String,

        /// Revocation strategy (issuer, rhs, onchain, agent)
        #[arg(long, default_value = "rhs")]
        status: String,

        /// Revocation endpoint written into credentials
        #[arg(long)]
        status_id: Option<String>,

        /// Key type (ed25519, secp256k1)
        #[arg(long, default_value = "ed25519")]
        key_type: String,

        /// Anchor the genesis state right away
        #[arg(long)]
        publish: bool,
    },

    /// List identities
    List,

    /// Show one identity
    Show {
        #[arg(long)]
        did: String,
    },

    /// Issue a credential and store it in the wallet
    Issue {
        #[arg(long)]
        issuer: String,

        /// Schema URL
        #[arg(long)]
        schema: String,

        /// Credential type
        #[arg(long)]
        r#type: String,

        /// Credential subject as a JSON object
        #[arg(long)]
        subject: String,

        /// Lifetime such as 30d or 12h
        #[arg(long)]
        expires: Option<String>,

        /// Fixed revocation nonce
        #[arg(long)]
        nonce: Option<u64>,
    },

    /// Revoke a credential by revocation nonce
    Revoke {
        #[arg(long)]
        issuer: String,

        #[arg(long)]
        nonce: u64,
    },

    /// Anchor an identity's current state
    Publish {
        #[arg(long)]
        did: String,
    },

    /// List stored credentials
    Credentials {
        #[arg(long)]
        issuer: Option<String>,

        #[arg(long)]
        subject: Option<String>,
    },

    /// Check a stored credential's revocation status
    Status {
        /// Credential id
        #[arg(long)]
        id: String,

        /// Ignore cached results
        #[arg(long)]
        refresh: bool,
    },

    /// Derive a profile of an identity for one verifier
    Profile {
        #[arg(long)]
        did: String,

        #[arg(long)]
        nonce: u64,

        #[arg(long)]
        verifier: String,
    },
}

// ── Wallet stack ──────────────────────────────────────────────────────────────

struct Stack {
    wallet: Arc<IdentityWallet>,
    credentials: Arc<CredentialWallet>,
}

async fn open_stack(home: &Path) -> Result<Stack> {
    tokio::fs::create_dir_all(home)
        .await
        .with_context(|| format!("failed to create {}", home.display()))?;
    let config_path = home.join("config.json");
    let config = if config_path.exists() {
        WalletConfig::from_file(&config_path)?
    } else {
        WalletConfig::default()
    };
    debug!("wallet home {}, tree depth {}", home.display(), config.tree_depth);

    let passphrase = read_passphrase()?;
    let keys = EncryptedFileKeyStore::open(home.join("keys"), &passphrase).await?;
    let kms = Arc::new(KeyCustodian::with_store(Arc::new(keys)));

    let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(home.join("data")).await?);
    let ledger_kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(home.join("ledger")).await?);
    let ledger = Arc::new(LocalLedger::open(LOCAL_CHAIN_ID, ledger_kv).await?);

    let resolvers = Arc::new(ResolverRegistry::new());
    let credentials = Arc::new(
        CredentialWallet::new(CredentialStore::new(kv.clone()), resolvers.clone())
            .with_resolve_timeout(config.resolve_timeout()),
    );
    let depth = config.tree_depth;
    let storage = DataStorage::new(kv, ledger.clone());
    let wallet = Arc::new(
        IdentityWallet::new(kms, storage, credentials.clone(), config)?
            .with_node_publisher(ledger.clone()),
    );

    resolvers
        .register(
            StatusType::Issuer,
            RevocationResolver::Issuer(IssuerResolver::new(
                Arc::new(LocalIssuerClient::new(&wallet)),
                depth,
            )),
        )
        .await?;
    resolvers
        .register(
            StatusType::ReverseHashService,
            RevocationResolver::ReverseHashService(
                RhsResolver::new(ledger.clone(), ledger.clone(), depth),
            ),
        )
        .await?;
    resolvers
        .register(
            StatusType::OnChain,
            RevocationResolver::OnChain(OnChainResolver::new(
                vec![ChainEndpoint {
                    chain_id: LOCAL_CHAIN_ID,
                    anchor: ledger.clone(),
                    nodes: ledger,
                }],
                depth,
            )),
        )
        .await?;
    resolvers
        .register(
            StatusType::Agent,
            RevocationResolver::Agent(AgentResolver::new(
                Arc::new(LocalAgentTransport::new(&wallet)),
                depth,
            )),
        )
        .await?;

    Ok(Stack {
        wallet,
        credentials,
    })
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let result = run(cli).await;

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let home = match cli.home {
        Some(home) => home,
        None => default_home()?,
    };
    let stack = open_stack(&home).await?;

    match cli.command {
        Commands::Create {
            method,
            blockchain,
            network,
            status,
            status_id,
            key_type,
            publish,
        } => {
            let key_type: KeyType = key_type.parse()?;
            let opts = CreateIdentityOptions::new(
                method,
                blockchain,
                network,
                revocation_options(&status, status_id)?,
            )
            .key_type(key_type)
            .publish_genesis(publish);
            cmd_create(&stack, opts).await
        }
        Commands::List => cmd_list(&stack).await,
        Commands::Show { did } => cmd_show(&stack, &did).await,
        Commands::Issue {
            issuer,
            schema,
            r#type,
            subject,
            expires,
            nonce,
        } => {
            cmd_issue(
                &stack,
                &issuer,
                schema,
                r#type,
                &subject,
                expires.as_deref(),
                nonce,
            )
            .await
        }
        Commands::Revoke { issuer, nonce } => cmd_revoke(&stack, &issuer, nonce).await,
        Commands::Publish { did } => cmd_publish(&stack, &did).await,
        Commands::Credentials { issuer, subject } => cmd_credentials(&stack, issuer, subject).await,
        Commands::Status { id, refresh } => cmd_status(&stack, &id, refresh).await,
        Commands::Profile {
            did,
            nonce,
            verifier,
        } => cmd_profile(&stack, &did, nonce, &verifier).await,
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `idw create`
async fn cmd_create(stack: &Stack, opts: CreateIdentityOptions) -> Result<()> {
    let created = stack.wallet.create_identity(opts).await?;
    println!("{}", created.did);
    println!("{}", serde_json::to_string_pretty(&created.credential)?);
    Ok(())
}

/// `idw list`
async fn cmd_list(stack: &Stack) -> Result<()> {
    let dids = stack.wallet.identities().await?;
    if dids.is_empty() {
        println!("No identities found");
        return Ok(());
    }

    println!("{:<80} {:<10} CLAIMS", "DID", "STATUS");
    println!("{}", "-".repeat(100));
    for did in &dids {
        match stack.wallet.identity_info(did).await {
            Ok(info) => println!(
                "{:<80} {:<10} {}",
                info.did,
                format!("{:?}", info.status).to_lowercase(),
                info.claims
            ),
            Err(e) => println!("{:<80} (failed to load: {e})", did.to_string()),
        }
    }
    Ok(())
}

/// `idw show --did DID`
async fn cmd_show(stack: &Stack, did: &str) -> Result<()> {
    let did = Did::parse(did)?;
    let info = stack.wallet.identity_info(&did).await?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    let profiles = stack.wallet.profiles(&did).await?;
    if !profiles.is_empty() {
        println!("Profiles:");
        for p in profiles {
            println!("  {:>6}  {}  {}", p.nonce, p.did, p.verifier);
        }
    }
    Ok(())
}

/// `idw issue --issuer DID --schema URL --type T --subject JSON`
async fn cmd_issue(
    stack: &Stack,
    issuer: &str,
    schema: String,
    credential_type: String,
    subject: &str,
    expires: Option<&str>,
    nonce: Option<u64>,
) -> Result<()> {
    let issuer = Did::parse(issuer)?;
    let subject: Map<String, Value> = match serde_json::from_str(subject)? {
        Value::Object(map) => map,
        _ => bail!("--subject must be a JSON object"),
    };

    let mut request = CredentialRequest::new(schema, credential_type, subject);
    if let Some(expires) = expires {
        request = request.expires(chrono::Utc::now() + parse_duration(expires)?);
    }
    if let Some(nonce) = nonce {
        // Keep the issuer's strategy and endpoint, pin only the nonce.
        let default = stack
            .credentials
            .find_auth_credential(&issuer)
            .await?
            .map(|c| RevocationOptions::new(c.credential_status.status_type, c.credential_status.id))
            .ok_or_else(|| anyhow!("no auth credential stored for {issuer}"))?;
        request = request.revocation(default.with_nonce(nonce));
    }

    let credential = stack.wallet.issue_credential(&issuer, request).await?;
    stack.credentials.save(&credential).await?;
    println!("{}", serde_json::to_string_pretty(&credential)?);
    Ok(())
}

/// `idw revoke --issuer DID --nonce N`
async fn cmd_revoke(stack: &Stack, issuer: &str, nonce: u64) -> Result<()> {
    let issuer = Did::parse(issuer)?;
    let state = stack.wallet.revoke_credential(&issuer, nonce).await?;
    println!("Revoked nonce {nonce}");
    println!("  Local state: {}", state.value);
    println!("  Run `idw publish --did {issuer}` to make it visible to verifiers.");
    Ok(())
}

/// `idw publish --did DID`
async fn cmd_publish(stack: &Stack, did: &str) -> Result<()> {
    let did = Did::parse(did)?;
    match stack.wallet.publish_state(&did).await? {
        PublishOutcome::Published(record) => {
            println!("Published state {}", record.state.value);
            println!("  Seq:       {}", record.seq);
            if let Some(previous) = record.previous {
                println!("  Previous:  {previous}");
            }
            println!("  Anchored:  {}", record.published_at);
        }
        PublishOutcome::AlreadyPublished => println!("State already published"),
    }
    Ok(())
}

/// `idw credentials [--issuer DID] [--subject ID]`
async fn cmd_credentials(
    stack: &Stack,
    issuer: Option<String>,
    subject: Option<String>,
) -> Result<()> {
    let mut filter = CredentialFilter::default().sorted(CredentialSort::IssuanceDateAsc);
    if let Some(issuer) = issuer {
        filter = filter.issuer(issuer);
    }
    if let Some(subject) = subject {
        filter = filter.subject(subject);
    }
    let credentials = stack.credentials.list(&filter).await?;
    if credentials.is_empty() {
        println!("No credentials found");
        return Ok(());
    }
    for c in credentials {
        println!(
            "{}  {}  nonce {}  {}",
            c.id,
            c.primary_type().unwrap_or("-"),
            c.credential_status.revocation_nonce,
            c.issuance_date.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

/// `idw status --id CREDENTIAL_ID [--refresh]`
async fn cmd_status(stack: &Stack, id: &str, refresh: bool) -> Result<()> {
    let credential = stack.credentials.get(id).await?;
    let policy = if refresh {
        CachePolicy::Refresh
    } else {
        CachePolicy::PreferCached
    };
    let status = stack
        .credentials
        .get_revocation_status(&credential, policy)
        .await?;
    println!(
        "{} via {}",
        if status.revoked { "REVOKED" } else { "valid" },
        credential.credential_status.status_type
    );
    println!("  Nonce:        {}", status.nonce);
    println!("  Issuer state: {}", status.issuer_state.value);
    Ok(())
}

/// `idw profile --did DID --nonce N --verifier V`
async fn cmd_profile(stack: &Stack, did: &str, nonce: u64, verifier: &str) -> Result<()> {
    let did = Did::parse(did)?;
    let profile = stack.wallet.create_profile(&did, nonce, verifier).await?;
    println!("{}", profile.did);
    Ok(())
}
