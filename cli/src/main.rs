//! Vouch CLI: check verification status and run the email and PIX
//! verification flows from a terminal.

mod config;
mod interactive;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use config::CliConfig;
use vouch_client::{HttpClient, VerificationApi};
use vouch_crypto::{generate_keypair, keypair_from_seed_hex, KeypairSigner, Signer};
use vouch_types::AccountAddress;
use vouch_utils::LogFormat;
use vouch_verification::ValidationGate;

#[derive(Parser)]
#[command(name = "vouch", about = "Account email and PIX verification client")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the marketplace API.
    #[arg(long, global = true, env = "VOUCH_SERVER_URL")]
    server_url: Option<String>,

    /// Domain line used in signed payloads.
    #[arg(long, global = true, env = "VOUCH_DOMAIN")]
    domain: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, global = true, env = "VOUCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, global = true, env = "VOUCH_LOG_FORMAT")]
    log_format: Option<String>,

    /// Hex-encoded 32-byte Ed25519 seed of the signing account.
    #[arg(long, global = true, env = "VOUCH_SIGNER_SEED", hide_env_values = true)]
    seed_hex: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the validation status of an account.
    Status {
        /// Account address (defaults to the signer's).
        address: Option<String>,
    },
    /// Show where the route gate would send an account.
    Gate {
        /// Page the user is trying to open.
        destination: String,
        /// Account address (defaults to the signer's; "-" for signed out).
        #[arg(long)]
        address: Option<String>,
    },
    /// Verify an email address interactively.
    Email {
        /// Send the code to this address right away.
        email: Option<String>,
    },
    /// Verify a PIX key interactively.
    Pix {
        /// Page to return to after verification.
        #[arg(long)]
        return_to: Option<String>,
    },
    /// Generate a new signer seed.
    Keygen,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<CliConfig> {
        let mut config = match &self.config {
            Some(path) => CliConfig::from_toml_file(path)?,
            None => CliConfig::default(),
        };
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(domain) = &self.domain {
            config.flow.domain = domain.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = LogFormat::parse(format);
        }
        Ok(config)
    }

    fn signer(&self) -> anyhow::Result<Arc<KeypairSigner>> {
        let seed = self.seed_hex.as_deref().ok_or_else(|| {
            anyhow::anyhow!("no signer seed: pass --seed-hex or set VOUCH_SIGNER_SEED")
        })?;
        let keys = keypair_from_seed_hex(seed)
            .ok_or_else(|| anyhow::anyhow!("signer seed must be 64 hex characters"))?;
        Ok(Arc::new(KeypairSigner::new(keys)))
    }

    // An explicit address wins; otherwise the signer's own.
    fn address(&self, explicit: Option<&str>) -> anyhow::Result<AccountAddress> {
        match explicit {
            Some(raw) => {
                let address = AccountAddress::new(raw);
                anyhow::ensure!(address.is_valid(), "address must be 64 hex characters");
                Ok(address)
            }
            None => Ok(AccountAddress::from(&self.signer()?.public_key())),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;
    vouch_utils::init_logging(config.log_format, &config.log_level);

    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    let api = Arc::new(HttpClient::with_timeouts(
        config.server_url.clone(),
        config.request_timeout(),
        config.connect_timeout(),
    )?);

    match &cli.command {
        Command::Status { address } => {
            let address = cli.address(address.as_deref())?;
            let status = api.validation_status(&address).await?;
            println!("account:  {address}");
            println!(
                "email:    {}",
                describe(status.email_verified, status.email_verification_pending)
            );
            println!(
                "pix:      {}",
                describe(status.pix_verified, status.pix_verification_pending)
            );
        }
        Command::Gate {
            destination,
            address,
        } => {
            let account = match address.as_deref() {
                Some("-") => None,
                other => Some(cli.address(other)?),
            };
            let mut gate = ValidationGate::new(Arc::clone(&api), config.flow.routes.clone());
            let decision = gate.check(account.as_ref(), destination).await;
            match decision.target() {
                None => println!("allow {destination}"),
                Some(target) => println!("redirect {target}"),
            }
        }
        Command::Email { email } => {
            let signer = cli.signer()?;
            interactive::run_email(api, signer, config.flow.clone(), email.clone()).await?;
        }
        Command::Pix { return_to } => {
            let signer = cli.signer()?;
            interactive::run_pix(api, signer, config.flow.clone(), return_to.clone()).await?;
        }
        Command::Keygen => {
            let keys = generate_keypair();
            let address = AccountAddress::from(&keys.public);
            println!("seed:    {}", hex::encode(keys.private.0));
            println!("address: {address}");
        }
    }

    Ok(())
}

fn describe(verified: bool, pending: bool) -> &'static str {
    match (verified, pending) {
        (true, _) => "verified",
        (false, true) => "pending",
        (false, false) => "not started",
    }
}
