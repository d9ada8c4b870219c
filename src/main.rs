// ABOUTME: Command-line entry point for the VPN Wizard client
// ABOUTME: Parses arguments, loads config and preferences, and runs one wizard operation

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use dialoguer::Password;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use vpn_wizard_client::artifacts::{save_config, save_qr};
use vpn_wizard_client::config::{Config, LoggingConfig};
use vpn_wizard_client::i18n::{t, Label, Lang};
use vpn_wizard_client::remote::{ClientConfig, ProvisionOptions, SshPayload, DEFAULT_CLIENT_NAME};
use vpn_wizard_client::session::{PreferenceStore, ServerRegistry};
use vpn_wizard_client::storage::home_dir;
use vpn_wizard_client::view::{render, NullSurface, Surface, TerminalSurface};
use vpn_wizard_client::{ApiClient, PollOutcome, SessionStore, Wizard};

#[derive(Parser)]
#[command(name = "vpnw", author, version, about = "Provision a VPN server over SSH through the VPN Wizard API", long_about = None)]
struct Cli {
    /// Config file (defaults to $VPNW_HOME/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// API base URL; remembered for later runs
    #[arg(long, global = true)]
    api: Option<String>,

    /// Interface language (en, ru); remembered for later runs
    #[arg(long, global = true)]
    lang: Option<Lang>,

    /// More log output (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SshArgs {
    /// Server hostname or IP. Defaults to the most recently used server
    #[arg(long)]
    host: Option<String>,
    /// SSH username. Defaults to the saved user for the host, else root
    #[arg(long)]
    user: Option<String>,
    /// SSH port
    #[arg(long)]
    port: Option<u16>,
    /// SSH password
    #[arg(long, env = "VPNW_SSH_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// Prompt for the SSH password
    #[arg(long)]
    ask_password: bool,
    /// SSH private key file
    #[arg(long)]
    key: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the server is reachable and already configured
    Status {
        #[command(flatten)]
        ssh: SshArgs,
    },
    /// Configure the VPN server and download the first client profile
    Provision {
        #[command(flatten)]
        ssh: SshArgs,
        /// Client name (server default: client1)
        #[arg(long)]
        client: Option<String>,
        /// VPN listen port
        #[arg(long)]
        listen_port: Option<u16>,
        /// Skip MTU auto-detection
        #[arg(long)]
        no_auto_mtu: bool,
        /// Skip network tuning
        #[arg(long)]
        no_tune: bool,
        /// Skip post-provision checks
        #[arg(long)]
        no_check: bool,
    },
    /// Manage client profiles
    Clients {
        #[command(subcommand)]
        action: ClientCommands,
    },
    /// Restore the last server config backup
    Rollback {
        #[command(flatten)]
        ssh: SshArgs,
    },
    /// List recently used servers
    Servers,
    /// Check that the API is reachable
    Health,
}

#[derive(Subcommand)]
enum ClientCommands {
    /// List clients on the server
    List {
        #[command(flatten)]
        ssh: SshArgs,
    },
    /// Create a client and download its profile
    Add {
        #[command(flatten)]
        ssh: SshArgs,
        /// Client name; the server picks the next free one when omitted
        name: Option<String>,
        #[arg(long)]
        listen_port: Option<u16>,
    },
    /// Download a client's config and QR code
    Export {
        #[command(flatten)]
        ssh: SshArgs,
        name: String,
    },
    /// Download only a client's QR code
    Qr {
        #[command(flatten)]
        ssh: SshArgs,
        name: String,
    },
    /// Issue new keys for a client
    Rotate {
        #[command(flatten)]
        ssh: SshArgs,
        name: String,
        #[arg(long)]
        listen_port: Option<u16>,
    },
    /// Delete a client
    Remove {
        #[command(flatten)]
        ssh: SshArgs,
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let home = home_dir();
    let config = Config::load(cli.config.as_deref(), &home.join("config.toml"))?;
    init_logging(&config.logging, cli.verbose);

    let mut prefs = PreferenceStore::open(home.join("prefs.json"))?;
    if let Some(api) = &cli.api {
        prefs.remember_api_base(api)?;
    }
    if let Some(lang) = cli.lang {
        prefs.remember_language(lang)?;
    }
    let api_base = config.resolve_api_base(cli.api.as_deref(), prefs.get());
    let locale = std::env::var("LANG").ok();
    let lang = config.resolve_language(cli.lang, prefs.get(), locale.as_deref());
    let registry = ServerRegistry::open(home.join("servers.json"))?;
    let out_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    tracing::debug!(%api_base, %lang, home = %home.display(), "Starting");

    if let Commands::Servers = cli.command {
        print_servers(&registry);
        return Ok(());
    }

    let target = match &cli.command {
        Commands::Status { ssh }
        | Commands::Provision { ssh, .. }
        | Commands::Rollback { ssh } => Some(resolve_target(ssh, &registry)?),
        Commands::Clients { action } => Some(resolve_target(action.ssh(), &registry)?),
        Commands::Servers | Commands::Health => None,
    };

    let terminal = match cli.command {
        Commands::Provision { .. } => Some(Arc::new(TerminalSurface::new())),
        _ => None,
    };
    let surface: Arc<dyn Surface> = match &terminal {
        Some(terminal) => terminal.clone() as Arc<dyn Surface>,
        None => Arc::new(NullSurface),
    };

    let client = Arc::new(ApiClient::new(api_base, config.request_timeout())?);
    tracing::debug!(api_base = client.base_url(), "API client ready");
    let store = Arc::new(SessionStore::new(lang, surface));
    let mut wizard = Wizard::new(client, store, registry, config.poll.settings());
    if let Some(target) = target {
        wizard.set_target(target);
    }

    let outcome = run(&mut wizard, cli.command, &out_dir, lang).await;
    if let Some(terminal) = terminal {
        terminal.finish();
    }
    outcome
}

fn init_logging(config: &LoggingConfig, verbose: u8) {
    let directive = match verbose {
        0 => config.level.clone(),
        1 => "info,vpn_wizard_client=debug,vpnw=debug".to_string(),
        _ => "debug,vpn_wizard_client=trace,vpnw=trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

impl ClientCommands {
    fn ssh(&self) -> &SshArgs {
        match self {
            ClientCommands::List { ssh }
            | ClientCommands::Add { ssh, .. }
            | ClientCommands::Export { ssh, .. }
            | ClientCommands::Qr { ssh, .. }
            | ClientCommands::Rotate { ssh, .. }
            | ClientCommands::Remove { ssh, .. } => ssh,
        }
    }
}

/// Builds the SSH payload. Credentials come from flags, the environment or a
/// prompt and are never written to disk.
fn resolve_target(args: &SshArgs, registry: &ServerRegistry) -> Result<SshPayload> {
    let host = match &args.host {
        Some(host) => host.trim().to_string(),
        None => registry
            .most_recent()
            .map(|saved| saved.host.clone())
            .context("No --host given and no saved server to fall back to")?,
    };
    let saved_user = registry
        .list()
        .iter()
        .find(|saved| saved.host == host)
        .and_then(|saved| saved.user.clone());
    let user = args
        .user
        .clone()
        .or(saved_user)
        .unwrap_or_else(|| "root".to_string());

    let password = if args.ask_password {
        let entered = Password::new()
            .with_prompt(format!("SSH password for {}@{}", user, host))
            .interact()
            .context("Failed to read password")?;
        Some(entered)
    } else {
        args.password.clone().filter(|p| !p.is_empty())
    };

    let key_content = args
        .key
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read SSH key {}", path.display()))
        })
        .transpose()?;

    Ok(SshPayload {
        host,
        user,
        port: args.port,
        password,
        key_content,
    })
}

async fn run(
    wizard: &mut Wizard<ApiClient>,
    command: Commands,
    out_dir: &Path,
    lang: Lang,
) -> Result<()> {
    match command {
        Commands::Status { .. } => {
            let status = wizard.check_server().await?;
            println!("{}", render(&wizard.store().snapshot()).status);
            if let Some(protocol) = &status.protocol {
                println!("  protocol:     {}", protocol);
            }
            if let Some(port) = status.listen_port {
                println!("  listen port:  {}", port);
            }
            if let Some(port) = status.tyumen_port {
                println!("  tyumen port:  {}", port);
            }
            if let Some(count) = status.clients_count {
                println!("  clients:      {}", count);
            }
        }
        Commands::Provision {
            client,
            listen_port,
            no_auto_mtu,
            no_tune,
            no_check,
            ..
        } => {
            let options = ProvisionOptions {
                client_name: client,
                auto_mtu: !no_auto_mtu,
                tune: !no_tune,
                check: !no_check,
                listen_port,
            };
            let job_id = wizard.probe_and_provision(options).await?;
            tracing::info!(%job_id, "Provisioning job submitted");

            match wizard.wait().await {
                PollOutcome::Done(result) => {
                    let snapshot = wizard.store().snapshot();
                    let name = snapshot
                        .result
                        .map(|panel| panel.download_name)
                        .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string());
                    write_profile(
                        out_dir,
                        lang,
                        &name,
                        &result.config,
                        &result.qr_png_base64,
                        true,
                    )?;
                    println!("{}", render(&wizard.store().snapshot()).status);
                }
                PollOutcome::Failed(err) => bail!("{}: {}", t(lang, Label::Failed), err),
                PollOutcome::Cancelled => bail!("Provisioning job was cancelled"),
            }
        }
        Commands::Clients { action } => run_clients(wizard, action, out_dir, lang).await?,
        Commands::Rollback { .. } => {
            wizard.rollback().await?;
            println!("{}", render(&wizard.store().snapshot()).status);
        }
        Commands::Health => {
            let ok = wizard.health().await?;
            if !ok {
                bail!("API answered but did not report ok");
            }
            println!("ok");
        }
        Commands::Servers => print_servers(wizard.registry()),
    }
    Ok(())
}

async fn run_clients(
    wizard: &mut Wizard<ApiClient>,
    action: ClientCommands,
    out_dir: &Path,
    lang: Lang,
) -> Result<()> {
    match action {
        ClientCommands::List { .. } => {
            wizard.refresh_clients().await?;
            let screen = render(&wizard.store().snapshot());
            println!("{}:", t(lang, Label::Clients));
            if screen.roster.is_empty() {
                println!("  {}", t(lang, Label::NoClients));
            }
            for row in screen.roster {
                println!("  {}", row);
            }
        }
        ClientCommands::Add {
            name, listen_port, ..
        } => {
            let profile = wizard.add_client(name.as_deref(), listen_port).await?;
            save_profile(out_dir, lang, &profile, true)?;
        }
        ClientCommands::Export { name, .. } => {
            let profile = wizard.export_client(&name).await?;
            save_profile(out_dir, lang, &profile, true)?;
        }
        ClientCommands::Qr { name, .. } => {
            let profile = wizard.client_qr(&name).await?;
            save_profile(out_dir, lang, &profile, false)?;
        }
        ClientCommands::Rotate {
            name, listen_port, ..
        } => {
            let profile = wizard.rotate_client(&name, listen_port).await?;
            save_profile(out_dir, lang, &profile, true)?;
        }
        ClientCommands::Remove { name, .. } => {
            wizard.remove_client(&name).await?;
            println!("{}: {}", t(lang, Label::Removed), name);
        }
    }
    Ok(())
}

fn save_profile(
    out_dir: &Path,
    lang: Lang,
    profile: &ClientConfig,
    with_config: bool,
) -> Result<()> {
    write_profile(
        out_dir,
        lang,
        &profile.client_name,
        &profile.config,
        &profile.qr_png_base64,
        with_config,
    )
}

fn write_profile(
    out_dir: &Path,
    lang: Lang,
    name: &str,
    config: &str,
    qr_png_base64: &str,
    with_config: bool,
) -> Result<()> {
    if with_config {
        let path = save_config(out_dir, name, config)?;
        println!("{}: {}", t(lang, Label::Saved), path.display());
    }
    if let Some(path) = save_qr(out_dir, name, qr_png_base64)? {
        println!("{}: {}", t(lang, Label::Saved), path.display());
    }
    Ok(())
}

fn print_servers(registry: &ServerRegistry) {
    if registry.list().is_empty() {
        println!("No saved servers");
        return;
    }
    println!("{:<24} {:<12} {:<8} {:<8}", "HOST", "USER", "PORT", "CLIENTS");
    for saved in registry.list() {
        println!(
            "{:<24} {:<12} {:<8} {:<8}",
            saved.host,
            saved.user.as_deref().unwrap_or("-"),
            saved.listen_port.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
            saved.clients_count.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }
}
