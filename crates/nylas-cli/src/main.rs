//! Nylas CLI
//!
//! Command-line client for the Nylas v3 API. This binary ships the
//! auth command group: credential configuration, browser-based OAuth
//! login, and grant lifecycle management (status, whoami, list,
//! switch, revoke).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dialoguer::{Confirm, Input, Password, Select};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use nylas_core::auth::AuthService;
use nylas_core::browser::SystemBrowser;
use nylas_core::callback::LocalCallbackServer;
use nylas_core::client::{ApiCredentials, HttpClient};
use nylas_core::config::{Config, OutputFormat, Region};
use nylas_core::credentials::CredentialResolver;
use nylas_core::grants::GrantStore;
use nylas_core::secrets::open_secret_store;
use nylas_core::{Error, Grant, Provider};

/// Timeout for the browser round-trip during login
const LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Parser)]
#[command(name = "nylas")]
#[command(about = "Nylas CLI - email, calendar, and contacts from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output JSON instead of human-readable text. Applies to all subcommands.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Nylas and manage connected accounts.
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Store API credentials and pick the region.
    Config(ConfigArgs),
    /// Connect a mailbox via browser-based OAuth.
    Login {
        /// Mailbox provider (google, microsoft, imap, ews, yahoo, icloud, zoom, other)
        #[arg(short, long)]
        provider: Option<Provider>,
    },
    /// Disconnect an account (the default grant unless --grant is given).
    Logout {
        /// Grant ID to log out instead of the default
        #[arg(long)]
        grant: Option<String>,
    },
    /// Show configuration and connection status.
    Status,
    /// Show the account behind the default grant.
    Whoami,
    /// List grants known to the Nylas application.
    List,
    /// Make another grant the default, by grant ID or email.
    Switch {
        /// Grant ID or email address
        grant: String,
    },
    /// Print the resolved API key (for scripting against the API).
    Token,
    /// Revoke a grant remotely and remove it locally.
    Revoke {
        /// Grant ID to revoke
        grant: String,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// API region (us or eu)
    #[arg(long, value_parser = ["us", "eu"])]
    region: Option<String>,

    /// OAuth client ID
    #[arg(long)]
    client_id: Option<String>,

    /// OAuth client secret
    #[arg(long)]
    client_secret: Option<String>,

    /// API key
    #[arg(long)]
    api_key: Option<String>,

    /// Show the stored configuration (secrets masked)
    #[arg(long)]
    show: bool,

    /// Remove all stored credentials
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("✗ {err:#}");
        if let Some(hint) = err.downcast_ref::<Error>().and_then(Error::action_hint) {
            eprintln!("  {hint}");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("NYLAS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Shared per-invocation state: config plus the stores every auth
/// command needs, constructed once and passed down explicitly.
struct App {
    config: Config,
    resolver: CredentialResolver,
    grants: GrantStore,
    json: bool,
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let json = cli.json || config.output.format == OutputFormat::Json;

    let secrets = open_secret_store()?;
    let app = App {
        resolver: CredentialResolver::new(secrets.clone()),
        grants: GrantStore::new(secrets),
        config,
        json,
    };

    match cli.command {
        Commands::Auth { command } => match command {
            AuthCommands::Config(args) => auth_config(&app, args).await,
            AuthCommands::Login { provider } => auth_login(&app, provider).await,
            AuthCommands::Logout { grant } => auth_logout(&app, grant).await,
            AuthCommands::Status => auth_status(&app).await,
            AuthCommands::Whoami => auth_whoami(&app).await,
            AuthCommands::List => auth_list(&app).await,
            AuthCommands::Switch { grant } => auth_switch(&app, &grant).await,
            AuthCommands::Token => auth_token(&app).await,
            AuthCommands::Revoke { grant, yes } => auth_revoke(&app, &grant, yes).await,
        },
    }
}

/// Build the auth service for commands that talk to the API.
async fn build_service(app: &App) -> Result<AuthService> {
    let creds = app.resolver.require().await?;
    let client = Arc::new(HttpClient::new(
        &app.config,
        ApiCredentials {
            api_key: creds.api_key,
            client_id: creds.client_id,
            client_secret: creds.client_secret,
        },
    )?);
    let server = Box::new(LocalCallbackServer::new(app.config.callback_port));

    Ok(AuthService::new(
        client,
        app.grants.clone(),
        server,
        Arc::new(SystemBrowser),
    ))
}

// ============================================================================
// auth config
// ============================================================================

async fn auth_config(app: &App, args: ConfigArgs) -> Result<()> {
    if args.reset {
        if !app.json {
            let confirmed = Confirm::new()
                .with_prompt("Remove all stored Nylas credentials?")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Aborted.");
                return Ok(());
            }
        }
        app.resolver.clear().await?;
        app.grants.clear_grants().await?;
        print_ok(app, "Credentials and grants removed", json!({"reset": true}));
        return Ok(());
    }

    if args.show {
        return auth_config_show(app).await;
    }

    let has_flags = args.region.is_some()
        || args.client_id.is_some()
        || args.client_secret.is_some()
        || args.api_key.is_some();

    let (region, api_key, client_id, client_secret) = if has_flags {
        (args.region, args.api_key, args.client_id, args.client_secret)
    } else if app.json {
        anyhow::bail!("No configuration flags given (interactive setup needs a terminal)");
    } else {
        prompt_for_config(app)?
    };

    if let Some(region) = region {
        let mut config = app.config.clone();
        config.region = match region.as_str() {
            "eu" => Region::Eu,
            _ => Region::Us,
        };
        config.save()?;
    }

    app.resolver
        .store(api_key.as_deref(), client_id.as_deref(), client_secret.as_deref())
        .await?;

    print_ok(app, "Configuration saved", json!({"configured": true}));
    Ok(())
}

/// Interactive prompts for any field not supplied via flags; empty
/// answers leave the stored value untouched.
fn prompt_for_config(
    app: &App,
) -> Result<(Option<String>, Option<String>, Option<String>, Option<String>)> {
    let regions = &["us", "eu"];
    let default_index = match app.config.region {
        Region::Us => 0,
        Region::Eu => 1,
    };
    let selection = Select::new()
        .with_prompt("API region")
        .items(regions)
        .default(default_index)
        .interact()?;

    let api_key: String = Password::new()
        .with_prompt("API key (leave empty to keep current)")
        .allow_empty_password(true)
        .interact()?;

    let client_id: String = Input::new()
        .with_prompt("OAuth client ID (leave empty to keep current)")
        .allow_empty(true)
        .interact_text()?;

    let client_secret: String = Password::new()
        .with_prompt("OAuth client secret (leave empty to keep current)")
        .allow_empty_password(true)
        .interact()?;

    let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

    Ok((
        Some(regions[selection].to_string()),
        non_empty(api_key),
        non_empty(client_id),
        non_empty(client_secret),
    ))
}

async fn auth_config_show(app: &App) -> Result<()> {
    let api_key = app.resolver.api_key().await?;
    let client_id = app.resolver.client_id().await?;
    let client_secret = app.resolver.client_secret().await?;

    if app.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "region": app.config.region.as_str(),
                "callback_port": app.config.callback_port,
                "api_key": api_key.as_deref().map(mask),
                "client_id": client_id,
                "client_secret": client_secret.as_deref().map(mask),
            }))?
        );
    } else {
        println!("Region:         {}", app.config.region.as_str());
        println!("Callback port:  {}", app.config.callback_port);
        println!("API key:        {}", display_secret(api_key.as_deref()));
        println!("Client ID:      {}", client_id.as_deref().unwrap_or("(not set)"));
        println!("Client secret:  {}", display_secret(client_secret.as_deref()));
    }
    Ok(())
}

// ============================================================================
// auth login / logout / revoke
// ============================================================================

async fn auth_login(app: &App, provider: Option<Provider>) -> Result<()> {
    if !app.resolver.is_configured().await {
        return Err(Error::NotConfigured.into());
    }

    let creds = app.resolver.require().await?;
    if creds.client_id.is_empty() || creds.client_secret.is_empty() {
        anyhow::bail!(
            "OAuth client credentials missing; run `nylas auth config` with --client-id and --client-secret"
        );
    }

    let provider = provider.unwrap_or(app.config.default_provider);
    let mut svc = build_service(app).await?;

    if !app.json {
        println!("🔐 Opening browser for {provider} authentication...");
        println!(
            "⏳ Waiting for the OAuth callback on port {} (up to {} minutes)...",
            app.config.callback_port,
            LOGIN_TIMEOUT.as_secs() / 60
        );
    }

    let grant = svc.login(provider, LOGIN_TIMEOUT).await?;

    if app.json {
        println!("{}", json!({"success": true, "grant": grant}));
    } else {
        println!(
            "✓ Connected {} ({}) as grant {}",
            grant.email, grant.provider, grant.id
        );
    }
    Ok(())
}

async fn auth_logout(app: &App, grant: Option<String>) -> Result<()> {
    let svc = build_service(app).await?;

    match &grant {
        Some(id) => svc.logout_grant(id).await?,
        None => svc.logout().await?,
    }

    print_ok(
        app,
        "Logged out",
        json!({"success": true, "grant": grant}),
    );
    Ok(())
}

async fn auth_revoke(app: &App, grant: &str, yes: bool) -> Result<()> {
    if !yes && !app.json {
        let confirmed = Confirm::new()
            .with_prompt(format!("Revoke grant {}?", grant))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let svc = build_service(app).await?;
    svc.logout_grant(grant).await?;

    print_ok(
        app,
        &format!("Revoked grant {}", grant),
        json!({"success": true, "grant": grant}),
    );
    Ok(())
}

// ============================================================================
// auth status / whoami / list / switch / token
// ============================================================================

async fn auth_status(app: &App) -> Result<()> {
    let configured = app.resolver.is_configured().await;
    let default_grant = app.grants.get_default_grant().await.ok();
    let local_grants = app.grants.list_grants().await?;

    if app.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "configured": configured,
                "region": app.config.region.as_str(),
                "default_grant": default_grant,
                "connected_accounts": local_grants.len(),
            }))?
        );
        return Ok(());
    }

    if configured {
        println!("✓ API credentials configured ({} region)", app.config.region.as_str());
    } else {
        println!("✗ API credentials not configured");
        println!("  Run `nylas auth config` to store your Nylas credentials");
    }

    match &default_grant {
        Some(id) => println!("✓ Default grant: {}", id),
        None => println!("✗ No default grant (run `nylas auth login`)"),
    }
    println!("  Connected accounts: {}", local_grants.len());
    Ok(())
}

async fn auth_whoami(app: &App) -> Result<()> {
    let svc = build_service(app).await?;
    let grant = svc.current_grant().await?;

    if app.json {
        println!("{}", serde_json::to_string_pretty(&grant)?);
    } else {
        print_grant_details(&grant);
    }
    Ok(())
}

async fn auth_list(app: &App) -> Result<()> {
    let svc = build_service(app).await?;
    let grants = svc.list_grants().await?;
    let default_grant = app.grants.get_default_grant().await.ok();

    if app.json {
        println!("{}", serde_json::to_string_pretty(&grants)?);
        return Ok(());
    }

    if grants.is_empty() {
        println!("No grants found. Run `nylas auth login` to connect an account.");
        return Ok(());
    }

    for grant in &grants {
        let marker = if default_grant.as_deref() == Some(grant.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}  {}  {}  {}",
            marker, grant.id, grant.email, grant.provider, grant.grant_status
        );
    }
    println!("\n* = default grant");
    Ok(())
}

async fn auth_switch(app: &App, grant: &str) -> Result<()> {
    let svc = build_service(app).await?;
    let grant = svc.switch(grant).await?;

    print_ok(
        app,
        &format!("Default grant is now {} ({})", grant.email, grant.id),
        json!({"success": true, "grant": grant}),
    );
    Ok(())
}

async fn auth_token(app: &App) -> Result<()> {
    let api_key = app.resolver.api_key().await?.ok_or(Error::NotConfigured)?;

    if app.json {
        println!("{}", json!({"api_key": api_key}));
    } else {
        // Raw value on stdout so it composes: curl -H "Authorization: Bearer $(nylas auth token)"
        println!("{}", api_key);
    }
    Ok(())
}

// ============================================================================
// Output helpers
// ============================================================================

fn print_ok(app: &App, message: &str, payload: serde_json::Value) {
    if app.json {
        println!("{}", payload);
    } else {
        println!("✓ {}", message);
    }
}

fn print_grant_details(grant: &Grant) {
    println!("Email:     {}", grant.email);
    println!("Provider:  {}", grant.provider);
    println!("Grant ID:  {}", grant.id);
    println!("Status:    {}", grant.grant_status);
    if !grant.scope.is_empty() {
        println!("Scopes:    {}", grant.scope.join(", "));
    }
    if let Some(created) = grant.created_at {
        println!("Created:   {}", created.format("%Y-%m-%d %H:%M UTC"));
    }
}

fn mask(secret: &str) -> String {
    if secret.len() <= 8 {
        "••••••••".to_string()
    } else {
        format!("{}…{}", &secret[..4], &secret[secret.len() - 4..])
    }
}

fn display_secret(secret: Option<&str>) -> String {
    match secret {
        Some(value) => mask(value),
        None => "(not set)".to_string(),
    }
}
