//! `landreg-portal`: command-line front end for the portal session layer.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use landreg_auth::{Destination, RouteTable};
use landreg_session::{
    ClientConfig, CredentialStore, FileKeyValueStore, HttpIdentityService, HttpTransport,
    RequestDispatcher, RouteGuard, SessionClient,
};

#[derive(Parser)]
#[command(author, version, about = "Land registry portal session client", long_about = None)]
struct Args {
    /// API base URL (overrides LANDREG_API_URL)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        /// Email or username
        identifier: String,
        #[arg(long, env = "LANDREG_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// GET an API path with the stored session
    Get {
        /// Path relative to the API base URL, e.g. /land-parcels
        path: String,
    },
    /// Show where the portal would send the stored session for a path
    Route {
        path: String,
    },
}

fn config(args: &Args) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env().context("invalid LANDREG_* configuration")?;
    if let Some(url) = &args.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    landreg_observability::init();
    let args = Args::parse();
    let config = config(&args)?;

    let store_path = config
        .store_path
        .clone()
        .context("no credential store path configured")?;
    let store = Arc::new(CredentialStore::new(FileKeyValueStore::new(store_path)));
    let identity = Arc::new(
        HttpIdentityService::new(config.clone()).context("failed to build identity client")?,
    );
    let client =
        SessionClient::restore(identity, store).with_timeout(config.request_timeout);

    match args.command {
        Commands::Login { identifier, secret } => {
            let session = client
                .login(&identifier, &secret)
                .await
                .with_context(|| format!("login as {identifier} failed"))?;
            println!(
                "signed in as {} ({})",
                session.user.display_name(),
                session.role().label()
            );
        }
        Commands::Logout => {
            client.logout().context("failed to clear stored session")?;
            println!("signed out");
        }
        Commands::Whoami => match client.current_user() {
            Some(user) => println!("{} <{}> {}", user.display_name(), user.email, user.role),
            None => println!("not signed in"),
        },
        Commands::Get { path } => {
            let transport =
                Arc::new(HttpTransport::new(config.clone()).context("failed to build api client")?);
            let dispatcher = RequestDispatcher::new(client.clone(), transport);
            match dispatcher.get(path.as_str()).await {
                Ok(response) => println!("{}", response.text()),
                Err(err) if err.requires_sign_in() => {
                    bail!("{err}: run `landreg-portal login` again")
                }
                Err(err) => return Err(err).with_context(|| format!("GET {path} failed")),
            }
        }
        Commands::Route { path } => {
            let routes = RouteTable::new(config.login_path.as_str(), config.unauthorized_path.as_str())
                .with_routes(RouteTable::portal().routes().iter().cloned());
            let guard = RouteGuard::new(client.state().clone(), Arc::new(routes));
            match guard.route_to(&path) {
                Destination::Render(p) => println!("render {p}"),
                Destination::Redirect(p) => println!("redirect {p}"),
                Destination::NotFound(p) => println!("not found {p}"),
            }
        }
    }

    Ok(())
}
