use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use realm_auth::{
    Access, AuthorizationRequest, ConfirmOutcome, DatabaseConfig, ExchangeOutcome, LogNotifier,
    LoginOutcome, Notifier, RecordingNotifier, TokenExchange, WebhookNotifier, create_connection,
    create_exchange, ensure_schema, load_options,
};

#[derive(Parser)]
#[command(name = "realm-auth")]
#[command(about = "Account and bearer authorization management")]
struct Cli {
    /// Document store URL, e.g. memory or ws://localhost:8000
    #[arg(long, global = true, default_value = "memory", env = "REALM_AUTH_DB_URL")]
    db_url: String,
    /// Post challenges and temporary tokens to this URL instead of logging them
    #[arg(long, global = true, env = "REALM_AUTH_WEBHOOK_URL")]
    webhook_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,
    /// Request a login; sends a challenge or a temporary token
    Login {
        #[arg(long)]
        realm: String,
        #[arg(long)]
        user: String,
    },
    /// Confirm a challenge token and send a temporary token
    Confirm { token: String },
    /// Exchange a temporary token for a bearer token
    Exchange {
        #[arg(long)]
        realm: String,
        #[arg(long)]
        user: String,
        #[arg(long)]
        token: String,
        /// Scope of a first authorization (defaults to the configured scope)
        #[arg(long)]
        scope: Option<String>,
        /// Caller address recorded on the account
        #[arg(long, default_value = "cli")]
        from: String,
    },
    /// Log an account out and revoke its authorization
    Logout {
        #[arg(long)]
        realm: String,
        #[arg(long)]
        client_id: String,
    },
    /// Block an account and revoke its authorization
    Block {
        #[arg(long)]
        realm: String,
        #[arg(long)]
        client_id: String,
    },
    /// Check whether a bearer token grants a scope
    Check {
        #[arg(long)]
        token: String,
        #[arg(long)]
        scope: String,
    },
    /// Delete an authorization
    DeleteAuthorization {
        #[arg(long)]
        realm: String,
        #[arg(long)]
        client_id: String,
    },
    /// Run login, confirmation, exchange and an access check in one process
    Demo {
        #[arg(long, default_value = "demo")]
        realm: String,
        #[arg(long, default_value = "alice")]
        user: String,
    },
}

fn notifier(webhook_url: Option<String>, endpoint: &str) -> Result<Arc<dyn Notifier>> {
    match webhook_url {
        Some(url) => {
            info!("Sending notifications to {}", url);
            Ok(Arc::new(WebhookNotifier::new(url, endpoint)?))
        }
        None => Ok(Arc::new(LogNotifier::new(endpoint))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("realm_auth=info".parse()?))
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let db_config = DatabaseConfig {
        url: cli.db_url,
        ..Default::default()
    };
    info!("Using database url: {}", db_config.url);

    let options = load_options()?;

    match cli.command {
        Commands::Init => {
            let db = create_connection(db_config).await?;
            ensure_schema(&db).await?;
            println!("Schema ready");
        }
        Commands::Demo { realm, user } => {
            run_demo(db_config, options, &realm, &user).await?;
        }
        command => {
            let notifier = notifier(cli.webhook_url, &options.endpoint)?;
            let exchange = create_exchange(db_config, options, notifier).await?;
            run(&exchange, command).await?;
        }
    }

    Ok(())
}

async fn run(exchange: &TokenExchange, command: Commands) -> Result<()> {
    match command {
        Commands::Login { realm, user } => {
            let outcome = exchange.login_request(&realm, &user).await?;
            match &outcome {
                LoginOutcome::ChallengeSent(acc) => {
                    println!("Challenge sent to {} (client id {})", user, acc.client_id)
                }
                LoginOutcome::TokenSent(_) => println!("Temporary token sent to {}", user),
                LoginOutcome::AlreadyAuthorized => println!("{} is already authorized", user),
            }
            println!("Status: {}", outcome.status().as_u16());
        }
        Commands::Confirm { token } => {
            let outcome = exchange.confirm_login(&token).await?;
            match &outcome {
                ConfirmOutcome::TokenSent { account, location } => {
                    println!(
                        "Confirmed {}/{}, redirect to {}",
                        account.realm, account.user_id, location
                    )
                }
                ConfirmOutcome::Confirmed(account) => {
                    println!("Confirmed {}/{}", account.realm, account.user_id)
                }
                ConfirmOutcome::UnknownToken => println!("Unknown token"),
                ConfirmOutcome::Expired => println!("Token expired"),
            }
            println!("Status: {}", outcome.status().as_u16());
        }
        Commands::Exchange {
            realm,
            user,
            token,
            scope,
            from,
        } => {
            let scope = scope.unwrap_or_else(|| exchange.options().scope.clone());
            let req = AuthorizationRequest::new(realm, user)
                .with_token(token)
                .with_scope(scope);
            let outcome = exchange.exchange_token(&req, &from).await?;
            if let ExchangeOutcome::Issued(auth) = &outcome {
                println!("{}", serde_json::to_string_pretty(auth)?);
            }
            println!("Status: {}", outcome.status().as_u16());
        }
        Commands::Logout { realm, client_id } => {
            let outcome = exchange.logout(&realm, &client_id).await?;
            println!("Status: {}", outcome.status().as_u16());
        }
        Commands::Block { realm, client_id } => {
            let account = exchange.block(&realm, &client_id).await?;
            println!("Blocked {}/{}", account.realm, account.user_id);
        }
        Commands::Check { token, scope } => {
            let access = exchange.check_authorization(&token, &scope).await?;
            match &access {
                Access::Granted(auth) => println!("Granted to client {}", auth.client_id),
                Access::Denied => println!("Denied"),
            }
            println!("Status: {}", access.status().as_u16());
        }
        Commands::DeleteAuthorization { realm, client_id } => {
            let auth = exchange
                .authorizations()
                .delete_authorization(&realm, &client_id)
                .await?;
            println!("Deleted authorization of {}/{}", auth.realm, auth.user_id);
        }
        Commands::Init | Commands::Demo { .. } => {
            anyhow::bail!("init and demo do not run against a shared exchange")
        }
    }
    Ok(())
}

async fn run_demo(
    db_config: DatabaseConfig,
    options: realm_auth::AuthOptions,
    realm: &str,
    user: &str,
) -> Result<()> {
    let notifier = Arc::new(RecordingNotifier::new());
    let exchange = create_exchange(db_config, options, notifier.clone()).await?;

    let outcome = exchange.login_request(realm, user).await?;
    println!("login:    {}", outcome.status().as_u16());

    let challenge = notifier
        .last_challenge(user)
        .await
        .ok_or_else(|| anyhow::anyhow!("no challenge was sent"))?;
    let outcome = exchange.confirm_login(&challenge).await?;
    println!("confirm:  {}", outcome.status().as_u16());

    let token = notifier
        .last_token(user)
        .await
        .ok_or_else(|| anyhow::anyhow!("no temporary token was sent"))?;
    let req = AuthorizationRequest::new(realm, user)
        .with_token(token)
        .with_scope(exchange.options().scope.clone());
    let outcome = exchange.exchange_token(&req, "demo").await?;
    println!("exchange: {}", outcome.status().as_u16());

    let ExchangeOutcome::Issued(auth) = outcome else {
        anyhow::bail!("exchange did not issue an authorization");
    };
    let access = exchange
        .check_bearer(&format!("Bearer {}", auth.token), "api:read")
        .await?;
    println!("check:    {}", access.status().as_u16());

    let outcome = exchange.logout(realm, auth.client_id.as_str()).await?;
    println!("logout:   {}", outcome.status().as_u16());

    println!(
        "cache:    accounts {} / authorizations {}",
        exchange.accounts().cache().stats(),
        exchange.authorizations().token_cache().stats()
    );
    Ok(())
}
