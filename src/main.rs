mod api;
mod app;
mod cache;
mod commands;
mod config;
mod context;
mod event;
mod listing;
mod logging;
mod query;
mod session;
mod stores;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;

use context::AppContext;
use session::{Session, SqliteSessionStore};

#[derive(Parser, Debug)]
#[command(name = "exdesk")]
#[command(about = "A terminal console for 1031 exchange management, inspired by k9s")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/exdesk/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// View to open at startup (exchanges, tasks, contacts, ...)
  #[arg(short, long)]
  view: Option<String>,

  /// Keep the session in memory instead of the on-disk store
  #[arg(long, global = true)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Sign in and store the session (password from EXDESK_PASSWORD)
  Login {
    #[arg(short, long)]
    email: String,
  },
  /// Clear the stored session
  Logout,
  /// Print a list as tab-separated rows
  Ls {
    #[arg(value_enum)]
    entity: listing::Entity,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init(&logging::log_dir()?)?;

  let config = config::Config::load(args.config.as_deref())?;

  let session = if args.ephemeral {
    Session::in_memory()
  } else {
    Session::new(Arc::new(SqliteSessionStore::open()?))
  };

  match args.command {
    Some(Cmd::Login { email }) => {
      let password = config::Config::get_password()?;
      let ctx = AppContext::headless(config, session)?;
      let login = ctx
        .api
        .backend()
        .login(&email, &password)
        .await
        .map_err(|e| eyre!("Login failed: {}", e))?;
      let name = login.user.map(|u| u.display_name()).unwrap_or(email);
      println!("Signed in as {}", name);
    }
    Some(Cmd::Logout) => {
      let ctx = AppContext::headless(config, session)?;
      ctx.api.backend().logout()?;
      println!("Signed out");
    }
    Some(Cmd::Ls { entity }) => {
      let ctx = AppContext::headless(config, session)?;
      let rows = listing::rows(&ctx.smart, entity)
        .await
        .map_err(|e| eyre!("Listing failed: {}", e))?;
      for row in rows {
        println!("{}", row);
      }
    }
    None => {
      // Override the startup view if specified on command line
      let config = if let Some(view) = args.view {
        config::Config {
          default_view: Some(view),
          ..config
        }
      } else {
        config
      };

      let ctx = AppContext::new(config, session)?;
      let mut app = app::App::new(ctx);
      app.run().await?;
    }
  }

  Ok(())
}
