// Native command-line driver for the Claroz client core

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use claroz::{
    credential_store::SqliteCredentialStore, App, CliArgs, ClientError, Config, FeedSnapshot,
    FederatedIdentity, Post,
};

/// Claroz - federated social feed client
///
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Parser, Debug)]
#[command(name = "claroz")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Federated social feed client", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session credential
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLAROZ_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and log in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "CLAROZ_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "")]
        full_name: String,
    },
    /// Forget the stored credential
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Print the merged local + federated feed
    Feed {
        /// Extra pages to load after the first
        #[arg(long, default_value_t = 0)]
        more: u32,
        /// Keep polling and print new posts as they appear
        #[arg(long)]
        watch: bool,
    },
    /// Publish a post
    Post { content: String },
    /// Toggle like on a post
    Like { post_id: String },
    /// Comment on a post
    Comment { post_id: String, text: String },
    /// Resolve a federated handle and merge its posts into the feed
    Follow { handle: String },
    /// Re-sync a federated profile by DID
    Sync { did: String },
    /// Delete one of your posts
    Delete { post_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let cfg = Config::from_args(cli.settings.clone()).context("Failed to load configuration")?;
    cfg.log_summary();

    let store = SqliteCredentialStore::open(&cfg.credential_db_path)
        .with_context(|| format!("Failed to open {}", cfg.credential_db_path))?;
    let app = App::connect(&cfg, Arc::new(store));

    match run(&app, &cfg, cli.command).await {
        Err(e) if e.downcast_ref::<ClientError>().is_some_and(ClientError::is_auth_expired) => {
            eprintln!("Session expired, please log in again (`claroz login`).");
            std::process::exit(2);
        }
        other => other,
    }
}

async fn run(app: &App, cfg: &Config, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let res = app.auth.login(&email, &password).await?;
            let name = res.user.map(|u| u.username).unwrap_or(email);
            println!("Logged in as {name}");
        }
        Command::Register {
            username,
            email,
            password,
            full_name,
        } => {
            app.auth
                .register(&username, &email, &password, &full_name)
                .await?;
            println!("Registered and logged in as {username}");
        }
        Command::Logout => {
            app.auth.logout();
            println!("Logged out");
        }
        Command::Whoami => {
            let me = app.users.me().await?;
            println!("{} <{}> ({} followers)", me.username, me.email, me.followers.len());
        }
        Command::Feed { more, watch } => {
            let mut snapshot = app.feed.load_initial().await?;
            for _ in 0..more {
                if app.feed.is_exhausted() {
                    break;
                }
                snapshot = app.feed.load_more().await?;
            }
            print_snapshot(&snapshot);
            if watch {
                watch_feed(app, cfg, &snapshot).await?;
            }
        }
        Command::Post { content } => {
            let post = app.mutations.create_post(&content).await?;
            println!("Published {}", post.id);
        }
        Command::Like { post_id } => {
            let post = app.find_post(&post_id).await?;
            let updated = app.mutations.toggle_like(&post).await?;
            let verb = if updated.is_liked { "Liked" } else { "Unliked" };
            println!("{verb} {} (♥ {})", updated.id, updated.likes_count);
        }
        Command::Comment { post_id, text } => {
            let post = app.find_post(&post_id).await?;
            let updated = app.mutations.submit_comment(&post, &text).await?;
            println!("{} now has {} comments", updated.id, updated.comments.len());
        }
        Command::Follow { handle } => {
            app.feed.load_initial().await?;
            let (identity, snapshot) = app.resolver.follow_handle(&handle).await?;
            println!("Resolved {} -> {}", identity.handle, identity.did);
            print_snapshot(&snapshot);
        }
        Command::Sync { did } => {
            let identity = FederatedIdentity {
                handle: did.clone(),
                did,
                display_name: None,
                avatar: None,
            };
            let (refreshed, snapshot) = app.resolver.sync_identity(&identity).await?;
            println!("Synced {} ({} posts in feed)", refreshed.handle, snapshot.len());
        }
        Command::Delete { post_id } => {
            app.mutations.delete_post(&post_id).await?;
            println!("Deleted {post_id}");
        }
    }
    Ok(())
}

async fn watch_feed(app: &App, cfg: &Config, initial: &FeedSnapshot) -> Result<()> {
    let mut seen: HashSet<String> = initial.ids().into_iter().map(String::from).collect();
    log::info!("🚀 watching feed every {}ms", cfg.poll_interval_ms);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            _ = sleep(Duration::from_millis(cfg.poll_interval_ms)) => {}
        }

        match app.feed.refresh().await {
            Ok(snapshot) => {
                // Oldest first so the terminal reads top to bottom.
                for post in snapshot.posts().iter().rev() {
                    if seen.insert(post.id.clone()) {
                        print_post(post);
                    }
                }
            }
            Err(e) if e.is_auth_expired() => return Err(e.into()),
            Err(e) => log::error!("❌ feed refresh failed: {e}"),
        }
    }
}

fn print_snapshot(snapshot: &FeedSnapshot) {
    if snapshot.is_empty() {
        println!("No posts yet. Follow some users to see their posts here!");
        return;
    }
    for post in snapshot.posts() {
        print_post(post);
    }
}

fn print_post(post: &Post) {
    let origin = if post.is_federated() { " [federated]" } else { "" };
    let heart = if post.is_liked { "♥" } else { "♡" };
    println!(
        "{}  {}{}  {} {}  💬 {}  [{}]",
        post.created_at.format("%Y-%m-%d %H:%M"),
        post.user.display_name(),
        origin,
        heart,
        post.likes_count,
        post.comments.len(),
        post.id
    );
    println!("    {}", post.content);
}
