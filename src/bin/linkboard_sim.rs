//! Linkboard simulator
//!
//! Replays board scenarios against the in-memory store and prints each
//! outcome as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Run every scenario
//! linkboard-sim
//!
//! # One scenario, custom config
//! linkboard-sim --scenario vote-race --config /path/to/linkboard.toml
//!
//! # Sign up with the configured password threshold, then post
//! linkboard-sim --scenario sign-up --config /path/to/linkboard.toml
//!
//! # Query the hosted search index configured in the config file
//! linkboard-sim --scenario search --query rust
//! ```

use anyhow::Context;
use clap::{Parser, ValueEnum};
use linkboard_client::bus::spawn_flash_logger;
use linkboard_client::store::document;
use linkboard_client::{
    Actor, BoardActions, BoardConfig, BoardContext, Category, DocumentStore, HostedSearchClient,
    MemoryAuth, MemoryStore, MutationEngine, NewLink, NotificationBus, ReadBarrierStore,
    RecordingNavigator, SearchIndex, SearchRequest, Session, SubjectUpdate,
    SubscriptionController,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    All,
    CreateAndComment,
    VoteRace,
    LateSnapshot,
    AnonymousVote,
    SignUp,
    Search,
}

#[derive(Parser, Debug)]
#[command(name = "linkboard-sim")]
#[command(about = "Replay link board scenarios against an in-memory store")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// tracing filter directive; RUST_LOG wins when set
    #[arg(long, env = "LINKBOARD_LOG")]
    log_filter: Option<String>,

    #[arg(long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// Free text for the search scenario
    #[arg(long, default_value = "rust")]
    query: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => BoardConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => BoardConfig::default(),
    };

    let directive = args.log_filter.clone().unwrap_or_else(|| config.log_filter.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)),
        )
        .init();

    info!(scenario = ?args.scenario, "Starting linkboard-sim");

    let scenarios = match args.scenario {
        Scenario::All => vec![
            Scenario::CreateAndComment,
            Scenario::VoteRace,
            Scenario::LateSnapshot,
            Scenario::AnonymousVote,
            Scenario::SignUp,
        ],
        one => vec![one],
    };

    for scenario in scenarios {
        let outcome = match scenario {
            Scenario::CreateAndComment => create_and_comment(&config).await?,
            Scenario::VoteRace => vote_race(&config).await?,
            Scenario::LateSnapshot => late_snapshot(&config).await?,
            Scenario::AnonymousVote => anonymous_vote(&config).await?,
            Scenario::SignUp => sign_up(&config).await?,
            Scenario::Search => search(&config, &args.query).await?,
            Scenario::All => continue,
        };
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }

    Ok(())
}

fn actions_over(store: Arc<dyn DocumentStore>, config: &BoardConfig) -> (BoardActions, Arc<RecordingNavigator>) {
    let navigator = Arc::new(RecordingNavigator::new());
    let engine = MutationEngine::new(store, config.collections.clone());
    let bus = NotificationBus::with_capacity(config.notification_capacity);
    spawn_flash_logger(Arc::new(bus.clone()));
    (BoardActions::new(engine, bus, navigator.clone()), navigator)
}

fn signed_in(id: &str, name: &str) -> BoardContext {
    BoardContext::signed_in(Actor::new(id, name), vec![Category::new("c1", "tools")])
}

async fn seed_link(store: Arc<dyn DocumentStore>, config: &BoardConfig) -> anyhow::Result<String> {
    let engine = MutationEngine::new(store, config.collections.clone());
    let id = engine
        .create_link(
            &Actor::new("u1", "Ada"),
            &NewLink::new("Hello", "http://x.com", "tools"),
        )
        .await?;
    Ok(id)
}

/// u1 posts a link, u2 comments on it
async fn create_and_comment(config: &BoardConfig) -> anyhow::Result<Value> {
    let store = MemoryStore::new();
    let (actions, navigator) = actions_over(Arc::new(store.clone()), config);

    let id = actions
        .submit_link(
            &signed_in("u1", "Ada"),
            &NewLink::new("Hello", "http://x.com", "tools"),
        )
        .await
        .completed()
        .context("guard redirected a signed-in actor")??;
    actions
        .comment(&signed_in("u2", "Bo"), &id, "nice!")
        .await
        .completed()
        .context("guard redirected a signed-in actor")??;

    Ok(json!({
        "scenario": "create-and-comment",
        "navigation": navigator.history().iter().map(|r| r.path()).collect::<Vec<_>>(),
        "record": store.document(&config.collections.links, &id),
    }))
}

/// Two voters read the same empty vote list; one vote survives
async fn vote_race(config: &BoardConfig) -> anyhow::Result<Value> {
    let memory = MemoryStore::new();
    let id = seed_link(Arc::new(memory.clone()), config).await?;

    let gated = Arc::new(ReadBarrierStore::new(Arc::new(memory.clone()), 2));
    let engine = MutationEngine::new(gated, config.collections.clone());
    let (bo, cy) = (Actor::new("u2", "Bo"), Actor::new("u3", "Cy"));
    let (a, b) = tokio::join!(engine.append_vote(&id, &bo), engine.append_vote(&id, &cy));

    let record = memory.document(&config.collections.links, &id);
    let vote_count = record
        .as_ref()
        .and_then(|doc| doc.get("voteCount"))
        .cloned()
        .unwrap_or(Value::Null);
    if vote_count == json!(1) {
        warn!(link_id = %id, "Lost update: one of two concurrent votes was overwritten");
    }

    Ok(json!({
        "scenario": "vote-race",
        "written": [a?, b?],
        "voteCount": vote_count,
        "record": record,
    }))
}

/// A snapshot emitted after the view closed never reaches it
async fn late_snapshot(config: &BoardConfig) -> anyhow::Result<Value> {
    let memory = MemoryStore::new();
    let store: Arc<dyn DocumentStore> = Arc::new(memory.clone());
    let id = seed_link(store.clone(), config).await?;

    let controller = SubscriptionController::new(store, config.collections.clone());
    let mut subscription = controller.watch_link(&id).await?;

    let mut delivered = Vec::new();
    if let Some(SubjectUpdate::Snapshot(link)) = subscription.next().await {
        delivered.push(link.description);
    }
    subscription.close();

    let engine = MutationEngine::new(Arc::new(memory.clone()), config.collections.clone());
    engine.append_vote(&id, &Actor::new("u2", "Bo")).await?;
    let after_close = subscription.try_next().is_some();

    Ok(json!({
        "scenario": "late-snapshot",
        "deliveredBeforeClose": delivered,
        "deliveredAfterClose": after_close,
        "state": format!("{:?}", subscription.state()),
    }))
}

/// Voting while signed out redirects and writes nothing
async fn anonymous_vote(config: &BoardConfig) -> anyhow::Result<Value> {
    let memory = MemoryStore::new();
    let id = seed_link(Arc::new(memory.clone()), config).await?;
    let (actions, navigator) = actions_over(Arc::new(memory.clone()), config);

    let outcome = actions
        .vote(&BoardContext::anonymous(Vec::new()), &id)
        .await;

    Ok(json!({
        "scenario": "anonymous-vote",
        "redirected": outcome.is_redirected(),
        "navigation": navigator.history().iter().map(|r| r.path()).collect::<Vec<_>>(),
        "record": memory.document(&config.collections.links, &id),
    }))
}

/// A weak password is refused, a strong one signs in and posts
async fn sign_up(config: &BoardConfig) -> anyhow::Result<Value> {
    let memory = MemoryStore::new();
    memory
        .add(&config.collections.categories, document(json!({"name": "tools"})))
        .await?;
    let session = Session::start(
        Arc::new(MemoryAuth::from_config(config)),
        Arc::new(memory.clone()),
        config.collections.clone(),
    )
    .await?;

    let refused = match config.min_password_len {
        0 => None,
        min_len => session
            .sign_up("Ada", "ada@example.com", &"x".repeat(min_len - 1))
            .await
            .err()
            .map(|e| e.to_string()),
    };

    let strong = "s".repeat(config.min_password_len + 4);
    let ada = session.sign_up("Ada", "ada@example.com", &strong).await?;

    let (actions, navigator) = actions_over(Arc::new(memory.clone()), config);
    let id = actions
        .submit_link(
            &session.context().await,
            &NewLink::new("Hello", "http://x.com", "tools"),
        )
        .await
        .completed()
        .context("guard redirected a signed-up actor")??;

    Ok(json!({
        "scenario": "sign-up",
        "weakPasswordRefused": refused,
        "actor": ada,
        "navigation": navigator.history().iter().map(|r| r.path()).collect::<Vec<_>>(),
        "record": memory.document(&config.collections.links, &id),
    }))
}

async fn search(config: &BoardConfig, text: &str) -> anyhow::Result<Value> {
    if config.search.app_id.is_empty() && config.search.endpoint.is_none() {
        anyhow::bail!("search scenario needs [search] app_id or endpoint in the config");
    }
    let client = HostedSearchClient::new(config.search.clone());
    let results = client
        .search(&SearchRequest::new(text, config.search.hits_per_page))
        .await?;

    Ok(json!({
        "scenario": "search",
        "totalHits": results.total_hits,
        "hits": results.hits.iter().map(|hit| json!({
            "route": hit.route().path(),
            "description": hit.description,
            "postedBy": hit.posted_by,
            "comments": hit.comment_count,
        })).collect::<Vec<_>>(),
    }))
}
