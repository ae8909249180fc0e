//! Lineage CLI
//!
//! Command-line front end of the lineage explorer:
//! - `render`: load, filter, lay out and render the lineage graph
//! - `datasets`: list the catalog with its last load status
//! - `impact`: show the impact wave of the current failures
//! - `watch`: follow realtime events and keep a rendered file up to date

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::{ColoredString, Colorize};
use lineage_client::{
    source_from_config, ClientConfig, FixtureSource, FragmentSource, LineageSession, RealtimeClient,
    SourceKind,
};
use lineage_cli::render::{render, RenderFormat};
use lineage_graph::{
    EventEffect, GraphFilter, LayerFilter, LayoutMode, Status, StatusFilter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lineage")]
#[command(author, version, about = "Lineage explorer: assemble, lay out and render dataset lineage")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend API base, overrides LINEAGE_API_BASE
    #[arg(long, global = true)]
    api_base: Option<String>,

    /// Fragment source: http or catalog, overrides LINEAGE_SOURCE
    #[arg(long, global = true)]
    source: Option<String>,

    /// Serve everything from a JSON fixture instead of the backend
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Lineage depth per dataset, overrides LINEAGE_DEPTH
    #[arg(long, global = true)]
    depth: Option<u32>,
}

#[derive(Args, Clone)]
struct ViewArgs {
    /// Only load the fragment of this dataset
    #[arg(long)]
    dataset: Option<String>,

    /// Layout engine: grid (simple), layered (dagre-like) or force (cose-like)
    #[arg(long, default_value = "grid")]
    mode: String,

    /// Case-insensitive text filter over label, domain, owner, table and columns
    #[arg(short, long, default_value = "")]
    query: String,

    /// Layer filter: all|source|staging|dw|mart
    #[arg(long, default_value = "all")]
    layer: String,

    /// Status filter: all|OK|RUNNING|LATE|FAILED|UNKNOWN
    #[arg(long, default_value = "all")]
    status: String,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format: dot|svg|json|html
    #[arg(short, long, default_value = "svg")]
    format: String,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the lineage graph
    Render {
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        output: OutputArgs,

        /// Select a node and fade everything outside its neighbourhood
        #[arg(long, conflicts_with_all = ["upstream", "downstream"])]
        select: Option<String>,

        /// Highlight every transitive predecessor of a node
        #[arg(long, conflicts_with = "downstream")]
        upstream: Option<String>,

        /// Highlight every transitive successor of a node
        #[arg(long)]
        downstream: Option<String>,

        /// Render as if the pointer hovered this node
        #[arg(long)]
        hover: Option<String>,
    },

    /// List the dataset catalog
    Datasets,

    /// Show how a failure ripples through the graph
    Impact {
        #[command(flatten)]
        view: ViewArgs,
    },

    /// Follow realtime events and re-render on every change
    Watch {
        #[command(flatten)]
        view: ViewArgs,
        #[command(flatten)]
        output: OutputArgs,

        /// STOMP broker address, overrides LINEAGE_EVENTS_ADDR
        #[arg(long)]
        events_addr: Option<String>,

        /// Record events without reloading or patching
        #[arg(long)]
        no_auto_refresh: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let config = load_config(&cli.global)?;
    let source = open_source(&cli.global, &config).await?;

    match cli.command {
        Commands::Render {
            view,
            output,
            select,
            upstream,
            downstream,
            hover,
        } => {
            let mut session = open_session(&source, &view, config.depth).await?;
            let v = session.view_mut();
            if let Some(id) = select.as_deref() {
                v.select(id)?;
            } else if let Some(id) = upstream.as_deref() {
                v.highlight_upstream(id)?;
            } else if let Some(id) = downstream.as_deref() {
                v.highlight_downstream(id)?;
            }
            v.hover(hover.as_deref());
            write_output(&mut session, &output)
        }
        Commands::Datasets => cmd_datasets(source.as_ref()).await,
        Commands::Impact { view } => {
            let mut session = open_session(&source, &view, config.depth).await?;
            cmd_impact(&mut session)
        }
        Commands::Watch {
            view,
            output,
            events_addr,
            no_auto_refresh,
        } => {
            let addr = events_addr.unwrap_or_else(|| config.events_addr.clone());
            cmd_watch(source, &view, &output, config.depth, addr, !no_auto_refresh).await
        }
    }
}

fn load_config(global: &GlobalArgs) -> Result<ClientConfig> {
    let mut config = ClientConfig::from_env()?;
    if let Some(base) = global.api_base.as_deref() {
        config = config.with_api_base(base)?;
    }
    if let Some(kind) = global.source.as_deref() {
        config.source = kind.parse::<SourceKind>()?;
    }
    if let Some(depth) = global.depth {
        config.depth = depth;
    }
    Ok(config)
}

async fn open_source(global: &GlobalArgs, config: &ClientConfig) -> Result<Arc<dyn FragmentSource>> {
    match &global.fixture {
        Some(path) => {
            let fixture = FixtureSource::load(path)
                .await
                .with_context(|| format!("loading fixture {}", path.display()))?;
            Ok(Arc::new(fixture))
        }
        None => Ok(source_from_config(config)?),
    }
}

fn parse_filter(args: &ViewArgs) -> Result<GraphFilter> {
    Ok(GraphFilter {
        query: args.query.clone(),
        layer: args.layer.parse::<LayerFilter>()?,
        status: args.status.parse::<StatusFilter>()?,
    })
}

/// Build a session for `args` and run the first reload.
async fn open_session(
    source: &Arc<dyn FragmentSource>,
    args: &ViewArgs,
    depth: u32,
) -> Result<LineageSession> {
    let mode: LayoutMode = args.mode.parse()?;
    let mut session =
        LineageSession::new(Arc::clone(source), mode, depth).focus(args.dataset.clone());
    session.view_mut().set_filter(parse_filter(args)?);
    session.reload().await;
    if let Some(err) = session.view().error() {
        return Err(anyhow!("{err}"));
    }
    Ok(session)
}

fn write_output(session: &mut LineageSession, output: &OutputArgs) -> Result<()> {
    let format = RenderFormat::parse(&output.format)?;
    let wave = match format {
        RenderFormat::Html => session.view_mut().take_impact_wave(),
        _ => None,
    };
    let rendered = render(session.view(), format, wave.as_ref())?;
    match &output.out {
        Some(path) => {
            std::fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn paint_status(status: Status) -> ColoredString {
    let s = status.as_str();
    match status {
        Status::Ok => s.green(),
        Status::Running => s.blue(),
        Status::Late => s.yellow(),
        Status::Failed => s.red().bold(),
        Status::Unknown => s.dimmed(),
    }
}

async fn cmd_datasets(source: &dyn FragmentSource) -> Result<()> {
    let datasets = source.datasets().await?;
    println!("{} {} datasets", "Catalog".green().bold(), datasets.len());
    for d in &datasets {
        let status = d.last_load.as_ref().map(|l| l.status).unwrap_or_default();
        let ended = d
            .last_load
            .as_ref()
            .and_then(|l| l.ended_at.as_deref())
            .unwrap_or("-");
        let owner = d.owner.as_ref().map(|o| o.name.as_str()).unwrap_or("-");
        println!(
            "  {:<24} {:<32} {:<9} {:<26} {}",
            d.id.bold(),
            d.name,
            paint_status(status),
            ended,
            owner.dimmed()
        );
    }
    Ok(())
}

fn cmd_impact(session: &mut LineageSession) -> Result<()> {
    let view = session.view_mut();
    if !view.mode().is_advanced() {
        view.set_mode(LayoutMode::Layered);
    }
    let Some(plan) = view.take_impact_wave() else {
        println!("{} nothing is FAILED or LATE", "ok".green().bold());
        return Ok(());
    };
    println!("{} {}", "Impact from".red().bold(), plan.origin.bold());
    for step in &plan.steps {
        println!(
            "  {:>5}ms  depth {}  {}",
            step.delay.as_millis(),
            step.depth,
            step.nodes.join(", ")
        );
    }
    println!(
        "  cleared after {}ms, {} nodes reached",
        plan.clear_after.as_millis(),
        plan.steps.iter().map(|s| s.nodes.len()).sum::<usize>()
    );
    Ok(())
}

async fn cmd_watch(
    source: Arc<dyn FragmentSource>,
    args: &ViewArgs,
    output: &OutputArgs,
    depth: u32,
    addr: String,
    auto_refresh: bool,
) -> Result<()> {
    let mut session = open_session(&source, args, depth).await?;
    session.store_mut().set_auto_refresh(auto_refresh);
    write_output(&mut session, output)?;

    let (mut events, _client) = RealtimeClient::new(addr).spawn(64);
    let mut reloads = JoinSet::new();

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                match session.handle_event(&event) {
                    Ok(EventEffect::Patched { dataset_id, .. }) => {
                        tracing::info!(%dataset_id, "dataset updated");
                        write_output(&mut session, output)?;
                    }
                    Ok(EventEffect::ReloadRequested(kind)) => {
                        tracing::info!(%kind, "reloading lineage");
                        reloads.spawn(session.begin_reload().fetch());
                    }
                    Ok(EventEffect::Ignored) => {}
                    Err(e) => tracing::warn!(error = %e, kind = %event.kind, "event rejected"),
                }
            }
            Some(done) = reloads.join_next() => {
                let fetched = done?;
                if session.complete_reload(fetched) {
                    if let Some(err) = session.view().error() {
                        tracing::warn!(%err, "keeping previous graph");
                    }
                    write_output(&mut session, output)?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            else => break,
        }
    }
    Ok(())
}
