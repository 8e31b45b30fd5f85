use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use std::path::PathBuf;
use std::rc::Rc;
use tvp::app::{TreeViewCommand, TreeViewController, TreeViewsManager};
use tvp::config::TreeViewsConfig;
use tvp::host::{Host, MemoryHost};
use tvp::protocol::{TreeViewDidChangeParams, TreeViewNode};
use tvp::services::provider::StaticTreeProvider;
use tvp::services::time_source::RealTimeSource;
use tvp::services::tracing_setup;

/// Render tree view panels from a JSON fixture
#[derive(Parser, Debug)]
#[command(name = "tvp-dump")]
#[command(about = "Open tree view panels on a headless host and print their rows", long_about = None)]
#[command(version)]
struct Args {
    /// Fixture: { "trees": { view: { parent id ("" for root): [nodes] } }, "reveal": {..} }
    #[arg(long, value_name = "PATH")]
    tree: PathBuf,

    /// Path to the tree views configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file for diagnostics
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Open only this tree instead of the configured layout
    #[arg(long, value_name = "NAME")]
    view: Option<String>,

    /// Comma separated id chain (outermost first) to reveal in --view
    #[arg(long, value_name = "IDS", value_delimiter = ',', requires = "view")]
    reveal: Vec<String>,

    /// Also print the notifications sent back to the data source
    #[arg(long)]
    notifications: bool,

    /// Height of the simulated editor
    #[arg(long, default_value_t = 40)]
    height: usize,

    /// Width of the simulated editor
    #[arg(long, default_value_t = 120)]
    width: u16,
}

fn load_config(path: Option<&PathBuf>) -> AnyhowResult<TreeViewsConfig> {
    let config = match path {
        Some(path) => TreeViewsConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TreeViewsConfig::default(),
    };
    config.validate().context("Invalid tree views configuration")?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    if let Some(log_file) = &args.log_file {
        tracing_setup::init_global(log_file)
            .with_context(|| format!("Failed to open log file {}", log_file.display()))?;
    }

    let config = load_config(args.config.as_ref())?;
    let provider = Rc::new(
        StaticTreeProvider::from_file(&args.tree)
            .with_context(|| format!("Failed to read tree fixture {}", args.tree.display()))?,
    );
    let host = Rc::new(MemoryHost::new(args.width, args.height));
    let manager = Rc::new(TreeViewsManager::new(
        host.clone(),
        Rc::new(config),
        RealTimeSource::shared(),
    ));
    let controller = TreeViewController::new(manager.clone(), provider.clone(), host.clone());

    // Announce every fixture tree the way a server would
    let roots = provider.view_ids().into_iter().map(TreeViewNode::root).collect();
    controller
        .handle_did_change(TreeViewDidChangeParams { nodes: roots })
        .await?;

    match &args.view {
        Some(view) => controller.execute(TreeViewCommand::Toggle(view.clone())).await?,
        None => controller.execute(TreeViewCommand::ToggleAll).await?,
    }

    if let (Some(view), false) = (&args.view, args.reveal.is_empty()) {
        let model = manager
            .model(view)
            .with_context(|| format!("Tree {} is not registered", view))?;
        let node = model.reveal_by_parents(&args.reveal).await?;
        if let Some(tree_view) = manager.view(view) {
            tree_view.pump().await?;
            if let Some(node) = node {
                let offset = model.find_node_offset(&node.make_view()).await?;
                for window in host.windows_showing(tree_view.surface()).await? {
                    host.set_cursor(window, offset.unwrap_or(1).saturating_sub(1)).await?;
                }
            } else {
                eprintln!("Could not reveal {}", args.reveal.join(","));
            }
        }
    }

    for (name, window) in manager.open_panels().await? {
        let surface = host.window_surface(window).await?;
        let cursor = host.cursor(window).await?;
        println!("== {} ({} rows) ==", name, host.height(window).await?);
        for (idx, line) in host.lines(surface).await?.iter().enumerate() {
            let marker = if idx == cursor { ">" } else { " " };
            println!("{} {}", marker, line);
        }
    }

    if args.notifications {
        for notification in provider.notifications() {
            println!("{} {}", notification.method(), notification.params()?);
        }
    }

    controller.dispose().await?;
    Ok(())
}
