use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;

use fm_list::app::App;
use fm_list::config::{AppConfig, GeneralConfig, TreeConfig, WatcherConfig};
use fm_list::error::{self, AppError};
use fm_list::event::EventHandler;

/// List a directory through the hierarchical file-list model.
#[derive(Parser, Debug)]
#[command(name = "fm-list", version, about)]
struct Cli {
    /// Directory to list (defaults to current directory)
    path: Option<PathBuf>,

    /// Explicit config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sort attribute: name, size, size_on_disk, type, modified, accessed, keywords
    #[arg(long)]
    sort: Option<String>,

    /// Reverse the sort order
    #[arg(long)]
    descending: bool,

    /// Mix directories with files
    #[arg(long)]
    no_dirs_first: bool,

    /// Include hidden files
    #[arg(long)]
    show_hidden: bool,

    /// Expand a subdirectory, relative to the listed directory (repeatable)
    #[arg(long, value_name = "REL")]
    expand: Vec<PathBuf>,

    /// Keep running and apply filesystem changes until Ctrl-C
    #[arg(long)]
    watch: bool,

    /// Print model notifications as JSON lines instead of the tree
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Flags that were given, as a partial config.
    fn overrides(&self) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                default_path: None,
                show_hidden: self.show_hidden.then_some(true),
            },
            tree: TreeConfig {
                sort_by: self.sort.clone(),
                descending: self.descending.then_some(true),
                dirs_first: self.no_dirs_first.then_some(false),
                collapse_delay_ms: None,
            },
            watcher: WatcherConfig {
                enabled: self.watch.then_some(true),
                ..Default::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> error::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), Some(&cli.overrides()));

    let requested = cli
        .path
        .clone()
        .or_else(|| config.general.default_path.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let path = requested.canonicalize().map_err(|_| {
        AppError::InvalidPath(format!("{} does not exist", requested.display()))
    })?;
    if !path.is_dir() {
        return Err(AppError::InvalidPath(format!(
            "{} is not a directory",
            path.display()
        )));
    }

    let live = cli.watch && config.watcher_enabled();
    let mut events = EventHandler::new(Duration::from_millis(100));
    let mut app = App::new(&path, &config, live, events.sender())?;
    for relative in &cli.expand {
        app.request_expand(relative);
    }
    log::info!("listing {} (live: {})", path.display(), live);

    let mut stdout = std::io::stdout();
    loop {
        let event = events.next().await?;
        app.handle_event(event, Instant::now());

        let notifications = app.take_notifications();
        if cli.json {
            for notification in &notifications {
                writeln!(stdout, "{}", serde_json::to_string(notification)?)?;
            }
            stdout.flush()?;
        }

        if app.should_quit || (!live && app.is_settled()) {
            break;
        }
    }

    if !cli.json {
        write!(stdout, "{}", app.render_tree())?;
    }
    Ok(())
}
