use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use tipitaka_viewer::archive::{DirArchive, HttpArchive};
use tipitaka_viewer::catalog::{Catalog, VolumeEntry};
use tipitaka_viewer::config::{self, ViewerConfig};
use tipitaka_viewer::controller::{Key, Phase, Viewer};
use tipitaka_viewer::urlstate::Location;
use tipitaka_viewer::{output, scan};

fn version_string() -> &'static str {
    if env!("ON_RELEASE_TAG") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    match env!("GIT_HASH") {
        "" => "dev@unknown",
        // Leaked exactly once, at startup.
        hash => Box::leak(format!("dev@{hash}").into_boxed_str()),
    }
}

#[derive(Parser)]
#[command(name = "tipitaka-viewer")]
#[command(about = "Page-image viewer for scanned Tipiṭaka editions")]
#[command(long_about = "\
Page-image viewer for scanned Tipiṭaka editions

The archive publishes each edition as folders of page scans plus one
metadata document:

  <archive>/
  └── tipitaka/
      ├── book-viewer.json         # catalog: titles and page counts
      ├── ch/                      # edition
      │   ├── 1/                   # volume
      │   │   ├── 1.png            # page scans, 1-based
      │   │   └── ...
      │   └── ...
      └── mc/
          └── ...

The viewer resolves page counts from the catalog (probing the archive when
the catalog is unavailable), pairs pages into spreads — even pages left,
odd pages right, as the volumes are bound — and keeps the viewer URL in
sync while you page through.

URL parameters, both accepted everywhere, hash overriding query:
  full:  ?edition=ch&volume=1&page=5
  short: ?e=ch&v=1&p=5

Run 'tipitaka-viewer gen-config' to generate a documented viewer.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Config file
    #[arg(long, default_value = "viewer.toml", global = true)]
    config: PathBuf,

    /// View a local archive directory (containing `tipitaka/`) instead of
    /// the configured base URL
    #[arg(long, global = true)]
    local_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ViewArgs {
    /// Viewer URL, e.g. "?edition=ch&volume=1&page=5" or a full address
    #[arg(long)]
    url: Option<String>,

    /// Edition identifier (alternative to --url)
    #[arg(long)]
    edition: Option<String>,

    /// Volume number
    #[arg(long)]
    volume: Option<String>,

    /// 1-based page number
    #[arg(long)]
    page: Option<u32>,

    /// Print the opening spread and exit instead of reading commands
    #[arg(long)]
    no_interact: bool,
}

#[derive(clap::Args)]
struct ScanArgs {
    /// Archive tree root (the directory containing `tipitaka/`)
    root: PathBuf,

    /// Existing catalog document to merge fresh counts into
    #[arg(long)]
    merge: Option<PathBuf>,

    /// Output file (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the viewer on a URL or explicit coordinates
    View(ViewArgs),
    /// Resolve a volume's page count (catalog first, probing fallback)
    Resolve {
        #[arg(long)]
        edition: String,
        #[arg(long)]
        volume: String,
    },
    /// Show the spread pairing for a page of a volume
    Spread {
        #[arg(long)]
        edition: String,
        #[arg(long)]
        volume: String,
        #[arg(long)]
        page: u32,
    },
    /// List the volumes of an edition
    Volumes {
        #[arg(long)]
        edition: String,
    },
    /// Load and summarize the metadata catalog
    Catalog,
    /// Count pages of a local archive tree into a catalog document
    Scan(ScanArgs),
    /// Print a stock viewer.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ViewerConfig::load_or_default(&cli.config)?;

    match cli.command {
        Command::View(args) => {
            let mut viewer = build_viewer(&config, &cli.local_root)?;
            let location = view_location(&args);
            let notices = viewer.init_from_location(location);
            output::print_notices(&notices);

            match viewer.phase() {
                Phase::EditionMissing => {
                    output::print_lines(&output::format_edition_required());
                    return Ok(());
                }
                Phase::Ready => render(&mut viewer),
                Phase::AwaitingVolume => {
                    println!("No volume selected. Available volumes:");
                    print_volumes(&viewer);
                }
                _ => {}
            }
            if !args.no_interact {
                interactive(&mut viewer)?;
            } else {
                viewer.shutdown();
            }
        }
        Command::Resolve { edition, volume } => {
            let mut viewer = build_viewer(&config, &cli.local_root)?;
            let location = Location::parse(&format!("?edition={edition}&volume={volume}"));
            let notices = viewer.init_from_location(location);
            output::print_notices(&notices);
            match viewer.phase() {
                Phase::Ready => println!("{} pages", viewer.total_pages()),
                Phase::EmptyVolume => println!("0 pages"),
                Phase::EditionMissing => {
                    output::print_lines(&output::format_edition_required())
                }
                _ => {}
            }
        }
        Command::Spread {
            edition,
            volume,
            page,
        } => {
            let mut viewer = build_viewer(&config, &cli.local_root)?;
            let location =
                Location::parse(&format!("?edition={edition}&volume={volume}&page={page}"));
            let notices = viewer.init_from_location(location);
            output::print_notices(&notices);
            match viewer.phase() {
                Phase::Ready => render(&mut viewer),
                Phase::EditionMissing => {
                    output::print_lines(&output::format_edition_required())
                }
                _ => {}
            }
        }
        Command::Volumes { edition } => {
            let mut viewer = build_viewer(&config, &cli.local_root)?;
            let notices = viewer.init_from_location(Location::parse(&format!("?edition={edition}")));
            output::print_notices(&notices);
            if viewer.phase() == Phase::EditionMissing {
                output::print_lines(&output::format_edition_required());
            } else {
                print_volumes(&viewer);
            }
        }
        Command::Catalog => {
            let mut viewer = build_viewer(&config, &cli.local_root)?;
            match viewer.load_catalog() {
                Some(catalog) => output::print_lines(&output::format_catalog_summary(catalog)),
                None => println!("Catalog unavailable (fetch failed and no fresh cached copy)"),
            }
        }
        Command::Scan(args) => {
            let scanned = scan::scan_archive(&args.root, &config.archive_root)?;
            let catalog = match &args.merge {
                Some(path) => {
                    let existing: Catalog = serde_json::from_str(&std::fs::read_to_string(path)?)?;
                    scan::merge_into(existing, scanned)
                }
                None => scanned,
            };
            output::print_lines(&output::format_catalog_summary(&catalog));
            let json = serde_json::to_string_pretty(&catalog)?;
            match &args.output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    println!("Catalog written to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Build the viewer against the local directory backend or the HTTP one.
fn build_viewer(
    config: &ViewerConfig,
    local_root: &Option<PathBuf>,
) -> Result<Viewer, Box<dyn std::error::Error>> {
    let viewer = match local_root {
        Some(root) => Viewer::new(config, Arc::new(DirArchive::from_config(root, config)?)),
        None => Viewer::new(config, Arc::new(HttpArchive::from_config(config)?)),
    };
    Ok(viewer)
}

/// The inbound location for `view`: an explicit URL, or one synthesized
/// from the coordinate flags (long form).
fn view_location(args: &ViewArgs) -> Location {
    if let Some(url) = &args.url {
        return Location::parse(url);
    }
    let mut query = String::new();
    let mut push = |key: &str, value: &str| {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(key);
        query.push('=');
        query.push_str(value);
    };
    if let Some(edition) = &args.edition {
        push("edition", edition);
    }
    if let Some(volume) = &args.volume {
        push("volume", volume);
    }
    if let Some(page) = args.page {
        push("page", &page.to_string());
    }
    Location {
        path: "/book-viewer".to_string(),
        query,
        hash: String::new(),
    }
}

fn render(viewer: &mut Viewer) {
    let Some(volume) = viewer.volume() else {
        return;
    };
    let heading = output::volume_heading(volume, viewer.volume_entry(volume));
    let total = viewer.total_pages();
    let spread = viewer.current_spread();
    output::print_lines(&output::format_spread(&heading, &spread, total));
    println!("    URL: {}", viewer.location());
}

fn print_volumes(viewer: &Viewer) {
    let ids = viewer.volume_ids();
    let rows: Vec<(u32, Option<&VolumeEntry>)> =
        ids.iter().map(|&v| (v, viewer.volume_entry(v))).collect();
    output::print_lines(&output::format_volume_list(&rows));
}

fn nav(viewer: &mut Viewer, key: Key) {
    if viewer.handle_key(key).is_some() {
        render(viewer);
    } else {
        println!("no volume loaded — v <volume> to open one");
    }
}

/// Line-based command loop: one command per line, rendered spread after
/// every successful move.
fn interactive(viewer: &mut Viewer) -> io::Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            continue;
        };
        match cmd {
            "q" | "quit" => break,
            "h" | "help" | "?" => output::print_lines(&output::format_help()),
            "n" | "next" => nav(viewer, Key::ArrowRight),
            "p" | "prev" => nav(viewer, Key::ArrowLeft),
            "f" | "first" => nav(viewer, Key::Home),
            "l" | "last" => nav(viewer, Key::End),
            "g" | "go" => match parts.next().and_then(|s| s.parse::<usize>().ok()) {
                Some(page) if page >= 1 => {
                    if viewer.go_to(page - 1).is_some() {
                        render(viewer);
                    }
                }
                _ => println!("usage: g <page>"),
            },
            "v" | "volume" => match parts.next() {
                Some(raw) => {
                    let notices = viewer.select_volume(raw);
                    output::print_notices(&notices);
                    if viewer.phase() == Phase::Ready {
                        render(viewer);
                    }
                }
                None => println!("usage: v <volume>"),
            },
            "volumes" => print_volumes(viewer),
            other => match Key::from_name(other) {
                Some(key) => nav(viewer, key),
                None => println!("unknown command {other:?} — h for help"),
            },
        }
    }
    viewer.shutdown();
    Ok(())
}
