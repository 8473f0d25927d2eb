//! CLI output formatting for the viewer shell.
//!
//! Each screen has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.
//!
//! # Spread display
//!
//! ```text
//! Vinayapiṭaka I : 150 pages
//! [ 2 | 3 ] of 150
//!     Left:  /tipitaka/ch/1/2.png (cached)
//!     Right: /tipitaka/ch/1/3.png
//! ```
//!
//! A missing side renders as `-`, which is the normal look of the first
//! spread (page 1 stands alone on the right) and of a trailing even page.
//!
//! # Volume list
//!
//! ```text
//! Volume 1 — Vinayapiṭaka I (150 pages)
//! Volume 2 — Vinayapiṭaka II (200 pages)
//! Volume 4
//! ```

use crate::catalog::{Catalog, VolumeEntry};
use crate::controller::Notice;
use crate::spread::{Page, Spread};

fn side(label: &str, page: Option<&Page>) -> Option<String> {
    page.map(|p| {
        let cached = if p.cached { " (cached)" } else { "" };
        format!("    {label} {}{cached}", p.path)
    })
}

/// The visible pair, its page numbers, and the volume heading.
pub fn format_spread(heading: &str, spread: &Spread, total: usize) -> Vec<String> {
    let number = |p: &Option<Page>| {
        p.as_ref()
            .map_or("-".to_string(), |page| page.number.to_string())
    };
    let mut lines = vec![
        heading.to_string(),
        format!("[ {} | {} ] of {total}", number(&spread.left), number(&spread.right)),
    ];
    lines.extend(side("Left: ", spread.left.as_ref()));
    lines.extend(side("Right:", spread.right.as_ref()));
    lines
}

/// Heading for a loaded volume: description and page count when known,
/// plain volume number otherwise.
pub fn volume_heading(volume: u32, entry: Option<&VolumeEntry>) -> String {
    let Some(entry) = entry else {
        return format!("Volume {volume}");
    };
    let mut parts = Vec::new();
    if let Some(desc) = entry.desc.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        parts.push(desc.to_string());
    } else if let Some(title) = entry.title.as_deref() {
        parts.push(title.to_string());
    }
    if entry.pages > 0 {
        parts.push(format!("{} pages", entry.pages));
    }
    if parts.is_empty() {
        format!("Volume {volume}")
    } else {
        parts.join(" : ")
    }
}

/// Selector-style listing of an edition's volumes.
pub fn format_volume_list(volumes: &[(u32, Option<&VolumeEntry>)]) -> Vec<String> {
    volumes
        .iter()
        .map(|(volume, entry)| {
            let mut line = format!("Volume {volume}");
            if let Some(entry) = entry {
                if let Some(title) = entry.title.as_deref() {
                    line.push_str(&format!(" — {title}"));
                }
                if entry.pages > 0 {
                    line.push_str(&format!(" ({} pages)", entry.pages));
                }
            }
            line
        })
        .collect()
}

/// The instructional screen shown when no recognized edition was supplied.
pub fn format_edition_required() -> Vec<String> {
    [
        "Edition parameter required",
        "",
        "The viewer needs to know which edition to open. Add it to the URL:",
        "",
        "  Parameters:",
        "    edition / e   edition identifier (required): ch, mc",
        "    volume  / v   volume number",
        "    page    / p   page number (1-based)",
        "",
        "  Full form:",
        "    ?edition=ch&volume=1&page=5",
        "",
        "  Short form:",
        "    ?e=ch&v=1&p=5",
        "",
        "Either form also works as a hash fragment (#edition=ch&volume=1).",
    ]
    .map(String::from)
    .to_vec()
}

/// Keyboard and command help.
pub fn format_help() -> Vec<String> {
    [
        "Navigation:",
        "  right / space   next spread",
        "  left            previous spread",
        "  home            first page",
        "  end             last page",
        "  g <page>        go to page",
        "  v <volume>      open another volume",
        "  volumes         list volumes of this edition",
        "  q               quit",
        "",
        "Display convention: even pages sit on the left, odd pages on the",
        "right, as in the bound volumes.",
    ]
    .map(String::from)
    .to_vec()
}

/// One-line rendering of a user-facing notice.
pub fn format_notice(notice: &Notice) -> String {
    match notice {
        Notice::EditionRequired => "Edition parameter is required".to_string(),
        Notice::UnknownVolume { raw, edition } => format!(
            "Volume {raw} not found in {} edition — please select an available volume",
            edition.label()
        ),
        Notice::EmptyVolume { volume } => {
            format!("No images found in volume {volume}")
        }
    }
}

/// Per-edition summary of a catalog document.
pub fn format_catalog_summary(catalog: &Catalog) -> Vec<String> {
    let mut lines = Vec::new();
    for (id, edition) in &catalog.editions {
        let total: u64 = edition.volumes.values().map(|v| u64::from(v.pages)).sum();
        lines.push(format!(
            "{} — {}: {} volumes, {} pages",
            id.to_uppercase(),
            edition.title,
            edition.volumes.len(),
            total
        ));
    }
    if lines.is_empty() {
        lines.push("Catalog is empty".to_string());
    }
    lines
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        println!("! {}", format_notice(notice));
    }
}
