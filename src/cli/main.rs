use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use exif_studio::exif::{
    ChangeSet, ExifView, Ifd, TagRegistry, TagSelection, delete_tags, keep_only_tags, modify_exif,
    read_exif,
};
use exif_studio::watermark::Position;
use exif_studio::{config, pipeline, purify, templates, watermark};

#[derive(Parser, Debug)]
#[command(
    name = "exif-studio",
    version,
    about = "Inspect, edit, filter, strip and watermark EXIF metadata in JPEG, PNG and WebP images"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Display all EXIF metadata, grouped by IFD
    #[arg(long)]
    show: bool,

    /// Print the metadata as JSON (with --show), or the results as JSON
    #[arg(long)]
    json: bool,

    /// Set a tag (repeatable); `gps_lat` / `gps_lon` take decimal degrees
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    set: Vec<(String, String)>,

    /// Delete a tag by name (repeatable)
    #[arg(long = "delete", value_name = "NAME")]
    delete: Vec<String>,

    /// Keep only the tags of a named template (see --list-templates)
    #[arg(long, value_name = "NAME")]
    template: Option<String>,

    /// List the available templates and exit
    #[arg(long = "list-templates")]
    list_templates: bool,

    /// Remove all metadata by re-encoding the pixels
    #[arg(long)]
    strip: bool,

    /// Draw a text watermark, keeping the metadata
    #[arg(long, value_name = "TEXT")]
    watermark: Option<String>,

    /// Watermark position: center, top-left, top-right, bottom-left, bottom-right
    #[arg(long, value_name = "POS")]
    position: Option<Position>,

    /// Watermark opacity, 0.0 to 1.0
    #[arg(long, value_name = "ALPHA")]
    opacity: Option<f32>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))?;
    Ok((key.trim().to_string(), value.to_string()))
}

/// What a single run does to each image.
#[derive(Debug)]
enum Action {
    Modify(ChangeSet),
    Delete(TagSelection),
    KeepOnly(String, TagSelection),
    Strip,
    Watermark(String, Position, f32),
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Self::Modify(_) => "modify",
            Self::Delete(_) => "delete",
            Self::KeepOnly(..) => "template",
            Self::Strip => "strip",
            Self::Watermark(..) => "watermark",
        }
    }
}

/// Outcome of one image, for the summary and JSON output.
struct RunResult {
    path: PathBuf,
    output: Option<PathBuf>,
    unchanged: bool,
    error: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    // Handle --list-templates
    if cli.list_templates {
        for name in templates::list_templates() {
            let count = templates::get_template(name).map(|t| t.len()).unwrap_or(0);
            println!("{name:<16} {count} tags");
        }
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let registry = TagRegistry::standard();
    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No supported image files found in the specified paths.");
    }

    // Handle --show
    if cli.show {
        if cli.json {
            let views: Vec<serde_json::Value> = images
                .iter()
                .map(|p| {
                    let view = read_exif(p, registry);
                    serde_json::json!({
                        "path": p.display().to_string(),
                        "lat_lon": view.lat_lon(),
                        "exif": view,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
        } else {
            for image_path in &images {
                print_full_exif(image_path, &read_exif(image_path, registry));
            }
        }
        return Ok(());
    }

    let config = config::Config::load(cli.config.as_deref())?;
    let action = build_action(&cli, &config, registry)?;

    log::info!("Found {} image(s) to process ({})", images.len(), action.label());

    let mut results = Vec::new();
    let total = images.len();

    for (i, image_path) in images.iter().enumerate() {
        log::info!("[{}/{}] Processing: {}", i + 1, total, image_path.display());

        let result = match run_action(&action, image_path, &config, registry) {
            Ok((output, unchanged)) => {
                if unchanged {
                    log::info!("  Nothing to do, left unchanged");
                } else {
                    log::info!("  Wrote: {}", output.display());
                }
                RunResult {
                    path: image_path.clone(),
                    output: Some(output),
                    unchanged,
                    error: None,
                }
            }
            Err(e) => {
                log::error!("  Error: {e:#}");
                RunResult {
                    path: image_path.clone(),
                    output: None,
                    unchanged: false,
                    error: Some(format!("{e:#}")),
                }
            }
        };
        results.push(result);
    }

    // JSON output
    if cli.json {
        let json_results: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.path.display().to_string(),
                    "output": r.output.as_ref().map(|p| p.display().to_string()),
                    "unchanged": r.unchanged,
                    "error": r.error,
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    // Summary
    let success = results.iter().filter(|r| r.error.is_none()).count();
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Turn the flags into exactly one action.
fn build_action(cli: &Cli, config: &config::Config, registry: &TagRegistry) -> Result<Action> {
    let chosen = [
        !cli.set.is_empty(),
        !cli.delete.is_empty(),
        cli.template.is_some(),
        cli.strip,
        cli.watermark.is_some(),
    ]
    .iter()
    .filter(|&&b| b)
    .count();
    if chosen == 0 {
        anyhow::bail!(
            "Nothing to do. Use --show, --set, --delete, --template, --strip or --watermark."
        );
    }
    if chosen > 1 {
        anyhow::bail!("Use only one of --set, --delete, --template, --strip, --watermark per run.");
    }

    if !cli.set.is_empty() {
        let changes = ChangeSet::from_pairs(registry, cli.set.iter().map(|(k, v)| (k, v)));
        if changes.is_empty() {
            anyhow::bail!("None of the --set keys name a known tag");
        }
        return Ok(Action::Modify(changes));
    }
    if !cli.delete.is_empty() {
        return Ok(Action::Delete(cli.delete.iter().cloned().collect()));
    }
    if let Some(ref name) = cli.template {
        let keep = templates::get_template(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Unknown template {name:?} (available: {})",
                templates::list_templates().join(", ")
            )
        })?;
        return Ok(Action::KeepOnly(name.clone(), keep));
    }
    if cli.strip {
        return Ok(Action::Strip);
    }
    let text = cli.watermark.clone().unwrap_or_default();
    let position = cli.position.unwrap_or(config.watermark.position);
    let opacity = cli.opacity.unwrap_or(config.watermark.opacity);
    Ok(Action::Watermark(text, position, opacity))
}

/// Run one action; returns the produced path and whether it is unchanged.
fn run_action(
    action: &Action,
    path: &Path,
    config: &config::Config,
    registry: &TagRegistry,
) -> Result<(PathBuf, bool)> {
    let output = &config.output;
    let outcome = match action {
        Action::Modify(changes) => modify_exif(path, changes, output)?,
        Action::Delete(names) => delete_tags(path, names, registry, output)?,
        Action::KeepOnly(name, keep) => {
            log::debug!("  Template: {name}");
            keep_only_tags(path, keep, registry, output)?
        }
        Action::Strip => return Ok((purify::strip_exif(path, output)?, false)),
        Action::Watermark(text, position, opacity) => {
            let dest = watermark::apply_watermark(path, text, *position, *opacity, config)?;
            return Ok((dest, false));
        }
    };
    let unchanged = !outcome.is_written();
    Ok((outcome.path().to_path_buf(), unchanged))
}

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Width of the value column.
const VALUE_WIDTH: usize = 48;
/// Longer values are cut to this many lines.
const MAX_VALUE_LINES: usize = 4;

/// Print every IFD of `view` as a two-column table.
fn print_full_exif(path: &Path, view: &ExifView) {
    println!();
    println!("{BOLD}{}{RESET}", path.display());

    if view.is_empty() {
        println!("  {DIM}no EXIF metadata{RESET}");
        println!();
        return;
    }
    for ifd in Ifd::ALL {
        let rows: Vec<(&str, String)> = view
            .section(ifd)
            .iter()
            .map(|(tag, value)| (tag.as_str(), value.to_string()))
            .collect();
        print_table(ifd.name(), &rows);
    }

    let mut derived = Vec::new();
    if let Some((lat, lon)) = view.lat_lon() {
        derived.push(("Location", format!("{lat:.6}, {lon:.6}")));
    }
    if view.has_thumbnail {
        derived.push(("Thumbnail", "embedded".to_string()));
    }
    print_table("Derived", &derived);
}

fn print_table(title: &str, rows: &[(&str, String)]) {
    if rows.is_empty() {
        return;
    }
    let width = rows.iter().map(|(tag, _)| tag.chars().count()).max().unwrap_or(0);
    println!("  {BOLD}[{title}]{RESET}");
    for (tag, value) in rows {
        for (i, line) in wrap_value(value, VALUE_WIDTH).iter().enumerate() {
            let label = if i == 0 { *tag } else { "" };
            println!("    {label:<width$} {DIM}|{RESET} {line}");
        }
    }
    println!();
}

/// Break `value` into lines of at most `width` characters, at spaces where
/// possible. A word wider than `width` is split; output past
/// [`MAX_VALUE_LINES`] is replaced by a count of the hidden lines.
fn wrap_value(value: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in value.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for piece in chars.chunks(width).map(String::from_iter) {
            let len = line.chars().count();
            if len == 0 {
                line = piece;
            } else if len + 1 + piece.chars().count() <= width {
                line.push(' ');
                line.push_str(&piece);
            } else {
                lines.push(std::mem::replace(&mut line, piece));
            }
        }
    }
    if !line.is_empty() || lines.is_empty() {
        lines.push(line);
    }

    if lines.len() > MAX_VALUE_LINES {
        let hidden = lines.len() - (MAX_VALUE_LINES - 1);
        lines.truncate(MAX_VALUE_LINES - 1);
        lines.push(format!("... {hidden} more line(s)"));
    }
    lines
}
