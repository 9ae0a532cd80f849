//! `ocibundle stat` command — Show image history aligned with its layers.

use std::path::PathBuf;

use clap::Args;
use comfy_table::Table;
use ocibundle_core::CliConfig;
use ocibundle_runtime::{HistoryStat, ManifestStat, OciLayout};

use crate::output;

#[derive(Args)]
pub struct StatArgs {
    /// OCI image layout directory
    #[arg(long)]
    pub layout: Option<PathBuf>,
    /// Tag to resolve in the layout's index.json
    #[arg(long)]
    pub tag: Option<String>,
    /// Print the raw stat as JSON
    #[arg(long)]
    pub json: bool,
    /// Do not truncate digests or free-text columns
    #[arg(long)]
    pub no_trunc: bool,
}

pub async fn execute(args: StatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::from_env()?;
    let layout_dir = args.layout.unwrap_or(config.layout);
    let tag = args.tag.or(config.tag);

    let layout = OciLayout::open(&layout_dir)?;
    let descriptor = layout.resolve_reference(tag.as_deref())?;
    let stat = ocibundle_runtime::stat(&layout, &descriptor).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stat)?);
        return Ok(());
    }

    let width = (!args.no_trunc).then_some(config.truncate_width);
    println!("{}", history_table(&stat, width));
    Ok(())
}

/// Render history records in order. `width` truncates free-text columns.
pub fn history_table(stat: &ManifestStat, width: Option<usize>) -> Table {
    let mut table = output::new_table(&["LAYER", "CREATED", "CREATED BY", "SIZE", "COMMENT"]);

    for entry in &stat.history {
        let row = history_row(entry, width);
        table.add_row(row);
    }

    table
}

fn history_row(entry: &HistoryStat, width: Option<usize>) -> [String; 5] {
    let history = &entry.history;
    let text = |field: &Option<String>| {
        let value = output::sanitize_field(field.as_deref().unwrap_or_default());
        match width {
            Some(w) => output::truncate_str(&value, w),
            None => value,
        }
    };

    let (layer, size) = match &entry.layer {
        Some(layer) => {
            let digest = layer.digest().as_str();
            let digest = match width {
                Some(_) => short_digest(digest),
                None => digest.to_string(),
            };
            (digest, output::format_bytes(layer.size().max(0) as u64))
        }
        None => (output::NONE.to_string(), output::NONE.to_string()),
    };

    let created = match history.created() {
        Some(ts) => format_created(ts),
        None => "<unknown>".to_string(),
    };

    [layer, created, text(history.created_by()), size, text(history.comment())]
}

/// Algorithm prefix stripped, first 12 hex characters kept.
fn short_digest(digest: &str) -> String {
    let hex = digest.split_once(':').map_or(digest, |(_, hex)| hex);
    hex.chars().take(12).collect()
}

fn format_created(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| output::format_ago(&dt.with_timezone(&chrono::Utc)))
        .unwrap_or_else(|_| output::sanitize_field(ts))
}
