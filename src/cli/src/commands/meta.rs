//! `ocibundle meta` command — Inspect or initialise bundle metadata.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use ocibundle_core::bundle::{parse_id_mapping, BundleMeta, MapOptions};
use ocibundle_core::{CliConfig, VERSION};
use ocibundle_runtime::{read_bundle_meta, write_bundle_meta, OciLayout};
use oci_spec::runtime::LinuxIdMapping;

use crate::output;

#[derive(Args)]
pub struct MetaArgs {
    #[command(subcommand)]
    pub command: MetaCommand,
}

#[derive(Subcommand)]
pub enum MetaCommand {
    /// Show the metadata recorded in a bundle
    Show(ShowArgs),
    /// Record the manifest a bundle is unpacked from
    Init(InitArgs),
}

#[derive(Args)]
pub struct ShowArgs {
    /// Bundle directory
    pub bundle: PathBuf,
    /// Print the metadata file as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct InitArgs {
    /// Bundle directory
    pub bundle: PathBuf,
    /// OCI image layout directory
    #[arg(long)]
    pub layout: Option<PathBuf>,
    /// Tag to resolve in the layout's index.json
    #[arg(long)]
    pub tag: Option<String>,
    /// UID mapping (container:host[:size]), repeatable
    #[arg(long = "uid-map")]
    pub uid_maps: Vec<String>,
    /// GID mapping (container:host[:size]), repeatable
    #[arg(long = "gid-map")]
    pub gid_maps: Vec<String>,
    /// Bundle is unpacked without privileges
    #[arg(long)]
    pub rootless: bool,
}

pub async fn execute(args: MetaArgs) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        MetaCommand::Show(args) => show(args),
        MetaCommand::Init(args) => init(args),
    }
}

fn show(args: ShowArgs) -> Result<(), Box<dyn std::error::Error>> {
    let meta = read_bundle_meta(&args.bundle)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }

    let mut table = output::new_table(&["FIELD", "VALUE"]);
    for (field, value) in meta_rows(&meta) {
        table.add_row([field, value]);
    }
    println!("{table}");
    Ok(())
}

fn meta_rows(meta: &BundleMeta) -> Vec<(String, String)> {
    let from = &meta.from_descriptor;
    let opts = &meta.map_options;
    vec![
        ("VERSION".to_string(), meta.version.clone()),
        ("MEDIA TYPE".to_string(), from.media_type().to_string()),
        ("DIGEST".to_string(), from.digest().to_string()),
        ("SIZE".to_string(), output::format_bytes(from.size().max(0) as u64)),
        ("ROOTLESS".to_string(), opts.rootless.to_string()),
        ("UID MAP".to_string(), format_mappings(&opts.uid_mappings)),
        ("GID MAP".to_string(), format_mappings(&opts.gid_mappings)),
    ]
}

fn format_mappings(mappings: &[LinuxIdMapping]) -> String {
    if mappings.is_empty() {
        return output::NONE.to_string();
    }
    mappings
        .iter()
        .map(|m| format!("{}:{}:{}", m.container_id(), m.host_id(), m.size()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn init(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::from_env()?;
    let layout_dir = args.layout.clone().unwrap_or(config.layout);
    let tag = args.tag.clone().or(config.tag);

    let layout = OciLayout::open(&layout_dir)?;
    let descriptor = layout.resolve_reference(tag.as_deref())?;
    let map_options = map_options(&args)?;

    let meta = BundleMeta::new(VERSION, descriptor, map_options);
    write_bundle_meta(&args.bundle, &meta)?;
    tracing::info!(bundle = %args.bundle.display(), digest = %meta.from_descriptor.digest(), "initialised bundle metadata");
    println!("{}", display_path(&args.bundle));
    Ok(())
}

/// Explicit mappings win; `--rootless` alone maps root to the current user.
fn map_options(args: &InitArgs) -> Result<MapOptions, Box<dyn std::error::Error>> {
    let uid_mappings = args
        .uid_maps
        .iter()
        .map(|m| parse_id_mapping(m))
        .collect::<Result<Vec<_>, _>>()?;
    let gid_mappings = args
        .gid_maps
        .iter()
        .map(|m| parse_id_mapping(m))
        .collect::<Result<Vec<_>, _>>()?;

    if args.rootless && uid_mappings.is_empty() && gid_mappings.is_empty() {
        let (uid, gid) = current_ids();
        return Ok(MapOptions::rootless_for(uid, gid)?);
    }

    Ok(MapOptions {
        uid_mappings,
        gid_mappings,
        rootless: args.rootless,
    })
}

fn current_ids() -> (u32, u32) {
    // SAFETY: geteuid/getegid cannot fail and touch no memory.
    unsafe { (libc::geteuid(), libc::getegid()) }
}

fn display_path(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}
