use std::path::PathBuf;

use catalog::AntialiasSetting;
use clap::{Parser, Subcommand};
use renderer::Antialiasing;

#[derive(Parser, Debug)]
#[command(
    name = "labs",
    author,
    version,
    about = "NeuraByte Labs shader showcase",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Project list to show (JSON array or TOML `[[projects]]`).
    #[arg(long, value_name = "FILE", global = true)]
    pub projects: Option<PathBuf>,

    /// Directory of `<id>.frag` files that add or replace card shaders.
    #[arg(long, value_name = "DIR", global = true)]
    pub shaders: Option<PathBuf>,

    /// Config file to read instead of the default `labs.toml`.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Window size in logical pixels (e.g. `1280x900`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Anti-aliasing for card shaders: `auto`, `off`, or an MSAA sample count.
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<Antialiasing>,

    /// Skip the particle background.
    #[arg(long)]
    pub no_background: bool,

    /// Seed for the particle field, for reproducible runs.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Run without a window or GPU, recording draws only.
    #[arg(long)]
    pub headless: bool,

    /// Frames to run in headless mode.
    #[arg(long, value_name = "N", default_value_t = 60)]
    pub frames: u32,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every project with its status and whether its shader resolves.
    List,
    /// Print the resolved config and shader locations.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    if value.trim().is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }
    AntialiasSetting::parse(value).map(Antialiasing::from)
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{w}'"))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{h}'"))?;
    if width == 0 || height == 0 {
        return Err("window size must be greater than zero".into());
    }
    Ok((width, height))
}
