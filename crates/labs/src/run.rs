use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use catalog::{Catalog, ShowcaseConfig};
use renderer::headless::HeadlessFactory;
use renderer::{
    run_window, Antialiasing, SceneOptions, Showcase, ShowcaseOptions, Viewport, WindowOptions,
};
use shaders::ShaderRegistry;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Config file merged with command line flags; flags win.
#[derive(Debug, Clone)]
pub struct Settings {
    pub size: (u32, u32),
    pub antialias: Antialiasing,
    pub background: bool,
    pub seed: Option<u64>,
    pub frame_interval: Duration,
}

impl Settings {
    pub fn resolve(args: &RunArgs, config: &ShowcaseConfig) -> Self {
        Self {
            size: args
                .size
                .unwrap_or((config.window.width, config.window.height)),
            antialias: args
                .antialias
                .or_else(|| config.antialias.map(Antialiasing::from))
                .unwrap_or_default(),
            background: config.background && !args.no_background,
            seed: args.seed.or(config.seed),
            frame_interval: config.frame_interval,
        }
    }

    pub fn showcase_options(&self) -> ShowcaseOptions {
        ShowcaseOptions {
            background: self.background,
            seed: self.seed,
            card: SceneOptions {
                antialias: self.antialias != Antialiasing::Off,
                transparent: true,
            },
        }
    }
}

/// Everything a run needs before a window or backend exists.
pub struct Inputs {
    pub config: ShowcaseConfig,
    pub catalog: Catalog,
    pub registry: ShaderRegistry,
}

pub fn load_inputs(args: &RunArgs, paths: &AppPaths) -> Result<Inputs> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| paths.config_file());
    let config = ShowcaseConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::debug!(path = %config_path.display(), "resolved config");

    let catalog = match args.projects.as_ref().or(config.projects.as_ref()) {
        Some(path) => {
            let catalog = Catalog::load(path)
                .with_context(|| format!("failed to load projects from {}", path.display()))?;
            tracing::info!(path = %path.display(), projects = catalog.len(), "loaded project list");
            catalog
        }
        None => Catalog::builtin().context("built-in project list is invalid")?,
    };

    let mut registry = ShaderRegistry::builtin();
    let user_dir = paths.shader_dir();
    if user_dir.is_dir() {
        load_shaders(&mut registry, &user_dir)?;
    }
    for dir in [config.shaders.as_ref(), args.shaders.as_ref()]
        .into_iter()
        .flatten()
    {
        load_shaders(&mut registry, dir)?;
    }

    Ok(Inputs {
        config,
        catalog,
        registry,
    })
}

fn load_shaders(registry: &mut ShaderRegistry, dir: &Path) -> Result<()> {
    let count = registry
        .load_dir(dir)
        .with_context(|| format!("failed to load shaders from {}", dir.display()))?;
    tracing::info!(dir = %dir.display(), count, "loaded card shaders");
    Ok(())
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let inputs = load_inputs(&args, &paths)?;
    let settings = Settings::resolve(&args, &inputs.config);
    tracing::debug!(?settings, headless = args.headless, "resolved settings");

    if args.headless {
        let summary = run_headless(&inputs, &settings, args.frames);
        println!(
            "rendered {} frames: {} card draws across {} scenes ({} of {} cards without shader)",
            summary.frames,
            summary.card_draws,
            summary.scenes,
            summary.cards - summary.scenes,
            summary.cards
        );
        return Ok(());
    }

    tracing::info!(
        width = settings.size.0,
        height = settings.size.1,
        antialias = ?settings.antialias,
        "opening showcase window"
    );
    run_window(
        &inputs.catalog.projects,
        &inputs.registry,
        WindowOptions {
            size: settings.size,
            antialias: settings.antialias,
            frame_interval: settings.frame_interval,
            showcase: settings.showcase_options(),
            ..WindowOptions::default()
        },
    )
}

/// Prints one line per project: id, status badge, shader state and link.
pub fn list(args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let inputs = load_inputs(args, &paths)?;
    for project in &inputs.catalog.projects {
        let shader = if inputs.registry.contains(&project.id) {
            "ok"
        } else {
            "missing"
        };
        let url = match project.url.as_deref() {
            Some(url) if project.has_link() => url,
            _ => "-",
        };
        println!(
            "{:<12} {:<7} shader={:<7} {}",
            project.id,
            project.status.badge(),
            shader,
            url
        );
    }
    Ok(())
}

pub fn print_where(args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config_file = args
        .config
        .clone()
        .unwrap_or_else(|| paths.config_file());
    println!("Configuration:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!("  config file: {}", config_file.display());
    println!("  data dir:    {}", paths.data_dir().display());
    println!("  shader dir:  {}", paths.shader_dir().display());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessSummary {
    pub frames: u32,
    pub cards: usize,
    pub scenes: usize,
    pub card_draws: usize,
    pub background_draws: usize,
    /// Events the backend still holds at the end of the run.
    pub retained_events: usize,
}

/// Runs the page against the headless backend on a virtual clock that
/// advances by the frame interval. Only draw counters are kept.
pub fn run_headless(inputs: &Inputs, settings: &Settings, frames: u32) -> HeadlessSummary {
    let mut factory = HeadlessFactory::counting();
    let log = factory.log();
    let (width, height) = settings.size;
    let mut showcase = Showcase::initialize(
        &inputs.catalog.projects,
        &inputs.registry,
        Viewport::new(width as f32, height as f32, 1.0),
        &mut factory,
        settings.showcase_options(),
    );

    let start = Instant::now();
    let mut card_draws = 0;
    for frame in 0..frames {
        let now = start + settings.frame_interval * frame;
        showcase.poll(now);
        card_draws += showcase.frame(now);
    }

    let summary = HeadlessSummary {
        frames,
        cards: showcase.report().cards,
        scenes: showcase.report().scenes,
        card_draws,
        background_draws: log.particle_draws(),
        retained_events: log.retained_events(),
    };
    showcase.destroy();
    tracing::info!(
        frames,
        card_draws,
        background_draws = summary.background_draws,
        "headless run finished"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    fn inputs() -> Inputs {
        Inputs {
            config: ShowcaseConfig::default(),
            catalog: Catalog::builtin().unwrap(),
            registry: ShaderRegistry::builtin(),
        }
    }

    #[test]
    fn flags_override_config() {
        let config = ShowcaseConfig::from_toml_str("antialias = \"off\"\nseed = 3\n").unwrap();
        let cli = Cli::parse_from(["labs", "--antialias", "4", "--no-background"]);
        let settings = Settings::resolve(&cli.run, &config);
        assert_eq!(settings.antialias, Antialiasing::Samples(4));
        assert!(!settings.background);
        assert_eq!(settings.seed, Some(3));
        assert_eq!(settings.size, (1280, 900));

        let cli = Cli::parse_from(["labs"]);
        let settings = Settings::resolve(&cli.run, &config);
        assert_eq!(settings.antialias, Antialiasing::Off);
        assert!(!settings.showcase_options().card.antialias);
    }

    #[test]
    fn headless_run_draws_every_scene_each_frame() {
        let cli = Cli::parse_from(["labs", "--seed", "1"]);
        let settings = Settings::resolve(&cli.run, &ShowcaseConfig::default());
        let summary = run_headless(&inputs(), &settings, 10);
        assert_eq!(summary.scenes, 9);
        assert_eq!(summary.card_draws, 90);
        assert_eq!(summary.background_draws, 10);
    }

    #[test]
    fn long_headless_runs_keep_only_counters() {
        let cli = Cli::parse_from(["labs", "--seed", "1"]);
        let settings = Settings::resolve(&cli.run, &ShowcaseConfig::default());
        let short = run_headless(&inputs(), &settings, 10);
        let long = run_headless(&inputs(), &settings, 1000);
        assert_eq!(long.card_draws, 9000);
        assert_eq!(long.retained_events, short.retained_events);
        assert_eq!(long.retained_events, 9);
    }

    #[test]
    fn missing_shaders_leave_cards_static() {
        let mut inputs = inputs();
        inputs.registry.remove("voice");
        let cli = Cli::parse_from(["labs", "--no-background"]);
        let settings = Settings::resolve(&cli.run, &ShowcaseConfig::default());
        let summary = run_headless(&inputs, &settings, 2);
        assert_eq!(summary.cards, 9);
        assert_eq!(summary.scenes, 8);
        assert_eq!(summary.card_draws, 16);
        assert_eq!(summary.background_draws, 0);
    }
}
