//! Command line front end for the panel engine
//!
//! ```bash
//! # what does the panel say about itself
//! inkpanel --config panel.toml query
//!
//! # white out the whole panel
//! inkpanel --driver USB --panel IT8951 clear
//!
//! # show a PNG in the top left corner with the fast A2 waveform
//! inkpanel draw logo.png --x 0 --y 0 --mode 4
//!
//! # try it without hardware
//! inkpanel --mock --driver GPIO --panel IT8951 fill --color "#000"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use inkpanel::config::TransportSelection;
use inkpanel::{build_driver, Bpp, Canvas, Config, DisplayMode, PanelDriver};

#[derive(Parser)]
#[command(name = "inkpanel")]
#[command(version)]
#[command(about = "Drive IT8951 e-paper panels over USB or SPI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Driver family, USB or GPIO (overrides the config file)
    #[arg(long, global = true)]
    driver: Option<String>,

    /// Panel type, IT8951 or Mock (overrides the config file)
    #[arg(long, global = true)]
    panel: Option<String>,

    /// Use in-memory transports instead of real hardware
    #[arg(long, global = true)]
    mock: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Paint the whole panel white
    Clear,

    /// Print what the panel reports about itself
    Query,

    /// Fill the whole panel with one color
    Fill {
        /// Hex color, eg. #FFF or #808080
        #[arg(long, default_value = "#FFF")]
        color: String,
    },

    /// Draw a PNG image
    Draw {
        /// PNG file
        path: PathBuf,

        #[arg(long, default_value_t = 0)]
        x: u32,

        #[arg(long, default_value_t = 0)]
        y: u32,

        /// Display mode override, eg. 0 INIT, 2 GC16, 4 A2
        #[arg(long)]
        mode: Option<u32>,

        /// Only upload, leave the panel as it is
        #[arg(long)]
        no_refresh: bool,
    },

    /// Set the VCOM voltage in millivolts, eg. -1500
    Vcom {
        #[arg(allow_hyphen_values = true)]
        value: i16,
    },

    /// Switch pixel depth and redraw white
    Bpp { bits: u8 },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)
            .with_context(|| format!("Could not load {}", path.display()))?,
        None => Config::new("USB", "IT8951"),
    };
    if let Some(driver) = &cli.driver {
        config.driver = driver.clone();
    }
    if let Some(panel) = &cli.panel {
        config.panel = panel.clone();
    }
    if cli.mock {
        config.transport = TransportSelection::Mock;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    log::info!("Connecting to {} {} panel", config.driver, config.panel);

    let mut panel = build_driver(&config).context("Could not set up the panel")?;
    let result = execute(panel.as_mut(), cli.command);
    panel.close();
    result
}

fn execute(panel: &mut dyn PanelDriver, command: Commands) -> Result<()> {
    match command {
        Commands::Clear => panel.clear()?,
        Commands::Query => {
            let info = panel.query()?;
            print!("{}", info);
        }
        Commands::Fill { color } => {
            let mut canvas = Canvas::new(panel.width(), panel.height());
            canvas.fill_hex(&color)?;
            panel.draw(0, 0, &canvas, None, true)?;
        }
        Commands::Draw {
            path,
            x,
            y,
            mode,
            no_refresh,
        } => {
            let pixels = image::open(&path)
                .with_context(|| format!("Could not read {}", path.display()))?
                .to_rgba8();
            let canvas = Canvas::from_rgba(pixels);
            log::info!(
                "Drawing {}x{} image at ({}, {})",
                canvas.width(),
                canvas.height(),
                x,
                y
            );
            panel.draw(x, y, &canvas, mode.map(DisplayMode), !no_refresh)?;
        }
        Commands::Vcom { value } => {
            panel.set_vcom(value)?;
            log::info!("VCOM set to {} mV", value);
        }
        Commands::Bpp { bits } => {
            panel.set_bpp(Bpp::try_from(bits)?)?;
            panel.clear()?;
        }
    }
    Ok(())
}
