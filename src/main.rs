use std::error::Error;
use std::fs::File;
use std::sync::Mutex;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wildland::ascii::{export_region_file, print_colored_region, render_region};
use wildland::explorer::run_explorer;
use wildland::export::{export_elevation_map, export_terrain_map};
use wildland::{Core, GameConfig};

/// Log file used while the explorer owns the terminal.
const EXPLORER_LOG_FILE: &str = "wildland.log";

#[derive(Parser, Debug)]
#[command(name = "wildland")]
#[command(about = "Generate a wilderness region and walk it with deer around")]
struct Args {
    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Side length of the square region in cells
    #[arg(short = 'r', long)]
    region_size: Option<u32>,

    /// JSON configuration file; command line flags override it
    #[arg(short, long)]
    config: Option<String>,

    /// Print the region as ASCII
    #[arg(long)]
    ascii: bool,

    /// Colour the ASCII output with ANSI escapes
    #[arg(long)]
    color: bool,

    /// Write the ASCII region, legend and stats to a text file
    #[arg(long)]
    export_ascii: Option<String>,

    /// Export the classified map to PNG
    #[arg(long)]
    export_png: Option<String>,

    /// Export the elevation field to PNG
    #[arg(long)]
    export_elevation: Option<String>,

    /// Print generation statistics
    #[arg(long)]
    stats: bool,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,

    /// Open the terminal explorer
    #[arg(short, long)]
    explore: bool,

    /// Write logs to this file instead of stderr (the explorer defaults to wildland.log)
    #[arg(long)]
    log_file: Option<String>,
}

impl Args {
    /// Where log lines go; `None` means stderr.
    fn log_path(&self) -> Option<String> {
        self.log_file
            .clone()
            .or_else(|| self.explore.then(|| EXPLORER_LOG_FILE.to_string()))
    }
}

fn init_logging(args: &Args) -> Result<(), Box<dyn Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wildland=info"));
    match args.log_path() {
        Some(path) => {
            let file = File::create(&path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    init_logging(&args)?;

    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.world.seed = seed;
    } else if args.config.is_none() {
        config.world.seed = rand::random();
    }
    if let Some(size) = args.region_size {
        config.world.region_size = size;
    }

    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    info!(seed = config.world.seed, size = config.world.region_size, "starting");
    let core = Core::new(config)?;

    if args.ascii {
        if args.color {
            print_colored_region(&core);
        } else {
            print!("{}", render_region(&core));
        }
    }

    if let Some(path) = &args.export_ascii {
        export_region_file(&core, path)?;
        info!(path = %path, "exported ascii region");
    }

    if let Some(path) = &args.export_png {
        export_terrain_map(&core, path)?;
        info!(path = %path, "exported terrain map");
    }

    if let Some(path) = &args.export_elevation {
        if let Some(elevation) = core.context().artifacts().elevation.as_ref() {
            export_elevation_map(elevation, path)?;
            info!(path = %path, "exported elevation map");
        }
    }

    if args.stats {
        println!("{}", core.stats());
    }

    if args.explore {
        run_explorer(core)?;
    }

    Ok(())
}
