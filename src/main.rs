use std::{fs::File, ops::Range, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use glam::UVec2;
use log::LevelFilter;
use tilemif_lib::{
    compose,
    config::Blank,
    pipeline,
    renderer::{Identity, RangeRemap},
    transform::TrailingGroup,
    Config,
};

#[derive(Parser)]
#[command(name = "tilemif")]
#[command(version, about = "Tile atlases and MIF files for FPGA video hardware", long_about = None)]
struct Cli {
    /// JSON settings file. Flags given here take precedence over it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More output, repeat for even more
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut an image into a deduplicated tiles file and a tilemap file
    Extract {
        image: PathBuf,

        #[arg(long, default_value = "tiles.csv")]
        tiles: PathBuf,

        #[arg(long, default_value = "tilemap.csv")]
        tilemap: PathBuf,

        #[arg(long)]
        tile_size: Option<u32>,

        /// Require the image to be exactly this size
        #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
        canvas: Option<Vec<u32>>,
    },

    /// Rebuild an image from a tiles file and a tilemap file
    Render {
        tiles: PathBuf,
        tilemap: PathBuf,
        output: PathBuf,

        /// Only tilemap values in START..END resolve, shifted by --offset
        #[arg(long, value_parser = parse_range)]
        remap: Option<Range<usize>>,

        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: isize,

        /// Filler for unresolved cells: opaque-black, transparent, error or a hex word
        #[arg(long, value_parser = parse_blank)]
        blank: Option<Blank>,
    },

    /// Tiles file to a MIF of one word per tile row
    TilesMif {
        tiles: PathBuf,
        output: PathBuf,

        /// First address, in hex
        #[arg(long, value_parser = parse_address)]
        base: Option<usize>,
    },

    /// Tilemap file to a MIF of one 8 bit word per cell
    TilemapMif {
        tilemap: PathBuf,
        output: PathBuf,

        #[arg(long, value_parser = parse_address)]
        base: Option<usize>,
    },

    /// Sprites file to a MIF of one 16 bit word per pixel
    SpriteMif {
        sprites: PathBuf,
        output: PathBuf,

        #[arg(long, value_parser = parse_address)]
        base: Option<usize>,
    },

    /// Any binary file to a MIF of one 8 bit word per byte
    RawMif {
        raw: PathBuf,
        output: PathBuf,

        #[arg(long, value_parser = parse_address)]
        base: Option<usize>,
    },

    /// Sprite images, in order, into one sprites file
    SpriteCsv {
        #[arg(required = true)]
        images: Vec<PathBuf>,

        #[arg(short, long, default_value = "sprites.csv")]
        output: PathBuf,
    },

    /// Preview a single sprite file as an image
    SpritePng { sprite: PathBuf, output: PathBuf },

    /// Split a 16 bit sprite MIF back into images
    Sprites {
        mif: PathBuf,

        #[arg(default_value = "sprites")]
        out_dir: PathBuf,
    },

    /// Reverse the order of fixed size groups of MIF data lines
    ReverseGroups {
        input: PathBuf,
        output: PathBuf,

        #[arg(long)]
        group_size: Option<usize>,

        /// Fail instead of dropping lines that do not fill a group
        #[arg(long)]
        reject_trailing: bool,
    },

    /// Reverse the 16 nibble groups of each 64 digit MIF word
    ReverseNibbles { input: PathBuf, output: PathBuf },

    /// Show an image at RGB555T precision
    Quantize {
        input: PathBuf,
        output: PathBuf,

        /// Ignore alpha
        #[arg(long)]
        opaque: bool,
    },

    /// Count the colors of an image, near colors counted once
    Colors {
        input: PathBuf,

        #[arg(long)]
        threshold: Option<u8>,
    },

    /// Paste one image onto the center of another
    Overlay {
        background: PathBuf,
        top: PathBuf,
        output: PathBuf,
    },

    /// Scale an image to fit a tile, centered
    Fit {
        input: PathBuf,
        output: PathBuf,

        #[arg(long)]
        size: Option<u32>,

        /// Fill the margins white instead of transparent
        #[arg(long)]
        white: bool,
    },

    /// Letterbox an image onto a background sized canvas
    Canvas {
        input: PathBuf,
        output: PathBuf,

        #[arg(long, default_value_t = 640)]
        width: u32,

        #[arg(long, default_value_t = 480)]
        height: u32,

        /// Fill the margins white instead of transparent
        #[arg(long)]
        white: bool,
    },

    /// Shrink an image inside its own frame, leaving a transparent margin
    Shrink {
        input: PathBuf,
        output: PathBuf,

        /// Canvas the image is centered on before scaling back, 1.5x its size by default
        #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
        expanded: Option<Vec<u32>>,
    },

    /// Cut a horizontal strip into square tiles
    Slice {
        input: PathBuf,

        #[arg(default_value = "tiles")]
        out_dir: PathBuf,
    },
}

fn parse_address(s: &str) -> std::result::Result<usize, String> {
    let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X");
    return usize::from_str_radix(digits, 16).map_err(|_| format!("{s:?} is not a hex address"));
}

fn parse_range(s: &str) -> std::result::Result<Range<usize>, String> {
    let (start, end) = s
        .split_once("..")
        .ok_or_else(|| format!("{s:?} is not a START..END range"))?;
    let bound = |v: &str| v.trim().parse::<usize>().map_err(|_| format!("{v:?} is not a number"));
    return Ok(bound(start)?..bound(end)?);
}

fn parse_blank(s: &str) -> std::result::Result<Blank, String> {
    return s.parse::<Blank>().map_err(|e| e.to_string());
}

fn level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Warn;
    }
    return match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
}

fn init_logging(cli: &Cli) -> Result<()> {
    use simplelog::{ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger};
    let level = level(cli.verbose, cli.quiet);
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = &cli.log_file {
        let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
        loggers.push(WriteLogger::new(level, simplelog::Config::default(), file));
    }
    CombinedLogger::init(loggers)?;
    return Ok(());
}

fn load_config(cli: &Cli) -> Result<Config> {
    return match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display())),
        None => Ok(Config::default()),
    };
}

fn run(command: Commands, mut config: Config) -> Result<()> {
    match command {
        Commands::Extract {
            image,
            tiles,
            tilemap,
            tile_size,
            canvas,
        } => {
            config.tile_size = tile_size.unwrap_or(config.tile_size);
            if let Some(canvas) = canvas {
                let [width, height] = canvas[..] else {
                    bail!("--canvas takes a width and a height");
                };
                config.canvas = Some([width, height]);
            }
            let summary = pipeline::image_to_tiles(&image, &tiles, &tilemap, &config)
                .with_context(|| format!("extracting tiles from {}", image.display()))?;
            println!(
                "{} unique tiles, {}x{} tilemap",
                summary.unique_tiles, summary.map_width, summary.map_height
            );
        }
        Commands::Render {
            tiles,
            tilemap,
            output,
            remap,
            offset,
            blank,
        } => {
            config.blank = blank.unwrap_or(config.blank);
            let rendered = match remap {
                Some(range) => {
                    pipeline::tiles_to_image(&tiles, &tilemap, &output, RangeRemap::new(range, offset), &config)
                }
                None => pipeline::tiles_to_image(&tiles, &tilemap, &output, Identity, &config),
            };
            rendered.with_context(|| format!("rendering {}", output.display()))?;
        }
        Commands::TilesMif { tiles, output, base } => {
            let base = base.unwrap_or(config.tiles_base);
            pipeline::tiles_to_mif(&tiles, &output, base, &config)
                .with_context(|| format!("converting {}", tiles.display()))?;
        }
        Commands::TilemapMif { tilemap, output, base } => {
            let base = base.unwrap_or(config.tilemap_base);
            pipeline::tilemap_to_mif(&tilemap, &output, base)
                .with_context(|| format!("converting {}", tilemap.display()))?;
        }
        Commands::SpriteMif { sprites, output, base } => {
            let base = base.unwrap_or(config.sprite_base);
            pipeline::sprites_to_mif(&sprites, &output, base, &config)
                .with_context(|| format!("converting {}", sprites.display()))?;
        }
        Commands::RawMif { raw, output, base } => {
            pipeline::raw_to_mif(&raw, &output, base.unwrap_or(0))
                .with_context(|| format!("converting {}", raw.display()))?;
        }
        Commands::SpriteCsv { images, output } => {
            let count = pipeline::images_to_sprites(&images, &output, &config)?;
            println!("{count} sprites written to {}", output.display());
        }
        Commands::SpritePng { sprite, output } => {
            pipeline::sprite_to_image(&sprite, &output, &config)
                .with_context(|| format!("previewing {}", sprite.display()))?;
        }
        Commands::Sprites { mif, out_dir } => {
            let written = pipeline::mif_to_sprites(&mif, &out_dir, &config)
                .with_context(|| format!("recovering sprites from {}", mif.display()))?;
            println!("{} sprites written to {}", written.len(), out_dir.display());
        }
        Commands::ReverseGroups {
            input,
            output,
            group_size,
            reject_trailing,
        } => {
            let mut reversal = config.group_reversal();
            reversal.group_size = group_size.unwrap_or(reversal.group_size);
            if reject_trailing {
                reversal.trailing = TrailingGroup::Reject;
            }
            let lines = pipeline::reverse_groups(&input, &output, reversal)
                .with_context(|| format!("reversing groups of {}", input.display()))?;
            println!("{lines} data lines written to {}", output.display());
        }
        Commands::ReverseNibbles { input, output } => {
            pipeline::reverse_nibbles(&input, &output)
                .with_context(|| format!("reversing nibbles of {}", input.display()))?;
        }
        Commands::Quantize { input, output, opaque } => {
            pipeline::quantize_image(&input, &output, opaque, &config.codec())?;
        }
        Commands::Colors { input, threshold } => {
            let threshold = threshold.unwrap_or(config.color_threshold);
            let count = pipeline::count_colors(&input, threshold)?;
            println!("{count} colors (threshold {threshold})");
        }
        Commands::Overlay {
            background,
            top,
            output,
        } => {
            pipeline::overlay_images(&background, &top, &output)?;
        }
        Commands::Fit {
            input,
            output,
            size,
            white,
        } => {
            let background = if white { compose::WHITE } else { compose::CLEAR };
            pipeline::fit_image(&input, &output, size.unwrap_or(config.tile_size), background)?;
        }
        Commands::Canvas {
            input,
            output,
            width,
            height,
            white,
        } => {
            let background = if white { compose::WHITE } else { compose::CLEAR };
            pipeline::fit_canvas(&input, &output, UVec2::new(width, height), background)?;
        }
        Commands::Shrink {
            input,
            output,
            expanded,
        } => {
            let expanded = match expanded.as_deref() {
                Some(&[width, height]) => Some(UVec2::new(width, height)),
                Some(_) => bail!("--expanded takes a width and a height"),
                None => None,
            };
            pipeline::shrink_image(&input, &output, expanded)?;
        }
        Commands::Slice { input, out_dir } => {
            let written = pipeline::slice_image(&input, &out_dir)?;
            println!("{} tiles written to {}", written.len(), out_dir.display());
        }
    }
    return Ok(());
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;
    let config = load_config(&cli)?;
    return run(cli.command, config);
}
