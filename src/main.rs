use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use bookscan::cli::{Command, DeskewArgs, DetectArgs, EnhanceArgs, MergeArgs, RotateArgs};
use bookscan::{
    apply_filter, load_image, merge_pages, order_points, rotate, save_image, Cli,
    EditSession, MergeOptions, Orientation,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Detect(args) => detect(args),
        Command::Deskew(args) => deskew(args),
        Command::Enhance(args) => enhance(args),
        Command::Rotate(args) => rotate_page(args),
        Command::Merge(args) => merge(args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bookscan={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn detect(args: DetectArgs) -> Result<()> {
    let mut session = EditSession::open(&args.input, false)
        .with_context(|| format!("Failed to open input file: {:?}", args.input))?;

    let detection = session.detect_corners(&args.detector.config());
    if !detection.found {
        warn!("No page outline found, reporting the image bounds");
    }

    // Corners go to stdout so they can be fed back through --corners
    let line = detection
        .corners
        .points()
        .iter()
        .map(|p| format!("{:.0},{:.0}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ");
    println!("{}", line);
    Ok(())
}

fn deskew(args: DeskewArgs) -> Result<()> {
    let mut session = EditSession::open(&args.input, args.enhance)
        .with_context(|| format!("Failed to open input file: {:?}", args.input))?;

    let page = match &args.corners {
        Some(corners) => {
            session.set_corners(order_points(&corners.0).context("Invalid --corners")?);
            session
                .deskewed()
                .context("Failed to deskew with the given corners")?
        }
        None => {
            let detection = session.detect_corners(&args.detector.config());
            if !detection.found {
                warn!("No page outline found, using the full frame");
            }
            debug!(corners = ?detection.corners, "Corners selected");
            session.deskewed().context("Failed to deskew page")?
        }
    };

    write(&page, &args.output.output_path(&args.input, "deskewed"))
}

fn enhance(args: EnhanceArgs) -> Result<()> {
    let img = load_image(&args.input)
        .with_context(|| format!("Failed to open input file: {:?}", args.input))?;

    let filtered = apply_filter(&img, args.filter);
    let suffix = format!("{:?}", args.filter).to_lowercase();
    write(&filtered, &args.output.output_path(&args.input, &suffix))
}

fn rotate_page(args: RotateArgs) -> Result<()> {
    let img = load_image(&args.input)
        .with_context(|| format!("Failed to open input file: {:?}", args.input))?;

    let rotated = rotate(&img, args.direction);
    write(&rotated, &args.output.output_path(&args.input, "rotated"))
}

fn merge(args: MergeArgs) -> Result<()> {
    let config = args.detector.config();
    let mut pages = Vec::with_capacity(2);
    for path in [&args.first, &args.second] {
        let mut session = EditSession::open(path, false)
            .with_context(|| format!("Failed to open input file: {:?}", path))?;
        if args.deskew {
            session.detect_corners(&config);
            let page = session
                .deskewed()
                .with_context(|| format!("Failed to deskew {:?}", path))?;
            pages.push(page);
        } else {
            pages.push(session.image().clone());
        }
    }

    let options = MergeOptions {
        orientation: if args.vertical {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        },
        overlap: args.overlap,
    };
    let merged = merge_pages(&pages[0], &pages[1], options).context("Failed to merge pages")?;
    write(&merged, &args.output.output_path(&args.first, "merged"))
}

fn write(img: &image::RgbImage, path: &std::path::Path) -> Result<()> {
    save_image(img, path).with_context(|| format!("Failed to save output: {:?}", path))?;
    info!(
        width = img.width(),
        height = img.height(),
        "Saved {}",
        path.display()
    );
    Ok(())
}
