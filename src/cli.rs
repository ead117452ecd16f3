use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::detection::{DetectorConfig, DetectorPreset};
use crate::enhance::PageFilter;
use crate::geometry::Point;
use crate::transform::Rotation;

#[derive(Parser, Debug)]
#[command(name = "bookscan")]
#[command(version, about = "Deskew, enhance and stitch photographed book pages")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the detected page corners
    Detect(DetectArgs),
    /// Straighten a page to a head-on rectangle
    Deskew(DeskewArgs),
    /// Run a page filter
    Enhance(EnhanceArgs),
    /// Quarter-turn a page
    Rotate(RotateArgs),
    /// Join two pages into one image
    Merge(MergeArgs),
}

/// Detector selection with per-threshold overrides
#[derive(Args, Debug, Clone)]
pub struct DetectorArgs {
    /// Detector preset
    #[arg(long, value_enum, default_value_t = DetectorPreset::Enhanced)]
    pub preset: DetectorPreset,

    /// Override the working width in pixels
    #[arg(long)]
    pub working_width: Option<u32>,

    /// Override the lower Canny threshold
    #[arg(long)]
    pub canny_low: Option<f32>,

    /// Override the upper Canny threshold
    #[arg(long)]
    pub canny_high: Option<f32>,

    /// Override the minimum page area, as a fraction of the frame
    #[arg(long)]
    pub min_area: Option<f64>,
}

impl DetectorArgs {
    pub fn config(&self) -> DetectorConfig {
        let mut config = self.preset.config();
        if let Some(width) = self.working_width {
            config.working_width = width;
        }
        if let Some(low) = self.canny_low {
            config.canny_low = low;
        }
        if let Some(high) = self.canny_high {
            config.canny_high = high;
        }
        if let Some(fraction) = self.min_area {
            config.min_area_fraction = fraction;
        }
        config
    }
}

/// Where results go when `--output` is not given
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output path [default: <results-dir>/<input folder>/<stem>_<suffix>.<ext>]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Root folder for derived output names
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,
}

impl OutputArgs {
    pub fn output_path(&self, input: &Path, suffix: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output(input, suffix, &self.results_dir))
    }
}

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    #[command(flatten)]
    pub detector: DetectorArgs,
}

#[derive(Args, Debug)]
pub struct DeskewArgs {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Page corners as "x,y x,y x,y x,y" in any order [default: detected]
    #[arg(long, value_parser = parse_corners)]
    pub corners: Option<Corners>,

    #[command(flatten)]
    pub detector: DetectorArgs,

    /// Run the readability filter on the page before deskewing
    #[arg(long)]
    pub enhance: bool,
}

#[derive(Args, Debug)]
pub struct EnhanceArgs {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Filter to apply
    #[arg(short, long, value_enum, default_value_t = PageFilter::Readability)]
    pub filter: PageFilter,
}

#[derive(Args, Debug)]
pub struct RotateArgs {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Turn direction
    #[arg(short, long, value_enum)]
    pub direction: Rotation,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// First page (left or top)
    #[arg(required = true)]
    pub first: PathBuf,

    /// Second page (right or bottom)
    #[arg(required = true)]
    pub second: PathBuf,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Stack the pages instead of placing them side by side
    #[arg(long)]
    pub vertical: bool,

    /// Width of the cross-faded seam in pixels
    #[arg(long, default_value = "0")]
    pub overlap: u32,

    /// Deskew both pages with detected corners before merging
    #[arg(long)]
    pub deskew: bool,

    #[command(flatten)]
    pub detector: DetectorArgs,
}

/// Four points parsed from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct Corners(pub Vec<Point>);

/// `<results_dir>/<parent folder name>/<stem>_<suffix>.<ext>`
pub fn default_output(input: &Path, suffix: &str, results_dir: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    let folder = input
        .parent()
        .and_then(|p| p.file_name())
        .map(|name| results_dir.join(name))
        .unwrap_or_else(|| results_dir.to_path_buf());
    folder.join(format!("{}_{}.{}", stem, suffix, ext))
}

fn parse_corners(s: &str) -> Result<Corners, String> {
    let points = s
        .split_whitespace()
        .map(parse_point)
        .collect::<Result<Vec<_>, _>>()?;

    if points.len() != 4 {
        return Err(format!(
            "Expected 4 corners, got {} in '{}'",
            points.len(),
            s
        ));
    }

    Ok(Corners(points))
}

fn parse_point(s: &str) -> Result<Point, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        return Err(format!("Invalid point format '{}', expected X,Y", s));
    }

    let x: f64 = parts[0]
        .trim()
        .parse()
        .map_err(|_| format!("Invalid x value: {}", parts[0]))?;
    let y: f64 = parts[1]
        .trim()
        .parse()
        .map_err(|_| format!("Invalid y value: {}", parts[1]))?;

    if !x.is_finite() || !y.is_finite() || x < 0.0 || y < 0.0 {
        return Err(format!("Point '{}' must have non-negative coordinates", s));
    }

    Ok(Point::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_corners() {
        let corners = parse_corners("10,20 300,15 310,400 5,390").unwrap();
        assert_eq!(corners.0.len(), 4);
        assert_eq!(corners.0[2], Point::new(310.0, 400.0));
    }

    #[test]
    fn test_parse_corners_rejects_bad_input() {
        assert!(parse_corners("10,20 300,15 310,400").is_err());
        assert!(parse_corners("10,20 300,15 310,400 5;390").is_err());
        assert!(parse_corners("a,1 2,3 4,5 6,7").is_err());
        assert!(parse_corners("-1,0 2,3 4,5 6,7").is_err());
    }

    #[test]
    fn test_default_output_uses_parent_folder() {
        let out = default_output(
            Path::new("/scans/chapter1/page_03.jpg"),
            "deskewed",
            Path::new("results"),
        );
        assert_eq!(out, PathBuf::from("results/chapter1/page_03_deskewed.jpg"));
    }

    #[test]
    fn test_default_output_without_folder() {
        let out = default_output(Path::new("page.png"), "merged", Path::new("out"));
        assert_eq!(out, PathBuf::from("out/page_merged.png"));
    }

    #[test]
    fn test_explicit_output_wins() {
        let args = OutputArgs {
            output: Some(PathBuf::from("custom.png")),
            results_dir: PathBuf::from("results"),
        };
        assert_eq!(
            args.output_path(Path::new("a/b.png"), "x"),
            PathBuf::from("custom.png")
        );
    }

    #[test]
    fn test_detector_overrides() {
        let cli = Cli::parse_from([
            "bookscan",
            "detect",
            "page.jpg",
            "--preset",
            "basic",
            "--canny-low",
            "30",
            "--min-area",
            "0.3",
        ]);
        let Command::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        let config = args.detector.config();
        assert_eq!(config.working_width, 500);
        assert_eq!(config.canny_low, 30.0);
        assert_eq!(config.canny_high, 200.0);
        assert_eq!(config.min_area_fraction, 0.3);
    }

    #[test]
    fn test_verbosity_is_global() {
        let cli = Cli::parse_from(["bookscan", "rotate", "p.png", "-d", "left", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }
}
