use std::{ffi::OsString, io::stdout, path::PathBuf, str::FromStr, sync::Arc};

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use videodecode::{
    DecodeArguments, DecodeDriver, DecodeSummary, FfmpegLogLevel, ProgressCallback, ProgressInfo,
};

const CLI_AFTER_HELP: &str = "Examples:\n  videodecode -i input.mp4\n  videodecode -i input.mp4 -o frames.yuv -m 2 --resize_dim 640 360\n  videodecode -i input.mp4 -s 120 -sm 0 --progress\n  videodecode -i input.mp4 -o frames.rgb --rgb\n  videodecode --completions zsh > _videodecode";

/// Frames between progress bar updates.
const PROGRESS_INTERVAL: u64 = 10;

#[derive(Debug, Parser)]
#[command(
    name = "videodecode",
    version,
    about = "Decode the video stream of a media file and report decode throughput",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Input media file.
    #[arg(short, long, required_unless_present = "completions")]
    input: Option<PathBuf>,

    /// Output raw-frame file. Without it, frames are decoded and discarded.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Decode device index.
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    device: i32,

    /// Output surface memory: 0 internal, 1 device copied, 2 host copied, 3 not mapped.
    #[arg(short, long = "mem_type", default_value_t = 1, allow_negative_numbers = true)]
    mem_type: i64,

    /// Crop rectangle (left, top, right, bottom).
    #[arg(
        long,
        visible_alias = "crop_rect",
        num_args = 4,
        value_names = ["LEFT", "TOP", "RIGHT", "BOTTOM"],
        allow_negative_numbers = true
    )]
    crop: Option<Vec<i64>>,

    /// Seek target before decoding; -1 disables seeking.
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    seek: i64,

    /// Seek mode: 0 exact frame, 1 previous key frame.
    #[arg(long = "seek_mode", default_value_t = 1, allow_negative_numbers = true)]
    seek_mode: i64,

    /// Seek criteria: 0 frame number, 1 time stamp in seconds.
    #[arg(long = "seek_criteria", default_value_t = 0, allow_negative_numbers = true)]
    seek_criteria: i64,

    /// Width and height of resized frames; 0 0 disables resizing.
    #[arg(long = "resize_dim", num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    resize_dim: Option<Vec<u32>>,

    /// Convert output frames to packed RGB24.
    #[arg(long)]
    rgb: bool,

    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<String>,

    /// Show a progress bar while decoding.
    #[arg(long)]
    progress: bool,

    /// Print the decode summary as JSON.
    #[arg(long)]
    json: bool,

    /// Print a shell completion script and exit.
    #[arg(long, value_enum)]
    completions: Option<Shell>,
}

impl Cli {
    fn decode_arguments(
        &self,
        input: PathBuf,
    ) -> Result<DecodeArguments, Box<dyn std::error::Error>> {
        let crop = match &self.crop {
            Some(values) => Some(
                <[i64; 4]>::try_from(values.as_slice())
                    .map_err(|_| format!("--crop takes 4 values, got {}", values.len()))?,
            ),
            None => None,
        };
        let resize = match &self.resize_dim {
            Some(values) => Some(
                <[u32; 2]>::try_from(values.as_slice())
                    .map_err(|_| format!("--resize_dim takes 2 values, got {}", values.len()))?,
            ),
            None => None,
        };

        let mut arguments = DecodeArguments::new(input);
        arguments.output = self.output.clone();
        arguments.device = self.device;
        arguments.mem_type = self.mem_type;
        arguments.crop = crop;
        arguments.seek = self.seek;
        arguments.seek_mode = self.seek_mode;
        arguments.seek_criteria = self.seek_criteria;
        arguments.resize = resize;
        arguments.rgb = self.rgb;
        Ok(arguments)
    }
}

/// Rewrite the single-dash long spellings (`-crop`, `-sm`, `-sc`, `-resize`)
/// into the long flags clap understands.
fn normalize_legacy_flags<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-crop") => OsString::from("--crop"),
            Some("-sm") => OsString::from("--seek_mode"),
            Some("-sc") => OsString::from("--seek_criteria"),
            Some("-resize") => OsString::from("--resize_dim"),
            _ => arg,
        })
        .collect()
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn apply_log_level(level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let level = match level {
        Some(name) => FfmpegLogLevel::from_str(name)
            .map_err(|error| format!("unsupported --log-level: {error}"))?,
        None => FfmpegLogLevel::for_filter(log::max_level()),
    };
    videodecode::set_ffmpeg_log_level(level);
    Ok(())
}

struct BarProgress {
    bar: ProgressBar,
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total.max(info.current));
        }
        self.bar.set_position(info.current);
        if let Some(pts) = info.current_pts {
            self.bar.set_message(format!("pts {pts}"));
        }
        if info.finished {
            self.bar.finish_with_message("done");
        }
    }
}

fn summary_json(driver: &DecodeDriver, summary: &DecodeSummary) -> serde_json::Value {
    let device = driver.device();
    let stream = driver.stream_info();
    let throughput = summary.throughput();

    json!({
        "input": driver.options().input().display().to_string(),
        "output": driver.options().output().map(|path| path.display().to_string()),
        "device": {
            "id": device.device_id,
            "name": device.device_name,
            "arch": device.arch_name,
        },
        "stream": {
            "codec": driver.codec().name(),
            "width": stream.width,
            "height": stream.height,
            "bit_depth": stream.bit_depth,
            "frames_per_second": stream.frames_per_second,
        },
        "frames_decoded": summary.frames_decoded,
        "frames_flushed": summary.frames_flushed,
        "total_frames": summary.total_frames(),
        "frames_written": summary.frames_written,
        "frames_resized": summary.frames_resized,
        "frames_converted": summary.frames_converted,
        "reconfigurations": summary.reconfigurations,
        "decode_time_ms": summary.decode_time.as_secs_f64() * 1000.0,
        "session_overhead_ms": summary.session_overhead.as_secs_f64() * 1000.0,
        "avg_ms_per_frame": throughput.map(|t| t.avg_ms_per_frame),
        "frames_per_second": throughput.map(|t| t.frames_per_second),
        "benchmark_mode": summary.benchmark_mode,
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse_from(normalize_legacy_flags(std::env::args_os()));

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "videodecode", &mut stdout());
        return Ok(());
    }

    init_logging(cli.verbose);
    apply_log_level(cli.log_level.as_deref())?;

    let input = cli.input.clone().ok_or("--input is required")?;
    let mut options = cli.decode_arguments(input)?.validate()?;

    let progress_bar = if cli.progress {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        options = options
            .with_progress(Arc::new(BarProgress { bar: bar.clone() }))
            .with_progress_interval(PROGRESS_INTERVAL);
        Some(bar)
    } else {
        None
    };

    let mut driver = DecodeDriver::open(options)?;
    let info = "info:".green().bold();

    if !cli.json {
        let device = driver.device();
        println!("{info} Input file: {}", driver.options().input().display());
        println!(
            "{info} Using device {} - {}[{}] on PCI bus {}:{}.{}",
            device.device_id,
            device.device_name,
            device.arch_name,
            device.pci_bus_id,
            device.pci_domain_id,
            device.pci_device_id
        );
        println!("{info} decoding started, please wait!");
    }

    let summary = driver.run()?;
    if let Some(bar) = &progress_bar {
        bar.finish_and_clear();
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&driver, &summary))?);
        return Ok(());
    }

    println!("{info} Total frame decoded: {}", summary.total_frames());
    match summary.throughput() {
        Some(throughput) if summary.benchmark_mode => {
            println!(
                "{info} avg decoding time per frame: {:.2} ms",
                throughput.avg_ms_per_frame
            );
            println!("{info} avg frame per second: {:.2}", throughput.frames_per_second);
        }
        _ if summary.benchmark_mode => {
            println!("{info} frame count= {}", summary.total_frames());
        }
        _ => {}
    }

    if summary.reconfigurations > 0 {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!(
                "stream reconfigured {} time(s); {} frame(s) flushed",
                summary.reconfigurations, summary.frames_flushed
            )
            .yellow()
        );
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
