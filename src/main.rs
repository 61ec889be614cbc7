use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use nexcast::cli::Args;
use nexcast::config::EngineConfig;
use nexcast::core::controller::{PlaybackState, TimelineController};
use nexcast::core::loader::{fetch_manifest, FsLoader, HttpLoader, MediaLoader};
use nexcast::core::manifest::{Manifest, RawManifest};
use nexcast::core::mixer::Track;
use nexcast::ui::{self, Gesture, UiState};

fn init_logging(args: &Args) {
    // Determine log level based on verbosity flags
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("nexcast.log"));

        let file = std::fs::File::create(&log_path).expect("Failed to create log file");

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("ureq", log::LevelFilter::Warn) // Suppress ureq chatter
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!(
            "Logging to file: {} (level: {:?})",
            log_path.display(),
            log_level
        );
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("ureq", log::LevelFilter::Warn)
            .format_timestamp_millis()
            .init();
    }
}

/// Build a session from either a manifest file or the broadcast server.
fn load_session(args: &Args, config: &EngineConfig) -> Result<TimelineController> {
    let raw: RawManifest = match &args.manifest {
        Some(path) => {
            info!("loading manifest: {}", path.display());
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading manifest {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing manifest {}", path.display()))?
        }
        None => {
            info!("fetching manifest from {}", args.server);
            fetch_manifest(&args.server)?
        }
    };

    let manifest = Manifest::load(raw, config.duration_tolerance_secs)?;

    let loader: Box<dyn MediaLoader> = match &args.manifest {
        Some(path) => {
            let root = args
                .media_root
                .clone()
                .or_else(|| path.parent().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("."));
            Box::new(FsLoader::new(root))
        }
        None => Box::new(HttpLoader::new(args.server.clone())),
    };

    Ok(TimelineController::new(manifest, loader, config))
}

/// Print the rundown: one row per segment with its timing.
fn print_rundown(ctrl: &TimelineController, ui_state: &UiState) {
    let view = ui::view(ctrl, ui_state, Instant::now());
    println!(
        "Programme: {} segments, {}",
        view.playlist.len(),
        ui::format_clock(view.total_duration)
    );
    for row in &view.playlist {
        println!(
            "  {:>2}  {:>6}  {:>6}  {:?}  {}",
            row.index,
            ui::format_clock(row.start_time),
            ui::format_clock(row.duration),
            row.kind,
            row.title
        );
    }
}

/// Headless transport loop: tick the engine at the frame rate and render a
/// one-line transport readout until the programme ends.
fn run(mut ctrl: TimelineController, mut ui_state: UiState, config: &EngineConfig) -> Result<()> {
    ui::apply(&mut ctrl, &mut ui_state, Gesture::Play, Instant::now());

    let mut stdout = std::io::stdout();
    loop {
        let now = Instant::now();
        ctrl.tick(now);

        let view = ui::view(&ctrl, &ui_state, now);
        let title = view.segment_title.as_deref().unwrap_or("-");
        print!(
            "\r{:<7} {}  [{:>3.0}%]  {:<40}",
            format!("{:?}", view.state),
            view.clock_text,
            view.progress * 100.0,
            title
        );
        if let Some(stats) = view.debug {
            print!(
                "  ticks={} trans={} degraded={} drift={}",
                stats.ticks, stats.transitions, stats.degraded, stats.drift_corrections
            );
        }
        stdout.flush().ok();

        if view.state == PlaybackState::Stopped {
            println!();
            info!("programme finished");
            return Ok(());
        }

        let pace = if view.state == PlaybackState::Playing {
            config.playing_tick()
        } else {
            config.idle_tick()
        };
        thread::sleep(pace);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("nexcast starting...");
    debug!("Command-line args: {:?}", args);

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    let mut ctrl = load_session(&args, &config)?;
    let mut ui_state = UiState {
        show_debug: args.debug,
    };

    let now = Instant::now();
    for (track, percent) in [
        (Track::News, args.news_volume),
        (Track::Video, args.video_volume),
        (Track::Master, args.master_volume),
    ] {
        ui::apply(&mut ctrl, &mut ui_state, Gesture::SetVolume { track, percent }, now);
    }

    print_rundown(&ctrl, &ui_state);

    if args.autoplay {
        run(ctrl, ui_state, &config)
    } else {
        info!("no --autoplay; rundown printed, exiting");
        Ok(())
    }
}
