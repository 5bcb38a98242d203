use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate::{
    augment, capture,
    config::{self, Config},
    control::Controller,
    preview::{Overlay, PreviewWindow},
    recognize, train, Camera, Error, YuNetDetector,
};
use log::info;

#[derive(Parser)]
#[command(name = "facegate")]
#[command(
    version,
    about = "Webcam face enrollment and recognition driving a serial door controller"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture face samples from the camera
    Capture,
    /// Add rotated, brightened and mirrored copies of the captured samples
    Augment,
    /// Train the recognizer on the enrolled samples
    Train,
    /// Recognize faces live and drive the door controller
    Recognize,
    /// Print the effective configuration
    Config {
        /// Write it to the configuration file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;

    match cli.command {
        Commands::Capture => run_capture(&cfg),
        Commands::Augment => augment::run(&cfg).map(|_| ()),
        Commands::Train => train::run(&cfg).map(|_| ()),
        Commands::Recognize => run_recognize(&cfg),
        Commands::Config { write } => show_config(&cfg, write),
    }
}

fn open_camera(cfg: &Config) -> Result<Camera> {
    info!("Opening camera: {}", cfg.camera);
    Camera::open(&cfg.camera).with_context(|| Error::CameraUnavailable {
        device: cfg.camera.clone(),
    })
}

fn load_detector(cfg: &Config) -> Result<YuNetDetector> {
    YuNetDetector::load(
        &cfg.detector_model,
        cfg.detection.score_threshold,
        cfg.detection.nms_threshold,
    )
    .context("Failed to initialize face detector")
}

fn run_capture(cfg: &Config) -> Result<()> {
    let mut camera = open_camera(cfg)?;
    let mut detector = load_detector(cfg)?;
    let mut window = PreviewWindow::new("Collecting Images");
    let overlay = Overlay::new();

    let summary = capture::run(cfg, &mut camera, &mut detector, &mut window, &overlay)?;
    info!(
        "Capture finished: {} samples saved over {} frames",
        summary.saved.len(),
        summary.frames
    );
    Ok(())
}

fn run_recognize(cfg: &Config) -> Result<()> {
    let (recognizer, expected_name) = recognize::load_artifacts(cfg)?;
    info!(
        "Loaded model with {} samples, expecting {}",
        recognizer.len(),
        expected_name
    );

    let mut controller = Controller::connect(&cfg.serial);
    let mut camera = open_camera(cfg)?;
    let mut detector = load_detector(cfg)?;
    let mut window = PreviewWindow::new("Face Recognition & Control");
    let overlay = Overlay::with_font(cfg.font.as_deref());

    let summary = recognize::run(
        cfg,
        &mut camera,
        &mut detector,
        &recognizer,
        &expected_name,
        &mut window,
        &overlay,
        &mut controller,
    )?;
    info!(
        "Recognition stopped after {} frames, {} state changes",
        summary.frames,
        summary.transitions.len()
    );
    Ok(())
}

fn show_config(cfg: &Config, write: bool) -> Result<()> {
    print!("{}", toml::to_string_pretty(cfg)?);
    if write {
        config::save_config(cfg, None)?;
        info!("Configuration written to {}", config::CONFIG_PATH.display());
    }
    Ok(())
}
