use anyhow::{anyhow, bail, Context, Result};
use camera_capturer::catalog::FormatCatalog;
use camera_capturer::driver::CaptureDriver;
use camera_capturer::listener::{CaptureEvent, ChannelListener};
use camera_capturer::parameters::FlashMode;
use camera_capturer::permissions::SystemPermissions;
use camera_capturer::reporting::{ErrorReporter, LogReporter};
use camera_capturer::{CameraCapturer, CameraSource, CapturerConfig, VideoFormat};
use crossbeam_channel::RecvTimeoutError;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const USAGE: &str = "Usage: capturer-cli <command> [args]

Commands:
  list-devices [--json]
  list-formats <front|back> [--json]
  capture [front|back] [WxH@fps [FMT]] [--frames N] [--config PATH] [--json] [--torch]

Add --synthetic to use generated frames instead of a real camera.";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let config = load_config(&args)?;
    camera_capturer::init_logging_with(&config.logging.filter);

    let command = &args[1];
    match command.as_str() {
        "list-devices" => cmd_list_devices(&args),
        "list-formats" => cmd_list_formats(&args),
        "capture" => cmd_capture(&args, &config),
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn load_config(args: &[String]) -> Result<CapturerConfig> {
    let config = match flag_value(args, "--config") {
        Some(path) => CapturerConfig::load_from_file(PathBuf::from(path))?,
        None => CapturerConfig::load_or_default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[cfg(feature = "native")]
fn open_backend(args: &[String]) -> (FormatCatalog, Arc<dyn CaptureDriver>) {
    if has_flag(args, "--synthetic") {
        return synthetic_backend();
    }
    let backend = Arc::new(camera_capturer::driver::native::NativeBackend::new());
    let driver: Arc<dyn CaptureDriver> = backend.clone();
    (FormatCatalog::new(backend), driver)
}

#[cfg(not(feature = "native"))]
fn open_backend(_args: &[String]) -> (FormatCatalog, Arc<dyn CaptureDriver>) {
    synthetic_backend()
}

fn synthetic_backend() -> (FormatCatalog, Arc<dyn CaptureDriver>) {
    let backend = Arc::new(camera_capturer::driver::synthetic::SyntheticBackend::new());
    let driver: Arc<dyn CaptureDriver> = backend.clone();
    (FormatCatalog::new(backend), driver)
}

fn cmd_list_devices(args: &[String]) -> Result<()> {
    let (catalog, _) = open_backend(args);
    let devices = catalog.list_devices()?;
    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string(&devices)?);
    } else {
        for d in devices {
            println!("{}: {} ({:?}, {}°)", d.id, d.name, d.facing, d.orientation);
        }
    }
    Ok(())
}

fn cmd_list_formats(args: &[String]) -> Result<()> {
    let source: CameraSource = args
        .get(2)
        .ok_or_else(|| anyhow!("Usage: capturer-cli list-formats <front|back>"))?
        .parse()?;
    let (catalog, _) = open_backend(args);
    let formats = catalog.supported_formats(source)?;
    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string(&formats)?);
    } else {
        for f in formats {
            println!("{}", f);
        }
    }
    Ok(())
}

fn cmd_capture(args: &[String], config: &CapturerConfig) -> Result<()> {
    let mut source = None;
    let mut format: Option<VideoFormat> = None;
    let mut frames: usize = 30;
    let mut json = false;
    let mut torch = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--frames" => {
                i += 1;
                frames = args
                    .get(i)
                    .ok_or_else(|| anyhow!("--frames needs a value"))?
                    .parse()?;
            }
            "--config" => i += 1,
            "--json" => json = true,
            "--torch" => torch = true,
            "--synthetic" => {}
            arg => {
                if source.is_none() && arg.parse::<CameraSource>().is_ok() {
                    source = Some(arg.parse()?);
                } else if format.is_none() {
                    // pixel format may follow as its own argument
                    let spec = match args.get(i + 1) {
                        Some(next) if !next.starts_with("--") => {
                            i += 1;
                            format!("{} {}", arg, next)
                        }
                        _ => arg.to_string(),
                    };
                    format = Some(spec.parse()?);
                } else {
                    bail!("unexpected argument: {}", arg);
                }
            }
        }
        i += 1;
    }

    let source = match source {
        Some(source) => source,
        None => config.capture.camera_source()?,
    };
    let requested = match format {
        Some(format) => format,
        None => config.capture.requested_format()?,
    };

    let (catalog, driver) = open_backend(args);
    let format = catalog.closest_format(source, &requested)?;
    if format != requested {
        log::info!("Requested {}, negotiated {}", requested, format);
    }

    let reporter: Arc<dyn ErrorReporter> = Arc::new(LogReporter);
    let capturer =
        CameraCapturer::from_parts(source, catalog, driver, &SystemPermissions, Some(reporter));

    if torch {
        capturer.update_camera_parameters(|params| {
            if params.supports_flash() {
                params.flash_mode = Some(FlashMode::Torch);
            }
        });
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    let (listener, events) = ChannelListener::new(config.delivery.channel_capacity);
    capturer.start_capture(format, listener.clone());

    let mut received = 0;
    while received < frames && !stop.load(Ordering::SeqCst) {
        match events.recv_timeout(Duration::from_millis(200)) {
            Ok(CaptureEvent::Started(true)) => {
                if !json {
                    println!("Capturing {} from {} camera", format, source);
                }
            }
            Ok(CaptureEvent::Started(false)) => bail!("capturer failed to start"),
            Ok(CaptureEvent::Frame(frame)) => {
                received += 1;
                if json {
                    println!("{}", serde_json::to_string(&frame)?);
                } else {
                    println!(
                        "Frame: {} {} {}° ts:{}ns",
                        frame.dimensions,
                        frame.pixel_format,
                        frame.rotation.degrees(),
                        frame.timestamp_ns
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let stats = capturer.stats();
    capturer.stop_capture();

    if json {
        println!("{}", serde_json::to_string(&stats)?);
    } else {
        println!(
            "Received {} frames ({} dropped by listener)",
            received,
            listener.dropped_frames()
        );
    }
    Ok(())
}
