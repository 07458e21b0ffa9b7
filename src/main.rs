use clap::Parser;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{Level, debug, info};
use tuxlava::app_config::AppConfig;
use tuxlava::{Job, Request, registry};

#[derive(Parser, Debug)]
#[command(name = "tuxlava")]
#[command(about = "Compiles a test request into a LAVA job definition.", long_about = None)]
struct Cli {
    /// JSON file describing the device, images and tests.
    #[arg(required_unless_present_any = ["list_devices", "list_tests"])]
    request: Option<PathBuf>,

    /// Local tuxmake build directory providing the kernel, modules and default device.
    #[arg(long, value_name = "DIR")]
    tuxmake: Option<PathBuf>,

    /// Also render the device dictionary to this file.
    #[arg(long, value_name = "PATH")]
    device_dict_output: Option<PathBuf>,

    #[arg(long)]
    list_devices: bool,

    #[arg(long)]
    list_tests: bool,

    #[arg(long)]
    debug: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).with_writer(io::stderr).init();

    info!("🪵 Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if cli.list_devices {
        registry::devices().iter().for_each(|name| println!("{}", name));
    }
    if cli.list_tests {
        registry::tests().iter().for_each(|name| println!("{}", name));
    }
    let Some(path) = cli.request else {
        return Ok(());
    };

    let config = AppConfig::load()?;
    info!("✅  Loaded configuration");

    let mut request: Request = serde_json::from_str(&fs::read_to_string(&path)?)?;
    if cli.tuxmake.is_some() {
        request.tuxmake = cli.tuxmake;
    }
    debug!("Request: {:?}", request);

    let mut job = Job::new(request)
        .with_test_definitions(config.jobs().test_definitions())
        .with_visibility(config.jobs().default_visibility());
    print!("{}", job.render()?);

    if let Some(output) = cli.device_dict_output {
        fs::write(&output, job.render_device_dict()?)?;
        info!("💾 Wrote device dictionary to {}", output.display());
    }

    info!("🔥 {} compiled", job);
    Ok(())
}
