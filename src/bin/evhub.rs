// Evhub CLI
// Dumps the translated event stream from every discovered input device

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use evhub_core::{
    DeviceClasses, EventHub, HubConfig, HubEvent, InMemoryProperties, NoopWakeLock, SysfsWakeLock,
    WakeLock, DEVICE_ADDED, DEVICE_REMOVED,
};

/// Input event hub monitor
#[derive(Parser, Debug)]
#[command(name = "evhub")]
#[command(about = "Discover input devices and dump their translated events", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Device directory to scan and watch (overrides the config file)
    #[arg(short, long, value_name = "DIR")]
    device_dir: Option<PathBuf>,

    /// Device names to ignore (can be used multiple times)
    #[arg(short, long, value_name = "NAME")]
    exclude: Vec<String>,

    /// Hold a kernel wake lock while events are pending
    #[arg(long)]
    wake_lock: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn print_event(hub: &EventHub, event: &HubEvent) {
    match event.kind {
        DEVICE_ADDED => {
            let name = hub.device_name(event.device_id).unwrap_or_default();
            let classes = hub
                .device_classes(event.device_id)
                .unwrap_or(DeviceClasses::NONE);
            println!(
                "device added: id=0x{:x} name={:?} classes={}",
                event.device_id, name, classes
            );
        }
        DEVICE_REMOVED => {
            println!("device removed: id=0x{:x}", event.device_id);
        }
        _ => {
            println!(
                "event: id=0x{:x} type={} scancode={} keycode={} flags=0x{:x} value={} when={}ns",
                event.device_id,
                event.kind,
                event.scancode,
                event.keycode,
                event.flags,
                event.value,
                event.when_ns
            );
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let mut config = match &args.config {
        Some(path) => HubConfig::from_file(path)?,
        None => HubConfig::default(),
    };
    if let Some(dir) = args.device_dir {
        config.device_dir = dir;
    }
    config.excluded_devices.extend(args.exclude);

    if !config.device_dir.is_dir() {
        return Err(format!("{} is not a directory", config.device_dir.display()).into());
    }

    let wake_lock: Arc<dyn WakeLock> = if args.wake_lock {
        Arc::new(SysfsWakeLock::new())
    } else {
        Arc::new(NoopWakeLock)
    };
    let hub = EventHub::new(config, wake_lock, Arc::new(InMemoryProperties::new()));

    loop {
        let event = hub.next_event();
        print_event(&hub, &event);
    }
}
