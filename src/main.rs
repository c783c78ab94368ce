mod autostart;
mod cli;
mod config;
mod daemon;
mod error;
mod index;
mod notify;
mod picker;
mod scheduler;
mod service;
mod wallpaper;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::{
    fs::OpenOptions,
    path::Path,
    process::{Command as ProcessCommand, ExitCode, Stdio},
    sync::Arc,
    thread,
    time::{Duration, SystemTime},
};
use tracing::{debug, error, info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use cli::{Command, MuralArgs, SettingsArgs};
use config::SettingsStore;
use daemon::{ControlPaths, Request};
use notify::Notifier;
use scheduler::AutoChanger;
use service::WallpaperService;

fn main() -> ExitCode {
    if let Err(err) = init_tracing() {
        eprintln!("mural: failed to initialise logging: {err}");
    }

    let args = MuralArgs::parse();
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn run(args: MuralArgs) -> Result<ExitCode> {
    let config_path = args.config.as_deref();
    let paths = ControlPaths::system();

    match args.command {
        None | Some(Command::Start) => start_daemon_service(config_path, &paths),
        Some(Command::Daemon { foreground }) => {
            if foreground {
                run_daemon_loop(config_path, &paths, false)
            } else {
                start_daemon_service(config_path, &paths)
            }
        }
        Some(Command::DaemonInternal) => run_daemon_loop(config_path, &paths, true),
        Some(Command::Change { monitor }) => change_wallpaper(config_path, &paths, monitor),
        Some(Command::Monitors) => {
            let service = open_service(config_path, notify::for_process(false))?;
            let Ok(monitors) = service.monitors() else {
                return Ok(ExitCode::FAILURE);
            };
            for (i, id) in monitors.iter().enumerate() {
                println!("Monitor #{}\t{id}", i + 1);
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::List) => {
            let service = open_service(config_path, notify::for_process(false))?;
            service.index_files();
            for file in service.files() {
                println!("{}", file.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Settings(settings)) => update_settings(config_path, &settings),
        Some(Command::About) => {
            println!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            println!("{}", env!("CARGO_PKG_DESCRIPTION"));
            Ok(ExitCode::SUCCESS)
        }
        Some(Command::Stop) => {
            if !paths.daemon_is_running() {
                println!("mural daemon is not running");
                return Ok(ExitCode::SUCCESS);
            }
            paths.send(&Request::Stop)?;
            println!("Asked mural daemon to stop");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_store(config_path: Option<&Path>, notifier: &dyn Notifier) -> Result<SettingsStore> {
    let mut store = SettingsStore::open(config_path)?;
    if let Err(err) = store.load() {
        notifier.error(&format!("{:#}", anyhow::Error::new(err)));
    }
    Ok(store)
}

fn open_service(config_path: Option<&Path>, notifier: Arc<dyn Notifier>) -> Result<WallpaperService> {
    let store = load_store(config_path, &*notifier)?;
    Ok(WallpaperService::new(
        store.settings().clone(),
        wallpaper::system(),
        notifier,
    ))
}

fn change_wallpaper(
    config_path: Option<&Path>,
    paths: &ControlPaths,
    monitor: Option<String>,
) -> Result<ExitCode> {
    if paths.daemon_is_running() {
        paths.send(&Request::Change { monitor })?;
        debug!("forwarded change request to running daemon");
        return Ok(ExitCode::SUCCESS);
    }

    let service = open_service(config_path, notify::for_process(false))?;
    service.index_files();

    let outcome = match monitor {
        Some(id) => service.set_wallpaper(&id).map(|applied| vec![applied]),
        None => service.set_wallpapers(),
    };

    match outcome {
        Ok(applied) => {
            for done in applied {
                println!("{}\t{}", done.monitor_id, done.path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

fn update_settings(config_path: Option<&Path>, args: &SettingsArgs) -> Result<ExitCode> {
    let notifier = notify::for_process(false);
    let mut store = load_store(config_path, &*notifier)?;

    if args.has_changes() {
        let next = args.apply_to(store.settings());
        store.replace(next)?;
        if let Err(err) = autostart::set_enabled(store.settings().auto_start) {
            notifier.error(&format!("{err:#}"));
        }
        println!("Saved settings to {}", store.path().display());
    }

    if args.show || !args.has_changes() {
        let mut shown = store.settings().clone();
        shown.auto_start = autostart::effective(shown.auto_start);
        println!("{}", serde_json::to_string_pretty(&shown)?);
    }

    Ok(ExitCode::SUCCESS)
}

fn start_daemon_service(config_path: Option<&Path>, paths: &ControlPaths) -> Result<ExitCode> {
    if paths.daemon_is_running() {
        println!("mural daemon already running");
        return Ok(ExitCode::SUCCESS);
    }

    let exe = std::env::current_exe()?;
    let log_out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.log)
        .with_context(|| format!("failed to open {}", paths.log.display()))?;
    let log_err = log_out.try_clone()?;

    let mut command = ProcessCommand::new(exe);
    if let Some(path) = config_path {
        command.arg("--config").arg(path);
    }
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let mut child = command
        .arg("daemon-internal")
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_out))
        .stderr(Stdio::from(log_err))
        .spawn()?;

    thread::sleep(Duration::from_millis(350));
    if let Some(status) = child.try_wait()? {
        return Err(anyhow!(
            "failed to start daemon (status: {}), see {}",
            status,
            paths.log.display()
        ));
    }

    paths.write_pid(child.id())?;
    println!(
        "Started mural daemon (pid: {}, log: {})",
        child.id(),
        paths.log.display()
    );
    Ok(ExitCode::SUCCESS)
}

enum Wake {
    ConfigChanged,
    Requests(Vec<Request>),
}

fn run_daemon_loop(config_path: Option<&Path>, paths: &ControlPaths, detached: bool) -> Result<ExitCode> {
    let _daemon_lock = paths.acquire_lock()?;

    let notifier = notify::for_process(detached);
    let mut store = load_store(config_path, &*notifier)?;
    let service = Arc::new(WallpaperService::new(
        store.settings().clone(),
        wallpaper::system(),
        Arc::clone(&notifier),
    ));

    service.index_files();
    let changer = AutoChanger::new(Arc::clone(&service));
    changer.start();

    let mut observed_config_mtime = config_file_modified_time(store.path());
    info!("mural daemon running (config: {})", store.path().display());

    'daemon: loop {
        match wait_for_request_or_config_change(paths, store.path(), &mut observed_config_mtime) {
            Wake::ConfigChanged => {
                if let Err(err) = store.load() {
                    notifier.error(&format!("{:#}", anyhow::Error::new(err)));
                    continue;
                }
                service.apply_settings(store.settings().clone());
                if service.auto_change_interval().is_some() {
                    changer.start();
                } else if changer.is_running() {
                    changer.stop();
                }
            }
            Wake::Requests(requests) => {
                for request in requests {
                    match request {
                        Request::Change { monitor: Some(id) } => {
                            let _ = service.set_wallpaper(&id);
                        }
                        Request::Change { monitor: None } => {
                            let _ = service.set_wallpapers();
                        }
                        Request::Stop => break 'daemon,
                    }
                }
            }
        }
    }

    changer.stop();
    paths.cleanup();
    info!("mural daemon stopped");
    Ok(ExitCode::SUCCESS)
}

fn wait_for_request_or_config_change(
    paths: &ControlPaths,
    config_path: &Path,
    observed_mtime: &mut Option<SystemTime>,
) -> Wake {
    let check_every = Duration::from_secs(1);

    loop {
        thread::sleep(check_every);

        let requests = paths.take_requests();
        if !requests.is_empty() {
            return Wake::Requests(requests);
        }

        let current_mtime = config_file_modified_time(config_path);
        if current_mtime != *observed_mtime {
            *observed_mtime = current_mtime;
            return Wake::ConfigChanged;
        }
    }
}

fn config_file_modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}
