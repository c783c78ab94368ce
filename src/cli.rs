use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "mural", version, about = "Rotate desktop wallpapers across monitors")]
pub struct MuralArgs {
    #[arg(short, long, help = "Path to config JSON file (default: beside the executable)")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "Start the background daemon unless one is already running")]
    Start,

    #[command(about = "Run the daemon that rotates wallpapers on the configured interval")]
    Daemon {
        #[arg(long, help = "Stay attached to this console")]
        foreground: bool,
    },

    #[command(about = "Change wallpaper on all monitors, or on one")]
    Change {
        #[arg(long, help = "Monitor id as printed by `mural monitors`")]
        monitor: Option<String>,
    },

    #[command(about = "List attached monitors")]
    Monitors,

    #[command(about = "List indexed wallpapers")]
    List,

    #[command(about = "Show or change settings")]
    Settings(SettingsArgs),

    #[command(about = "Show program information")]
    About,

    #[command(about = "Stop a running daemon")]
    Stop,

    #[command(name = "daemon-internal", hide = true)]
    DaemonInternal,
}

#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    #[arg(long, help = "Print settings after applying changes")]
    pub show: bool,

    #[arg(long, help = "Wallpaper directory")]
    pub path: Option<PathBuf>,

    #[arg(long, conflicts_with = "path", help = "Unset the wallpaper directory")]
    pub clear_path: bool,

    #[arg(long, value_name = "LIST", help = "Semicolon-separated file patterns, e.g. \"*.jpg;*.png\"")]
    pub patterns: Option<String>,

    #[arg(long, value_name = "BOOL", help = "Get files recursively")]
    pub recursive: Option<bool>,

    #[arg(long, value_name = "BOOL", help = "Shuffle images when indexing")]
    pub shuffle: Option<bool>,

    #[arg(long, value_name = "BOOL", help = "Pick a random image on every change")]
    pub random: Option<bool>,

    #[arg(long, value_name = "MINUTES", value_parser = parse_minutes, help = "Change wallpapers every N minutes")]
    pub interval: Option<f64>,

    #[arg(long, conflicts_with = "interval", help = "Disable automatic changes")]
    pub no_interval: bool,

    #[arg(long, value_name = "BOOL", help = "Start when logging in")]
    pub autostart: Option<bool>,
}

impl SettingsArgs {
    pub fn has_changes(&self) -> bool {
        self.path.is_some()
            || self.clear_path
            || self.patterns.is_some()
            || self.recursive.is_some()
            || self.shuffle.is_some()
            || self.random.is_some()
            || self.interval.is_some()
            || self.no_interval
            || self.autostart.is_some()
    }

    pub fn apply_to(&self, current: &Settings) -> Settings {
        let mut next = current.clone();
        if let Some(path) = &self.path {
            next.wallpaper_path = Some(path.clone());
        }
        if self.clear_path {
            next.wallpaper_path = None;
        }
        if let Some(patterns) = &self.patterns {
            next.file_patterns = patterns.clone();
        }
        if let Some(recursive) = self.recursive {
            next.get_files_recursively = recursive;
        }
        if let Some(shuffle) = self.shuffle {
            next.shuffle_images = shuffle;
        }
        if let Some(random) = self.random {
            next.random_wallpaper = random;
        }
        if let Some(minutes) = self.interval {
            next.auto_change_interval = Some(minutes);
        }
        if self.no_interval {
            next.auto_change_interval = None;
        }
        if let Some(autostart) = self.autostart {
            next.auto_start = autostart;
        }
        next
    }
}

fn parse_minutes(raw: &str) -> Result<f64, String> {
    let minutes: f64 = raw.parse().map_err(|_| format!("{raw:?} is not a number"))?;
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_start() {
        let args = MuralArgs::try_parse_from(["mural"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn change_accepts_monitor_id() {
        let args = MuralArgs::try_parse_from(["mural", "change", "--monitor", "m2"]).unwrap();
        match args.command {
            Some(Command::Change { monitor }) => assert_eq!(monitor.as_deref(), Some("m2")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn settings_flags_parse() {
        let args = MuralArgs::try_parse_from([
            "mural",
            "--config",
            "x.json",
            "settings",
            "--path",
            "/walls",
            "--recursive",
            "true",
            "--interval",
            "15",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("x.json")));
        let Some(Command::Settings(settings)) = args.command else {
            panic!("expected settings");
        };
        assert_eq!(settings.path, Some(PathBuf::from("/walls")));
        assert_eq!(settings.recursive, Some(true));
        assert_eq!(settings.interval, Some(15.0));
        assert!(settings.has_changes());
    }

    #[test]
    fn flags_overwrite_only_what_they_name() {
        let current = Settings {
            wallpaper_path: Some(PathBuf::from("/old")),
            file_patterns: "*.png".to_string(),
            auto_change_interval: Some(30.0),
            shuffle_images: true,
            ..Settings::default()
        };
        let args = SettingsArgs {
            clear_path: true,
            no_interval: true,
            random: Some(true),
            ..SettingsArgs::default()
        };

        let next = args.apply_to(&current);
        assert_eq!(next.wallpaper_path, None);
        assert_eq!(next.auto_change_interval, None);
        assert!(next.random_wallpaper);
        assert!(next.shuffle_images);
        assert_eq!(next.file_patterns, "*.png");
    }

    #[test]
    fn interval_must_be_positive() {
        assert!(MuralArgs::try_parse_from(["mural", "settings", "--interval", "0"]).is_err());
        assert!(MuralArgs::try_parse_from(["mural", "settings", "--interval", "abc"]).is_err());
        assert!(
            MuralArgs::try_parse_from(["mural", "settings", "--interval", "5", "--no-interval"])
                .is_err()
        );
    }
}
