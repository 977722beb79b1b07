use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use updatr::config::{CollectionPaths, ServiceConfig};
use updatr::pacing::FixedDelay;
use updatr::pipeline::{Collection, Command, Updatr};
use updatr::remote::{FlickrConnector, Remote};

#[derive(Parser, Debug)]
#[command(
    name = "updatr",
    version,
    about = "Keep a photo collection's EXIF/IPTC metadata and its Flickr albums in sync"
)]
struct Cli {
    /// Collection to work on, optionally narrowed to one photo: source[:name]
    #[arg(value_name = "TARGET")]
    target: String,

    /// What to do
    #[arg(value_enum, default_value_t = Action::Sync)]
    action: Action,

    /// `force` for importmeta/exportmetafull/sync, `full` for exportmeta,
    /// comma-separated album titles for albumsort/albumsync
    #[arg(value_name = "FLAG")]
    flag: Option<String>,

    /// Directory holding the collections (default: ~/Dropbox)
    #[arg(long, value_name = "DIR")]
    base: Option<PathBuf>,

    /// Directory for flickr.yaml, exports and sync markers
    #[arg(long, value_name = "DIR", default_value = "_local")]
    local: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Importmeta,
    Exportmeta,
    Exportmetafull,
    Sync,
    Albumsort,
    Albumsync,
}

fn expect_flag(flag: Option<&str>, allowed: &str, action: Action) -> Result<bool> {
    match flag {
        None => Ok(false),
        Some(f) if f == allowed => Ok(true),
        Some(f) => anyhow::bail!("Unknown flag {f:?} for {action:?}, expected {allowed:?}"),
    }
}

fn album_list(flag: Option<&str>, action: Action) -> Result<Option<Vec<String>>> {
    let Some(f) = flag else {
        return Ok(None);
    };
    if f == "force" || f == "full" {
        anyhow::bail!("Flag {f:?} is not allowed for {action:?}, expected a comma-separated album list");
    }
    Ok(Some(
        f.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    ))
}

fn resolve(action: Action, flag: Option<&str>) -> Result<Command> {
    Ok(match action {
        Action::Importmeta => Command::ImportMeta { force: expect_flag(flag, "force", action)? },
        Action::Exportmeta => Command::ExportMeta { full: expect_flag(flag, "full", action)? },
        Action::Exportmetafull => Command::ExportMetaFull { force: expect_flag(flag, "force", action)? },
        Action::Sync => Command::Sync { force: expect_flag(flag, "force", action)? },
        Action::Albumsort => Command::AlbumSort { albums: album_list(flag, action)? },
        Action::Albumsync => Command::AlbumSync { albums: album_list(flag, action)? },
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let command = resolve(cli.action, cli.flag.as_deref())?;

    let (source, name) = match cli.target.split_once(':') {
        Some((source, name)) => (source, Some(name).filter(|n| !n.is_empty())),
        None => (cli.target.as_str(), None),
    };
    let base = match cli.base {
        Some(base) => base,
        None => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory, pass --base"))?
            .join("Dropbox"),
    };
    let paths = CollectionPaths::new(&base, &cli.local, source);

    let collection = Collection::open(paths.clone(), name)?;
    let mut updatr = Updatr::new(collection)?;
    if command.needs_remote() {
        let service = ServiceConfig::load(&paths.service_config_file())?;
        let pacing = Arc::new(FixedDelay::from_config(&service.pacing));
        let attempts = service.pacing.settle_attempts;
        let remote = Remote::new(Box::new(FlickrConnector::new(service)), pacing);
        updatr = updatr.with_remote(remote, attempts);
    }

    let report = updatr.run(&command).await?;
    print!("{report}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_resolve_per_action() {
        assert_eq!(resolve(Action::Sync, None).unwrap(), Command::Sync { force: false });
        assert_eq!(resolve(Action::Exportmeta, Some("full")).unwrap(), Command::ExportMeta { full: true });
        assert!(resolve(Action::Importmeta, Some("full")).is_err());
        assert_eq!(
            resolve(Action::Albumsync, Some("sunset, beach,")).unwrap(),
            Command::AlbumSync { albums: Some(vec!["sunset".into(), "beach".into()]) }
        );
    }

    #[test]
    fn album_commands_reject_mode_flags() {
        assert!(resolve(Action::Albumsync, Some("force")).is_err());
        assert!(resolve(Action::Albumsort, Some("full")).is_err());
        assert_eq!(resolve(Action::Albumsort, None).unwrap(), Command::AlbumSort { albums: None });
    }

    #[test]
    fn parses_target_and_defaults() {
        let cli = Cli::try_parse_from(["updatr", "nha:p1"]).unwrap();
        assert_eq!(cli.target, "nha:p1");
        assert_eq!(cli.action, Action::Sync);
        assert_eq!(cli.local, PathBuf::from("_local"));

        let cli = Cli::try_parse_from(["updatr", "nha", "albumsort", "sunset"]).unwrap();
        assert_eq!(cli.action, Action::Albumsort);
        assert_eq!(cli.flag.as_deref(), Some("sunset"));
    }
}
