use std::path::{Path, PathBuf};

use clap::Parser;
use eyre::eyre;
use log::{info, warn};

use wzlstream::{
    config::{parse_config, parse_config_from_file, Config},
    open_archive, Loader, LoaderEvent, Sprite,
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct WzlStreamCli {
    /// Archive name, e.g. `hum` for hum.wzx and hum.wzl
    pub archive: String,
    /// Folder with local archive pairs
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
    /// Origin serving `data/<archive>.wzx` and `data/<archive>.wzl`
    #[arg(short, long)]
    pub base_url: Option<String>,
    /// Path to config.toml. Defaults to the one next to the binary
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Writes every sprite as <out>/<slot>.png
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Slots to load first
    #[arg(short, long)]
    pub priority: Vec<usize>,
    /// Only load requested slots right away
    #[arg(long)]
    pub on_demand: bool,
    /// Keep a copy of fetched archives in the data folder
    #[arg(long)]
    pub mirror: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CliRes {
    Ok,
    Err,
}

impl WzlStreamCli {
    /// Config file first, flags on top.
    fn config(&self) -> eyre::Result<Config> {
        let mut config = match &self.config {
            Some(path) => parse_config_from_file(path)?,
            None => parse_config()?,
        };

        if let Some(data_dir) = &self.data_dir {
            config.data_dir = Some(data_dir.clone());
        }

        if let Some(base_url) = &self.base_url {
            config.base_url = Some(base_url.clone());
        }

        config.on_demand |= self.on_demand;
        config.mirror |= self.mirror;

        if config.mirror && config.data_dir.is_none() {
            return Err(eyre!("--mirror needs a data folder"));
        }

        Ok(config)
    }
}

fn write_sprite(out: &Path, slot: usize, sprite: &Sprite) -> eyre::Result<()> {
    let image: image::RgbaImage = sprite
        .to_rgba_image()
        .ok_or_else(|| eyre!("Sprite {slot} does not match its dimensions"))?;

    image.save_with_format(out.join(format!("{slot}.png")), image::ImageFormat::Png)?;

    Ok(())
}

pub fn run(cli: WzlStreamCli) -> eyre::Result<CliRes> {
    let config = cli.config()?;
    let transport = open_archive(&config, &cli.archive)?;

    if let Some(out) = &cli.out {
        std::fs::create_dir_all(out)?;
    }

    let (mut loader, events) =
        Loader::with_channel(cli.archive.as_str(), transport, config.loader_options());

    loader.load(&cli.priority)?;

    let mut loaded = 0usize;
    let mut res = CliRes::Err;

    for event in events.iter() {
        match event {
            LoaderEvent::SpriteLoaded { slot, sprite, .. } => {
                loaded += 1;

                if let Some(out) = &cli.out {
                    // empty slots have nothing worth writing
                    if !sprite.is_empty {
                        if let Err(err) = write_sprite(out, slot, &sprite) {
                            warn!("Cannot write slot {slot}: {err}");
                        }
                    }
                }

                if loaded % 1000 == 0 {
                    info!("{loaded} slots loaded");
                }
            }
            LoaderEvent::ArchiveLoaded { archive } => {
                println!("{archive}: {loaded} slots loaded");
                res = CliRes::Ok;
                break;
            }
            LoaderEvent::ArchiveFailed { archive, reason } => {
                println!("{archive}: {reason} ({loaded} slots loaded)");
                break;
            }
        }
    }

    loader.join()?;

    Ok(res)
}

pub fn cli() -> CliRes {
    let cli = WzlStreamCli::parse();

    match run(cli) {
        Ok(res) => res,
        Err(err) => {
            println!("{}", err);
            CliRes::Err
        }
    }
}

#[cfg(test)]
mod test {
    use std::ffi::OsString;

    use super::*;

    #[test]
    fn parse_args() {
        let cli = WzlStreamCli::try_parse_from([
            "wzlstream",
            "hum",
            "--base-url",
            "http://origin",
            "-p",
            "3",
            "-p",
            "7",
            "--on-demand",
        ])
        .unwrap();

        assert_eq!(cli.archive, "hum");
        assert_eq!(cli.base_url.as_deref(), Some("http://origin"));
        assert_eq!(cli.priority, vec![3, 7]);
        assert!(cli.on_demand);
        assert!(!cli.mirror);
    }

    #[test]
    fn flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "base_url = \"http://a\"\nlocal_chunk_size = 64").unwrap();

        let args: Vec<OsString> = vec![
            "wzlstream".into(),
            "hum".into(),
            "--config".into(),
            config_path.into(),
            "--base-url".into(),
            "http://b".into(),
        ];
        let cli = WzlStreamCli::try_parse_from(args).unwrap();

        let config = cli.config().unwrap();

        assert_eq!(config.base_url.as_deref(), Some("http://b"));
        assert_eq!(config.local_chunk_size, 64);
    }

    #[test]
    fn mirror_needs_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "").unwrap();

        let mut cli = WzlStreamCli::try_parse_from(["wzlstream", "hum", "--mirror"]).unwrap();
        cli.config = Some(config_path);

        assert!(cli.config().is_err());
    }
}
