use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "scaled", about = "Per-session display scale daemon")]
pub struct Opts {
    /// address to bind, e.g. 127.0.0.1:7878
    #[arg(long, default_value = "127.0.0.1:7878")]
    pub bind: String,

    /// settings store file [default: <config dir>/scaled/settings.json]
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Qt theme file [default: <config dir>/deepin/qt-theme.ini]
    #[arg(long)]
    pub qt_theme: Option<PathBuf>,

    /// where to write the greeter's copy of the Qt theme, if anywhere
    #[arg(long)]
    pub greeter_qt_theme: Option<PathBuf>,

    /// session environment file to strip Qt scaling variables from [default: ~/.dde_env]
    #[arg(long)]
    pub session_env: Option<PathBuf>,

    #[arg(long, default_value = "/etc/plymouth/plymouthd.conf")]
    pub plymouth_config: PathBuf,

    /// command used to switch the plymouth theme (called as `<cmd> -R <theme>`)
    #[arg(long, default_value = "plymouth-set-default-theme")]
    pub plymouth_command: String,

    #[arg(long, default_value_t = 1)]
    pub min_factor: u8,

    #[arg(long, default_value_t = 2)]
    pub max_factor: u8,
}

impl Opts {
    pub fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(|| config_dir().join("scaled").join("settings.json"))
    }

    pub fn qt_theme_path(&self) -> PathBuf {
        self.qt_theme
            .clone()
            .unwrap_or_else(|| config_dir().join("deepin").join("qt-theme.ini"))
    }

    pub fn session_env_path(&self) -> Option<PathBuf> {
        self.session_env
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(".dde_env")))
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".config"))
}
