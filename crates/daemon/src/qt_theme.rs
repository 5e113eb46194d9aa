use std::{
    fs, io,
    path::{Path, PathBuf},
};

use scaled_proto::{join_screen_scale_factors, ScreenScaleFactors};
use tracing::{debug, warn};

use crate::{errors::ScaleError, keyfile::KeyFile};

const SECTION: &str = "Theme";
const KEY_SCREEN_SCALE_FACTORS: &str = "ScreenScaleFactors";
const KEY_SCALE_FACTOR: &str = "ScaleFactor";
const KEY_SCALE_LOGICAL_DPI: &str = "ScaleLogicalDpi";

/// Writes the per-monitor factors into the Qt theme file and, optionally, the greeter's copy.
pub struct QtThemeWriter {
    path: PathBuf,
    greeter_path: Option<PathBuf>,
}

impl QtThemeWriter {
    pub fn new(path: impl Into<PathBuf>, greeter_path: Option<PathBuf>) -> Self {
        Self { path: path.into(), greeter_path }
    }

    pub fn write(&self, factors: &ScreenScaleFactors) -> Result<(), ScaleError> {
        let value = screen_scale_factors_value(factors)?;

        let mut kf = match KeyFile::load(&self.path) {
            Ok(kf) => kf,
            Err(e) if e.kind() == io::ErrorKind::NotFound => KeyFile::new(),
            Err(e) => {
                warn!("failed to load {}: {}", self.path.display(), e);
                KeyFile::new()
            }
        };
        kf.set(SECTION, KEY_SCREEN_SCALE_FACTORS, value);
        kf.remove(SECTION, KEY_SCALE_FACTOR);
        kf.set(SECTION, KEY_SCALE_LOGICAL_DPI, "-1,-1");
        save(&kf, &self.path)?;
        debug!("wrote {}", self.path.display());

        if let Some(greeter_path) = &self.greeter_path {
            // the greeter renders before any monitor DPI is known
            kf.set(SECTION, KEY_SCALE_LOGICAL_DPI, "96,96");
            save(&kf, greeter_path)?;
            debug!("wrote greeter theme {}", greeter_path.display());
        }
        Ok(())
    }
}

fn screen_scale_factors_value(factors: &ScreenScaleFactors) -> Result<String, ScaleError> {
    match factors.len() {
        0 => Err(ScaleError::Validation("factors is empty".into())),
        1 => Ok(factors.values().map(|v| format!("{:.2}", v)).collect()),
        _ => Ok(quote(&join_screen_scale_factors(factors))),
    }
}

/// Double-quote `s` the way Qt reads a quoted keyfile value back.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn save(kf: &KeyFile, path: &Path) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    kf.save(path)
}
