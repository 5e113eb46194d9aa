use std::{fs, io, path::Path};

use tracing::info;

/// Variables that used to carry scaling into the session and would now override the theme file.
pub const SCALING_ENV_KEYS: [&str; 5] = [
    "QT_SCALE_FACTOR",
    "QT_SCREEN_SCALE_FACTORS",
    "QT_AUTO_SCREEN_SCALE_FACTOR",
    "QT_FONT_DPI",
    "DEEPIN_WINE_SCALE",
];

/// Remove scaling variables from a `KEY=value` (optionally `export KEY=value`) env file.
/// A missing file is fine. Returns true if the file was rewritten.
pub fn clean_up_scaling_env(path: &Path) -> io::Result<bool> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let mut removed = Vec::new();
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| match env_key(line) {
            Some(key) if SCALING_ENV_KEYS.contains(&key) => {
                removed.push(key.to_string());
                false
            }
            _ => true,
        })
        .collect();

    if removed.is_empty() {
        return Ok(false);
    }

    let mut out = kept.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    fs::write(path, out)?;
    info!("removed {:?} from {}", removed, path.display());
    Ok(true)
}

fn env_key(line: &str) -> Option<&str> {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, _) = line.split_once('=')?;
    Some(key.trim())
}
