use std::{path::PathBuf, sync::Arc};

use scaled_proto::{
    join_screen_scale_factors, parse_screen_factors, single_scale_factor, single_to_factors, ScreenScaleFactors,
};
use tracing::{debug, warn};

use crate::{
    errors::ScaleError,
    qt_theme::QtThemeWriter,
    queue::CoalescingQueue,
    session_env::clean_up_scaling_env,
    settings::SettingsStore,
};

pub const KEY_SCALE_FACTOR: &str = "scale-factor";
pub const KEY_WINDOW_SCALE: &str = "window-scale";
pub const KEY_CURSOR_SIZE: &str = "gtk-cursor-theme-size";
/// Cursor size as seen by the wrapped GNOME desktop interface settings.
pub const KEY_WRAP_CURSOR_SIZE: &str = "cursor-size";
pub const KEY_INDIVIDUAL_SCALING: &str = "individual-scaling";

const BASE_CURSOR_SIZE: f64 = 24.0;

/// Integer window scale for a fractional factor. Anything above 1.7 rounds up to 2.
pub fn window_scale_for(scale: f64) -> i32 {
    let window_scale = (((scale + 0.3) * 10.0).trunc() / 10.0) as i32;
    window_scale.max(1)
}

pub fn cursor_size_for(scale: f64) -> i32 {
    (BASE_CURSOR_SIZE * scale) as i32
}

/// Computes and persists everything that depends on the scale factor, and hands the integer
/// window scale to the boot-splash queue.
pub struct ScaleManager {
    settings: Arc<SettingsStore>,
    queue: CoalescingQueue,
    qt_theme: QtThemeWriter,
    session_env: Option<PathBuf>,
}

impl ScaleManager {
    pub fn new(
        settings: Arc<SettingsStore>,
        queue: CoalescingQueue,
        qt_theme: QtThemeWriter,
        session_env: Option<PathBuf>,
    ) -> Self {
        Self { settings, queue, qt_theme, session_env }
    }

    pub fn queue(&self) -> &CoalescingQueue {
        &self.queue
    }

    pub fn set_scale_factor(&self, scale: f64) -> Result<(), ScaleError> {
        self.set_screen_scale_factors(single_to_factors(scale), true)
    }

    /// Same as [`set_scale_factor`](Self::set_scale_factor) but observers get no started/done
    /// signals for this request.
    pub fn set_scale_factor_without_notify(&self, scale: f64) -> Result<(), ScaleError> {
        self.set_screen_scale_factors(single_to_factors(scale), false)
    }

    pub fn get_scale_factor(&self) -> Result<f64, ScaleError> {
        Ok(self.settings.get_double(KEY_SCALE_FACTOR)?.unwrap_or(1.0))
    }

    pub fn get_screen_scale_factors(&self) -> Result<ScreenScaleFactors, ScaleError> {
        let joined = self.settings.get_string(KEY_INDIVIDUAL_SCALING)?.unwrap_or_default();
        Ok(parse_screen_factors(&joined))
    }

    /// Apply per-monitor factors. The map should contain the primary monitor or the `ALL` key.
    pub fn set_screen_scale_factors(&self, factors: ScreenScaleFactors, notify: bool) -> Result<(), ScaleError> {
        debug!("set screen scale factors {:?}", factors);
        if factors.is_empty() {
            return Err(ScaleError::Validation("factors is empty".into()));
        }
        if let Some((name, value)) = factors.iter().find(|(_, v)| !(v.is_finite() && **v > 0.0)) {
            return Err(ScaleError::Validation(format!("invalid value {} for {}", value, name)));
        }

        self.apply_single_factor(single_scale_factor(&factors), notify);

        if let Err(e) = self.settings.set_string(KEY_INDIVIDUAL_SCALING, &join_screen_scale_factors(&factors)) {
            warn!("failed to save {}: {}", KEY_INDIVIDUAL_SCALING, e);
        }

        self.qt_theme.write(&factors)?;

        if let Some(path) = &self.session_env {
            if let Err(e) = clean_up_scaling_env(path) {
                warn!("failed to clean up session env {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    /// Store the single factor and its derived values, then queue the boot-splash update.
    /// Returns the window scale that was submitted.
    fn apply_single_factor(&self, scale: f64, notify: bool) -> i32 {
        debug!("set scale factor {}", scale);
        if let Err(e) = self.settings.set_double(KEY_SCALE_FACTOR, scale) {
            warn!("failed to save {}: {}", KEY_SCALE_FACTOR, e);
        }

        let window_scale = window_scale_for(scale);
        match self.settings.get_int(KEY_WINDOW_SCALE) {
            Ok(Some(old)) if old == window_scale => {}
            Ok(_) => {
                if let Err(e) = self.settings.set_int(KEY_WINDOW_SCALE, window_scale) {
                    warn!("failed to save {}: {}", KEY_WINDOW_SCALE, e);
                }
            }
            Err(e) => {
                warn!("failed to read {}: {}", KEY_WINDOW_SCALE, e);
                if let Err(e) = self.settings.set_int(KEY_WINDOW_SCALE, window_scale) {
                    warn!("failed to save {}: {}", KEY_WINDOW_SCALE, e);
                }
            }
        }

        let cursor_size = cursor_size_for(scale);
        for key in [KEY_CURSOR_SIZE, KEY_WRAP_CURSOR_SIZE] {
            if let Err(e) = self.settings.set_int(key, cursor_size) {
                warn!("failed to save {}: {}", key, e);
            }
        }

        let submission = self.queue.submit(window_scale as i64, notify);
        debug!("boot splash factor {} {:?}", window_scale, submission);
        window_scale
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use scaled_proto::ScaleSignal;

    use crate::{
        keyfile::KeyFile,
        queue::FactorBounds,
        testing::{FakeRethemer, RecordingNotifier},
    };

    struct Fixture {
        _dir: tempfile::TempDir,
        qt_path: PathBuf,
        env_path: PathBuf,
        rethemer: Arc<FakeRethemer>,
        notifier: Arc<RecordingNotifier>,
        settings: Arc<SettingsStore>,
        manager: ScaleManager,
    }

    fn fixture() -> Fixture {
        fixture_with(|_| SettingsStore::in_memory())
    }

    fn fixture_with(settings: impl FnOnce(&std::path::Path) -> SettingsStore) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let qt_path = dir.path().join("deepin").join("qt-theme.ini");
        let env_path = dir.path().join(".dde_env");
        let rethemer = Arc::new(FakeRethemer::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = Arc::new(settings(dir.path()));
        let queue = CoalescingQueue::new(rethemer.clone(), notifier.clone(), FactorBounds::default());
        let manager = ScaleManager::new(
            settings.clone(),
            queue,
            QtThemeWriter::new(&qt_path, None),
            Some(env_path.clone()),
        );
        Fixture { _dir: dir, qt_path, env_path, rethemer, notifier, settings, manager }
    }

    async fn settle(manager: &ScaleManager) {
        tokio::time::timeout(Duration::from_secs(5), manager.queue().wait_idle())
            .await
            .expect("queue did not go idle");
    }

    #[test]
    fn window_scale_rounds_from_point_seven() {
        assert_eq!(window_scale_for(1.0), 1);
        assert_eq!(window_scale_for(1.25), 1);
        assert_eq!(window_scale_for(1.5), 1);
        assert_eq!(window_scale_for(1.7), 2);
        assert_eq!(window_scale_for(1.75), 2);
        assert_eq!(window_scale_for(2.5), 2);
        assert_eq!(window_scale_for(3.0), 3);
        assert_eq!(window_scale_for(0.5), 1);
    }

    #[test]
    fn cursor_size_truncates() {
        assert_eq!(cursor_size_for(1.0), 24);
        assert_eq!(cursor_size_for(1.25), 30);
        assert_eq!(cursor_size_for(1.75), 42);
    }

    #[tokio::test]
    async fn invalid_factors_change_nothing() {
        let f = fixture();
        assert!(matches!(
            f.manager.set_screen_scale_factors(ScreenScaleFactors::new(), true),
            Err(ScaleError::Validation(_))
        ));
        assert!(matches!(
            f.manager.set_screen_scale_factors(parse_screen_factors("eDP-1=1.5;HDMI-1=0"), true),
            Err(ScaleError::Validation(_))
        ));
        assert!(matches!(f.manager.set_scale_factor(-1.0), Err(ScaleError::Validation(_))));
        assert!(matches!(f.manager.set_scale_factor(f64::NAN), Err(ScaleError::Validation(_))));

        assert_eq!(f.settings.get_double(KEY_SCALE_FACTOR).unwrap(), None);
        assert!(!f.manager.queue().status().active);
        assert!(!f.qt_path.exists());
    }

    #[tokio::test]
    async fn all_key_drives_single_factor() {
        let f = fixture();
        std::fs::write(&f.env_path, "QT_SCALE_FACTOR=2\nLANG=C\n").unwrap();

        let factors = parse_screen_factors("eDP-1=2;HDMI-1=1;ALL=1.7");
        f.manager.set_screen_scale_factors(factors.clone(), true).unwrap();
        settle(&f.manager).await;

        assert_eq!(f.settings.get_double(KEY_SCALE_FACTOR).unwrap(), Some(1.7));
        assert_eq!(f.settings.get_int(KEY_WINDOW_SCALE).unwrap(), Some(2));
        assert_eq!(f.settings.get_int(KEY_CURSOR_SIZE).unwrap(), Some(40));
        assert_eq!(f.settings.get_int(KEY_WRAP_CURSOR_SIZE).unwrap(), Some(40));
        assert_eq!(f.manager.get_screen_scale_factors().unwrap(), factors);
        assert_eq!(f.rethemer.applied(), vec![2]);
        assert_eq!(f.notifier.signals(), vec![ScaleSignal::Started, ScaleSignal::Done]);

        let kf = KeyFile::load(&f.qt_path).unwrap();
        assert_eq!(kf.get("Theme", "ScreenScaleFactors"), Some("\"ALL=1.70;HDMI-1=1.00;eDP-1=2.00\""));
        assert_eq!(std::fs::read_to_string(&f.env_path).unwrap(), "LANG=C\n");
    }

    #[tokio::test]
    async fn small_factor_clamps_to_one() {
        let f = fixture();
        f.manager.set_scale_factor(0.5).unwrap();
        settle(&f.manager).await;

        assert_eq!(f.settings.get_int(KEY_WINDOW_SCALE).unwrap(), Some(1));
        assert_eq!(f.rethemer.applied(), vec![1]);
        assert_eq!(f.manager.get_scale_factor().unwrap(), 0.5);
    }

    #[tokio::test]
    async fn without_notify_emits_no_signals() {
        let f = fixture();
        f.manager.set_scale_factor_without_notify(2.0).unwrap();
        settle(&f.manager).await;

        assert_eq!(f.rethemer.applied(), vec![2]);
        assert!(f.notifier.signals().is_empty());
        assert_eq!(f.manager.get_screen_scale_factors().unwrap(), single_to_factors(2.0));
    }

    #[tokio::test]
    async fn unwritable_settings_still_queue_boot_splash() {
        let f = fixture_with(|dir| {
            let path = dir.join("settings.json");
            let store = SettingsStore::open(&path).unwrap();
            // the temp file can't be created, so every write fails
            std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
            store
        });

        f.manager.set_scale_factor(2.0).unwrap();
        settle(&f.manager).await;

        assert_eq!(f.rethemer.applied(), vec![2]);
        assert_eq!(f.notifier.signals(), vec![ScaleSignal::Started, ScaleSignal::Done]);
        assert_eq!(f.settings.get_double(KEY_SCALE_FACTOR).unwrap(), None);
        assert_eq!(f.settings.get_int(KEY_WINDOW_SCALE).unwrap(), None);
        assert!(f.qt_path.exists());
    }

    #[tokio::test]
    async fn unchanged_window_scale_is_not_rewritten() {
        let f = fixture();
        f.settings.set_int(KEY_WINDOW_SCALE, 2).unwrap();
        let mut changes = f.settings.subscribe();

        f.manager.set_scale_factor(1.75).unwrap();
        settle(&f.manager).await;

        let mut written = Vec::new();
        while let Ok(key) = changes.try_recv() {
            written.push(key);
        }
        assert_eq!(
            written,
            vec![KEY_SCALE_FACTOR, KEY_CURSOR_SIZE, KEY_WRAP_CURSOR_SIZE, KEY_INDIVIDUAL_SCALING]
        );
        assert_eq!(f.rethemer.applied(), vec![2]);

        f.manager.set_scale_factor(1.0).unwrap();
        settle(&f.manager).await;
        assert_eq!(changes.try_recv().unwrap(), KEY_SCALE_FACTOR);
        assert_eq!(changes.try_recv().unwrap(), KEY_WINDOW_SCALE);
        assert_eq!(f.settings.get_int(KEY_WINDOW_SCALE).unwrap(), Some(1));
    }

    #[test]
    fn default_scale_factor_is_one() {
        let f = fixture();
        assert_eq!(f.manager.get_scale_factor().unwrap(), 1.0);
        assert!(f.manager.get_screen_scale_factors().unwrap().is_empty());
    }
}
