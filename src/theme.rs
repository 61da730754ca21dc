//! Theme state shared by the whole application.
//!
//! # Usage
//!
//! ```ignore
//! let controller = ThemeController::new(store, Some(Theme::Light));
//! let subscription = controller.subscribe(|theme| println!("now {}", theme));
//! controller.toggle_theme();
//! subscription.unsubscribe();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crate::models::{Theme, ThemeState};
use crate::preferences::PreferenceStore;

/// Preference key holding the explicit theme choice
pub const THEME_STORAGE_KEY: &str = "notes:theme";

/// Theme used when neither a stored nor a system preference is known
pub const DEFAULT_THEME: Theme = Theme::Dark;

type Listener = Arc<dyn Fn(Theme) + Send + Sync>;

#[derive(Default)]
struct Registry {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// Handle returned by [`ThemeController::subscribe`].
#[must_use = "dropping the handle keeps the listener registered; call unsubscribe() to remove it"]
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
}

impl Subscription {
    /// Removes the listener. Safe to call from inside a broadcast.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .listeners
                .lock()
                .unwrap()
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// Process-wide theme state.
///
/// Created once at startup and shared by reference (`Arc`). The effective
/// theme is the stored explicit preference, else the system preference, else
/// [`DEFAULT_THEME`]. System changes are followed only while no explicit
/// preference is stored.
pub struct ThemeController {
    store: Box<dyn PreferenceStore>,
    system: Mutex<Option<Theme>>,
    current: Mutex<ThemeState>,
    registry: Arc<Registry>,
}

impl ThemeController {
    /// Resolves the initial theme from `store` and the system preference.
    pub fn new(store: Box<dyn PreferenceStore>, system: Option<Theme>) -> Arc<Self> {
        let stored = read_stored(store.as_ref());
        let current = ThemeState {
            theme: stored.or(system).unwrap_or(DEFAULT_THEME),
            explicit: stored.is_some(),
        };
        log::info!(
            "Theme initialized: {} ({})",
            current.theme,
            if current.explicit { "explicit" } else { "system" }
        );

        Arc::new(Self {
            store,
            system: Mutex::new(system),
            current: Mutex::new(current),
            registry: Arc::new(Registry::default()),
        })
    }

    /// Stored preference if present, else system preference, else the default.
    pub fn effective_theme(&self) -> Theme {
        read_stored(self.store.as_ref())
            .or(*self.system.lock().unwrap())
            .unwrap_or(DEFAULT_THEME)
    }

    /// Last applied theme and whether it was chosen explicitly.
    pub fn state(&self) -> ThemeState {
        *self.current.lock().unwrap()
    }

    /// Stores `theme` as the explicit preference, applies and broadcasts it.
    ///
    /// A failing store is logged; the theme still applies for this process.
    pub fn set_theme(&self, theme: Theme) {
        if let Err(e) = self.store.set(THEME_STORAGE_KEY, theme.as_str()) {
            log::warn!("Failed to persist theme preference: {}", e);
        }
        self.apply(ThemeState {
            theme,
            explicit: true,
        });
    }

    /// Switches to the opposite of the effective theme and returns it.
    pub fn toggle_theme(&self) -> Theme {
        let next = self.effective_theme().opposite();
        self.set_theme(next);
        next
    }

    /// Records a new system preference. Applied and broadcast only while no
    /// explicit preference is stored; never persisted.
    pub fn system_preference_changed(&self, theme: Theme) {
        *self.system.lock().unwrap() = Some(theme);
        if read_stored(self.store.as_ref()).is_some() {
            log::debug!("Ignoring system theme change to {}: explicit preference set", theme);
            return;
        }
        self.apply(ThemeState {
            theme,
            explicit: false,
        });
    }

    /// Forgets the explicit preference and goes back to following the system.
    pub fn clear_preference(&self) {
        if let Err(e) = self.store.remove(THEME_STORAGE_KEY) {
            log::warn!("Failed to clear theme preference: {}", e);
        }
        let theme = self.system.lock().unwrap().unwrap_or(DEFAULT_THEME);
        self.apply(ThemeState {
            theme,
            explicit: false,
        });
    }

    /// Registers `listener` for every broadcast. Listeners run synchronously
    /// on the thread that changed the theme, in no particular order.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Theme) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.listeners.lock().unwrap().len()
    }

    fn apply(&self, next: ThemeState) {
        *self.current.lock().unwrap() = next;
        log::debug!("Applied theme {}", next.theme);

        // Snapshot so listeners can (un)subscribe or read the controller
        let listeners: Vec<Listener> = self
            .registry
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(next.theme);
        }
    }
}

fn read_stored(store: &dyn PreferenceStore) -> Option<Theme> {
    store.get(THEME_STORAGE_KEY)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::MemoryPreferenceStore;

    fn controller(system: Option<Theme>) -> Arc<ThemeController> {
        ThemeController::new(Box::new(MemoryPreferenceStore::default()), system)
    }

    fn recorder(controller: &ThemeController) -> (Arc<Mutex<Vec<Theme>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = controller.subscribe(move |theme| sink.lock().unwrap().push(theme));
        (seen, subscription)
    }

    #[test]
    fn test_effective_theme_resolution() {
        assert_eq!(controller(Some(Theme::Light)).effective_theme(), Theme::Light);
        assert_eq!(controller(None).effective_theme(), DEFAULT_THEME);

        let store = MemoryPreferenceStore::default();
        store.set(THEME_STORAGE_KEY, "light").unwrap();
        let explicit = ThemeController::new(Box::new(store), Some(Theme::Dark));
        assert_eq!(explicit.effective_theme(), Theme::Light);
        assert!(explicit.state().explicit);
    }

    #[test]
    fn test_invalid_stored_value_is_ignored() {
        let store = MemoryPreferenceStore::default();
        store.set(THEME_STORAGE_KEY, "purple").unwrap();
        let controller = ThemeController::new(Box::new(store), Some(Theme::Light));
        assert_eq!(controller.effective_theme(), Theme::Light);
        assert!(!controller.state().explicit);
    }

    #[test]
    fn test_system_changes_follow_until_explicit() {
        let controller = controller(Some(Theme::Dark));
        let (seen, _subscription) = recorder(&controller);

        controller.system_preference_changed(Theme::Light);
        assert_eq!(controller.effective_theme(), Theme::Light);

        controller.set_theme(Theme::Light);
        controller.system_preference_changed(Theme::Dark);
        assert_eq!(controller.effective_theme(), Theme::Light);
        assert_eq!(controller.state(), ThemeState { theme: Theme::Light, explicit: true });

        controller.clear_preference();
        assert_eq!(controller.effective_theme(), Theme::Dark);
        assert!(!controller.state().explicit);

        assert_eq!(*seen.lock().unwrap(), vec![Theme::Light, Theme::Light, Theme::Dark]);
    }

    #[test]
    fn test_toggle_persists_opposite() {
        let controller = controller(Some(Theme::Dark));
        assert_eq!(controller.toggle_theme(), Theme::Light);
        assert_eq!(controller.toggle_theme(), Theme::Dark);
        assert!(controller.state().explicit);
        assert_eq!(controller.store.get(THEME_STORAGE_KEY), Some("dark".to_string()));
    }

    #[test]
    fn test_system_change_is_not_persisted() {
        let controller = controller(None);
        controller.system_preference_changed(Theme::Light);
        assert!(controller.store.get(THEME_STORAGE_KEY).is_none());
    }

    #[test]
    fn test_all_subscribers_notified_and_unsubscribe() {
        let controller = controller(None);
        let (first, first_sub) = recorder(&controller);
        let (second, _second_sub) = recorder(&controller);
        assert_eq!(controller.subscriber_count(), 2);

        controller.set_theme(Theme::Light);
        first_sub.unsubscribe();
        controller.set_theme(Theme::Dark);

        assert_eq!(*first.lock().unwrap(), vec![Theme::Light]);
        assert_eq!(*second.lock().unwrap(), vec![Theme::Light, Theme::Dark]);
        assert_eq!(controller.subscriber_count(), 1);
    }

    #[test]
    fn test_listener_may_reenter_controller() {
        let controller = controller(None);
        let inner = Arc::clone(&controller);
        let observed = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&observed);
        let _subscription = controller.subscribe(move |theme| {
            // Reading state and subscribing from inside a broadcast must not deadlock
            *sink.lock().unwrap() = Some((theme, inner.state().theme));
            inner.subscribe(|_| {}).unsubscribe();
        });

        controller.set_theme(Theme::Light);
        assert_eq!(*observed.lock().unwrap(), Some((Theme::Light, Theme::Light)));
    }
}
