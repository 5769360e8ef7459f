// Shell state management
//
// StateManager wraps ShellState with thread-safe access and emits change
// events so observers (status reporters, tests) need not poll.

use crate::models::WindowId;
use indexmap::IndexMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Per-window data the shell tracks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowState {
    pub url: String,
    /// URLs navigated away from, most recent last
    pub back: Vec<String>,
    /// URLs undone by Back, most recent last
    pub forward: Vec<String>,
}

/// Application-level state touched by message handlers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShellState {
    /// Open windows in creation order
    pub windows: IndexMap<WindowId, WindowState>,
    pub next_window_id: u32,
    pub quit_requested: bool,
    pub status: String,
}

impl ShellState {
    /// Most recently opened window, the target for untargeted messages.
    pub fn last_window(&self) -> Option<WindowId> {
        self.windows.keys().next_back().copied()
    }
}

/// Change events emitted when state is modified
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateChange {
    WindowOpened { window: WindowId, url: String },

    WindowClosed { window: WindowId },

    Navigated { window: WindowId, url: String },

    StatusChanged { status: String },

    QuitRequested,
}

/// Thread-safe shell state with change broadcasting.
///
/// - [`read()`](Self::read) for inspecting state
/// - [`update()`](Self::update) for mutations with automatic event emission
/// - [`subscribe()`](Self::subscribe) for listening to changes
#[derive(Clone)]
pub struct StateManager {
    state: Arc<RwLock<ShellState>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a StateManager with a broadcast buffer of 100 events
    pub fn new() -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(ShellState::default())),
            state_tx,
        }
    }

    pub fn snapshot(&self) -> ShellState {
        self.read_guard().clone()
    }

    /// Execute a function with read access to the state
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ShellState) -> R,
    {
        f(&self.read_guard())
    }

    /// Apply `update_fn`, then emit an event for every detected change.
    ///
    /// Returns the emitted events.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut ShellState),
    {
        let changes = {
            let mut state = self.write_guard();
            let old_state = state.clone();
            update_fn(&mut state);
            Self::detect_changes(&old_state, &state)
        };

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.state_tx.send(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &ShellState, new: &ShellState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        for (window, info) in &new.windows {
            match old.windows.get(window) {
                None => changes.push(StateChange::WindowOpened {
                    window: *window,
                    url: info.url.clone(),
                }),
                Some(previous) if previous.url != info.url => {
                    changes.push(StateChange::Navigated {
                        window: *window,
                        url: info.url.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        for window in old.windows.keys() {
            if !new.windows.contains_key(window) {
                changes.push(StateChange::WindowClosed { window: *window });
            }
        }

        if old.status != new.status {
            changes.push(StateChange::StatusChanged {
                status: new.status.clone(),
            });
        }

        if !old.quit_requested && new.quit_requested {
            changes.push(StateChange::QuitRequested);
        }

        changes
    }

    // Convenience methods for common state updates

    /// Open a window showing `url`; returns its id and the emitted events.
    pub fn open_window(&self, url: &str) -> (WindowId, Vec<StateChange>) {
        let mut opened = WindowId(0);
        let changes = self.update(|state| {
            opened = WindowId(state.next_window_id);
            state.next_window_id += 1;
            state.windows.insert(
                opened,
                WindowState {
                    url: url.to_string(),
                    ..WindowState::default()
                },
            );
        });
        (opened, changes)
    }

    pub fn close_window(&self, window: WindowId) -> Vec<StateChange> {
        self.update(|state| {
            state.windows.shift_remove(&window);
        })
    }

    /// Navigate `window` to `url`, pushing the current URL on its back list.
    pub fn navigate(&self, window: WindowId, url: &str) -> Vec<StateChange> {
        self.update(|state| {
            if let Some(info) = state.windows.get_mut(&window) {
                if info.url != url {
                    let previous = std::mem::replace(&mut info.url, url.to_string());
                    info.back.push(previous);
                    info.forward.clear();
                }
            }
        })
    }

    /// Step back in `window`'s history. No-op at the start of history.
    pub fn go_back(&self, window: WindowId) -> Vec<StateChange> {
        self.update(|state| {
            if let Some(info) = state.windows.get_mut(&window) {
                if let Some(previous) = info.back.pop() {
                    let current = std::mem::replace(&mut info.url, previous);
                    info.forward.push(current);
                }
            }
        })
    }

    /// Step forward in `window`'s history. No-op at the end of history.
    pub fn go_forward(&self, window: WindowId) -> Vec<StateChange> {
        self.update(|state| {
            if let Some(info) = state.windows.get_mut(&window) {
                if let Some(next) = info.forward.pop() {
                    let current = std::mem::replace(&mut info.url, next);
                    info.back.push(current);
                }
            }
        })
    }

    pub fn set_status(&self, status: impl Into<String>) -> Vec<StateChange> {
        let status = status.into();
        self.update(|state| state.status = status)
    }

    pub fn request_quit(&self) -> Vec<StateChange> {
        self.update(|state| state.quit_requested = true)
    }

    pub fn quit_requested(&self) -> bool {
        self.read(|state| state.quit_requested)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, ShellState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, ShellState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_manager() {
        let manager = StateManager::new();
        let state = manager.snapshot();

        assert!(state.windows.is_empty());
        assert!(!state.quit_requested);
        assert_eq!(state.last_window(), None);
    }

    #[test]
    fn test_open_window_assigns_sequential_ids() {
        let manager = StateManager::new();

        let (first, changes) = manager.open_window("about:welcome");
        let (second, _) = manager.open_window("about:blank");

        assert_eq!(first, WindowId(0));
        assert_eq!(second, WindowId(1));
        assert_eq!(
            changes,
            vec![StateChange::WindowOpened {
                window: first,
                url: "about:welcome".to_string()
            }]
        );
        assert_eq!(manager.read(|s| s.last_window()), Some(second));
    }

    #[test]
    fn test_navigation_history() {
        let manager = StateManager::new();
        let (window, _) = manager.open_window("a");

        manager.navigate(window, "b");
        manager.navigate(window, "c");
        let changes = manager.go_back(window);
        assert_eq!(
            changes,
            vec![StateChange::Navigated {
                window,
                url: "b".to_string()
            }]
        );

        manager.go_forward(window);
        assert_eq!(manager.read(|s| s.windows[&window].url.clone()), "c");

        // Navigating clears the forward list
        manager.go_back(window);
        manager.navigate(window, "d");
        assert!(manager.go_forward(window).is_empty());
    }

    #[test]
    fn test_back_at_start_is_noop() {
        let manager = StateManager::new();
        let (window, _) = manager.open_window("start");
        assert!(manager.go_back(window).is_empty());
    }

    #[test]
    fn test_close_and_quit_events() {
        let manager = StateManager::new();
        let (window, _) = manager.open_window("x");

        assert_eq!(
            manager.close_window(window),
            vec![StateChange::WindowClosed { window }]
        );
        assert_eq!(manager.request_quit(), vec![StateChange::QuitRequested]);
        assert!(manager.request_quit().is_empty());
        assert!(manager.quit_requested());
    }

    #[test]
    fn test_subscribers_receive_events() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.set_status("Loading");

        let event = rx.try_recv().unwrap();
        assert_eq!(
            event,
            StateChange::StatusChanged {
                status: "Loading".to_string()
            }
        );
    }
}
