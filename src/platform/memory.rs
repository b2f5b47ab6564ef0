//! In-process collaborators. Each one is a cheap `Clone` handle over shared
//! state so a caller can hand one copy to the core and keep another to
//! inspect what happened.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use crate::error::PlatformError;
use crate::platform::{
    AudioPlayer, KeyValueStore, NotificationPlatform, NotificationRequest, PlaybackOptions,
    SoundHandle,
};

#[derive(Debug)]
struct PlatformState {
    supported: bool,
    granted: bool,
    grant_on_request: bool,
    permission_requests: u32,
    failing: HashSet<String>,
    fail_all: bool,
    pending: BTreeMap<String, NotificationRequest>,
}

#[derive(Debug, Clone)]
pub struct MemoryPlatform {
    state: Rc<RefCell<PlatformState>>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::with_state(true, true, true)
    }

    pub fn unsupported() -> Self {
        Self::with_state(false, false, false)
    }

    /// Permission not yet granted; a request prompt grants it when
    /// `grant_on_request` is set.
    pub fn without_permission(grant_on_request: bool) -> Self {
        Self::with_state(true, false, grant_on_request)
    }

    fn with_state(supported: bool, granted: bool, grant_on_request: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(PlatformState {
                supported,
                granted,
                grant_on_request,
                permission_requests: 0,
                failing: HashSet::new(),
                fail_all: false,
                pending: BTreeMap::new(),
            })),
        }
    }

    pub fn set_permission(&self, granted: bool) {
        let mut state = self.state.borrow_mut();
        state.granted = granted;
        state.grant_on_request = granted;
    }

    pub fn fail_identifier(&self, identifier: &str) {
        self.state.borrow_mut().failing.insert(identifier.to_string());
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.state.borrow_mut().fail_all = fail;
    }

    pub fn permission_requests(&self) -> u32 {
        self.state.borrow().permission_requests
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.state.borrow().pending.keys().cloned().collect()
    }

    pub fn pending_request(&self, identifier: &str) -> Option<NotificationRequest> {
        self.state.borrow().pending.get(identifier).cloned()
    }

    pub fn pending_count_for(&self, alarm_id: &str) -> usize {
        self.state
            .borrow()
            .pending
            .values()
            .filter(|request| {
                request.data.get("alarmId").and_then(|id| id.as_str()) == Some(alarm_id)
            })
            .count()
    }
}

impl NotificationPlatform for MemoryPlatform {
    fn is_supported(&self) -> bool {
        self.state.borrow().supported
    }

    fn has_permission(&self) -> Result<bool, PlatformError> {
        Ok(self.state.borrow().granted)
    }

    fn request_permission(&mut self) -> Result<bool, PlatformError> {
        let mut state = self.state.borrow_mut();
        state.permission_requests += 1;
        if state.grant_on_request {
            state.granted = true;
        }
        Ok(state.granted)
    }

    fn schedule(&mut self, request: NotificationRequest) -> Result<String, PlatformError> {
        let mut state = self.state.borrow_mut();
        if !state.supported {
            return Err(PlatformError::Unsupported);
        }
        if state.fail_all || state.failing.contains(&request.identifier) {
            return Err(PlatformError::Rejected {
                identifier: request.identifier,
                reason: "scheduler refused the trigger".to_string(),
            });
        }
        let identifier = request.identifier.clone();
        state.pending.insert(identifier.clone(), request);
        Ok(identifier)
    }

    fn cancel(&mut self, identifier: &str) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        if state.fail_all {
            return Err(PlatformError::Rejected {
                identifier: identifier.to_string(),
                reason: "cancel refused".to_string(),
            });
        }
        state.pending.remove(identifier);
        Ok(())
    }

    fn pending(&self) -> Result<Vec<NotificationRequest>, PlatformError> {
        Ok(self.state.borrow().pending.values().cloned().collect())
    }
}

#[derive(Debug, Clone)]
struct LoadedSound {
    uri: String,
    playing: bool,
    options: PlaybackOptions,
}

#[derive(Debug, Default)]
struct AudioState {
    next_handle: u64,
    loaded: BTreeMap<SoundHandle, LoadedSound>,
    history: Vec<String>,
    missing: HashSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAudioPlayer {
    state: Rc<RefCell<AudioState>>,
}

impl MemoryAudioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_missing(&self, uri: &str) {
        self.state.borrow_mut().missing.insert(uri.to_string());
    }

    /// Sounds created and not yet unloaded.
    pub fn loaded_count(&self) -> usize {
        self.state.borrow().loaded.len()
    }

    pub fn playing_uris(&self) -> Vec<String> {
        self.state
            .borrow()
            .loaded
            .values()
            .filter(|sound| sound.playing)
            .map(|sound| sound.uri.clone())
            .collect()
    }

    pub fn last_options(&self) -> Option<PlaybackOptions> {
        self.state
            .borrow()
            .loaded
            .values()
            .next_back()
            .map(|sound| sound.options)
    }

    pub fn play_history(&self) -> Vec<String> {
        self.state.borrow().history.clone()
    }
}

impl AudioPlayer for MemoryAudioPlayer {
    fn play(&mut self, uri: &str, options: PlaybackOptions) -> Result<SoundHandle, PlatformError> {
        let mut state = self.state.borrow_mut();
        if state.missing.contains(uri) {
            return Err(PlatformError::AudioNotFound(uri.to_string()));
        }
        state.next_handle += 1;
        let handle = SoundHandle(state.next_handle);
        state.loaded.insert(
            handle,
            LoadedSound {
                uri: uri.to_string(),
                playing: true,
                options,
            },
        );
        state.history.push(uri.to_string());
        Ok(handle)
    }

    fn stop(&mut self, sound: SoundHandle) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        let loaded = state
            .loaded
            .get_mut(&sound)
            .ok_or(PlatformError::UnknownSound(sound.0))?;
        loaded.playing = false;
        Ok(())
    }

    fn unload(&mut self, sound: SoundHandle) -> Result<(), PlatformError> {
        self.state
            .borrow_mut()
            .loaded
            .remove(&sound)
            .map(|_| ())
            .ok_or(PlatformError::UnknownSound(sound.0))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    values: BTreeMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .state
            .borrow_mut()
            .values
            .insert(key.to_string(), value.to_string());
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.borrow_mut().fail_writes = fail;
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.state.borrow().values.get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PlatformError> {
        let state = self.state.borrow();
        if state.fail_reads {
            return Err(PlatformError::StorageUnavailable(format!("read of '{key}'")));
        }
        Ok(state.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(PlatformError::StorageUnavailable(format!("write of '{key}'")));
        }
        state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), PlatformError> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(PlatformError::StorageUnavailable(format!("remove of '{key}'")));
        }
        state.values.remove(key);
        Ok(())
    }
}
