//! 전역 키 훅 등록부
//!
//! 플랫폼 이벤트 소스(CGEventTap)가 키 이벤트를 `dispatch`로 넘기면
//! 해당 키코드에 등록된 콜백을 호출한다.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// macOS 가상 키코드
pub mod keycode {
    pub const RIGHT_COMMAND: u16 = 54;
    pub const LEFT_COMMAND: u16 = 55;
    pub const LEFT_SHIFT: u16 = 56;
    pub const CAPS_LOCK: u16 = 57;
    pub const LEFT_OPTION: u16 = 58;
    pub const LEFT_CONTROL: u16 = 59;
    pub const RIGHT_SHIFT: u16 = 60;
    pub const RIGHT_OPTION: u16 = 61;
    pub const RIGHT_CONTROL: u16 = 62;
    pub const SPACE: u16 = 49;
}

/// 키코드 → 사람이 읽을 이름
pub fn key_name(code: u16) -> &'static str {
    match code {
        keycode::RIGHT_COMMAND => "right command",
        keycode::LEFT_COMMAND => "left command",
        keycode::LEFT_SHIFT => "left shift",
        keycode::CAPS_LOCK => "caps lock",
        keycode::LEFT_OPTION => "left option",
        keycode::LEFT_CONTROL => "left control",
        keycode::RIGHT_SHIFT => "right shift",
        keycode::RIGHT_OPTION => "right option",
        keycode::RIGHT_CONTROL => "right control",
        keycode::SPACE => "space",
        _ => "unknown",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Down,
    Up,
}

/// 훅 콜백에 전달되는 키 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub name: &'static str,
    pub kind: KeyKind,
    pub scan_code: u16,
}

impl KeyEvent {
    pub fn new(scan_code: u16, kind: KeyKind) -> Self {
        Self {
            name: key_name(scan_code),
            kind,
            scan_code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(u64);

type Handler = Arc<dyn Fn(&KeyEvent) + Send + Sync>;

/// 키코드별 콜백 등록부
#[derive(Default)]
pub struct KeyHookRegistry {
    next_id: AtomicU64,
    hooks: Mutex<BTreeMap<HookId, (u16, Handler)>>,
}

impl KeyHookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, key_code: u16, callback: F) -> HookId
    where
        F: Fn(&KeyEvent) + Send + Sync + 'static,
    {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, (key_code, Arc::new(callback)));
        log::info!("키 훅 등록: {} ({})", key_name(key_code), key_code);
        id
    }

    /// 등록 해제. 이미 없으면 false
    pub fn unregister(&self, id: HookId) -> bool {
        self.hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some()
    }

    pub fn unregister_all(&self) {
        let mut hooks = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
        log::info!("키 훅 {}개 해제", hooks.len());
        hooks.clear();
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 등록된 키코드인지 (이벤트 탭에서 빠르게 거르기 위함)
    pub fn watches(&self, key_code: u16) -> bool {
        self.hooks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .any(|(code, _)| *code == key_code)
    }

    /// 이벤트를 해당 키코드의 콜백에 등록 순서대로 전달. 호출된 콜백 수 반환
    pub fn dispatch(&self, event: &KeyEvent) -> usize {
        let handlers: Vec<Handler> = {
            let hooks = self.hooks.lock().unwrap_or_else(|e| e.into_inner());
            hooks
                .values()
                .filter(|(code, _)| *code == event.scan_code)
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}
