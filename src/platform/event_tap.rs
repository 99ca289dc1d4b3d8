//! CGEventTap을 사용한 전역 키 이벤트 감지
//!
//! 탭은 이벤트를 가로채지 않고(listen only) 등록부에 넘기기만 한다.

use crate::hook::{keycode, KeyEvent, KeyHookRegistry, KeyKind};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventType, EventField,
};
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

extern "C" {
    /// macOS CoreGraphics: 이벤트 탭 활성화/비활성화
    fn CGEventTapEnable(tap: *mut std::ffi::c_void, enable: bool);
}

/// CGEventTap mach port (이벤트 탭 재활성화용)
static TAP_PORT: AtomicPtr<std::ffi::c_void> = AtomicPtr::new(std::ptr::null_mut());

/// 비활성화된 이벤트 탭 재활성화
fn reenable_tap() {
    let port = TAP_PORT.load(Ordering::SeqCst);
    if !port.is_null() {
        unsafe {
            CGEventTapEnable(port, true);
        }
        log::warn!("이벤트 탭 재활성화됨");
    }
}

/// 수정키 FlagsChanged 이벤트가 눌림인지 뗌인지 판단
///
/// Caps Lock은 한/영 전환 키로 쓰이면 플래그가 토글되지 않을 수 있어 항상 눌림으로 본다.
fn modifier_kind(code: u16, flags: CGEventFlags) -> KeyKind {
    let held = match code {
        keycode::CAPS_LOCK => true,
        keycode::LEFT_OPTION | keycode::RIGHT_OPTION => {
            flags.contains(CGEventFlags::CGEventFlagAlternate)
        }
        keycode::LEFT_COMMAND | keycode::RIGHT_COMMAND => {
            flags.contains(CGEventFlags::CGEventFlagCommand)
        }
        keycode::LEFT_SHIFT | keycode::RIGHT_SHIFT => flags.contains(CGEventFlags::CGEventFlagShift),
        keycode::LEFT_CONTROL | keycode::RIGHT_CONTROL => {
            flags.contains(CGEventFlags::CGEventFlagControl)
        }
        _ => false,
    };
    if held {
        KeyKind::Down
    } else {
        KeyKind::Up
    }
}

/// 이벤트 탭 시작. 현재 스레드의 런루프를 돌리므로 반환하지 않음 (실패 시 에러 메시지)
pub fn start_event_tap(registry: Arc<KeyHookRegistry>) -> Result<(), String> {
    let registry_for_tap = Arc::clone(&registry);

    let tap = CGEventTap::new(
        CGEventTapLocation::HID,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![
            CGEventType::KeyDown,
            CGEventType::KeyUp,
            CGEventType::FlagsChanged,
        ],
        move |_proxy, event_type, event| {
            handle_event(&registry_for_tap, event_type, event);
            Some(event.clone())
        },
    )
    .map_err(|_| "CGEventTap 생성 실패. Accessibility 권한을 확인하세요.")?;

    // mach port 포인터 저장 (TapDisabledByTimeout 시 재활성화용)
    use core_foundation::base::TCFType;
    TAP_PORT.store(
        tap.mach_port.as_concrete_TypeRef() as *mut std::ffi::c_void,
        Ordering::SeqCst,
    );

    unsafe {
        let loop_source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|_| "RunLoop source 생성 실패")?;

        CFRunLoop::get_current().add_source(&loop_source, kCFRunLoopCommonModes);

        tap.enable();

        log::info!("Event tap 시작됨");

        // 런루프 실행 (블로킹)
        CFRunLoop::run_current();
    }

    TAP_PORT.store(std::ptr::null_mut(), Ordering::SeqCst);
    Ok(())
}

/// 이벤트 처리
fn handle_event(registry: &KeyHookRegistry, event_type: CGEventType, event: &CGEvent) {
    // macOS가 이벤트 탭을 비활성화했으면 즉시 재활성화
    if matches!(
        event_type,
        CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput
    ) {
        log::warn!("이벤트 탭 비활성화 감지: {:?}", event_type);
        reenable_tap();
        return;
    }

    let code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
    if !registry.watches(code) {
        return;
    }

    let kind = match event_type {
        CGEventType::KeyDown => KeyKind::Down,
        CGEventType::KeyUp => KeyKind::Up,
        CGEventType::FlagsChanged => modifier_kind(code, event.get_flags()),
        _ => return,
    };

    // 키 반복(auto-repeat)은 무시
    if matches!(event_type, CGEventType::KeyDown)
        && event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0
    {
        return;
    }

    let key_event = KeyEvent::new(code, kind);
    log::debug!("{:?} {} ({})", key_event.kind, key_event.name, key_event.scan_code);
    registry.dispatch(&key_event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_flags() {
        assert_eq!(
            modifier_kind(keycode::RIGHT_OPTION, CGEventFlags::CGEventFlagAlternate),
            KeyKind::Down
        );
        assert_eq!(
            modifier_kind(keycode::RIGHT_OPTION, CGEventFlags::CGEventFlagNull),
            KeyKind::Up
        );
    }

    #[test]
    fn test_caps_lock_always_down() {
        assert_eq!(
            modifier_kind(keycode::CAPS_LOCK, CGEventFlags::CGEventFlagNull),
            KeyKind::Down
        );
        assert_eq!(
            modifier_kind(keycode::CAPS_LOCK, CGEventFlags::CGEventFlagAlphaShift),
            KeyKind::Down
        );
    }
}
