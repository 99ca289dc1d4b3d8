//! 모니터 영역 조회 (NSScreen) 및 커서/활성 윈도우 위치
//!
//! 좌표는 모두 주 모니터 좌상단 원점(Quartz 전역 좌표)으로 맞춘다.

#![allow(deprecated)]

use crate::config::MonitorConf;
use crate::layout::{monitor_at, MonitorArea, MonitorLocator, Rect};
use cocoa::base::{id, nil};
use cocoa::foundation::NSRect;
use objc::{class, msg_send, sel, sel_impl};
use std::ffi::c_void;
use std::ptr;

// AXUIElement 타입
type AXUIElementRef = *mut c_void;
type AXError = i32;
type AXValueRef = *mut c_void;
type CFTypeRef = *mut c_void;
type CFStringRef = *const c_void;

const K_AX_ERROR_SUCCESS: AXError = 0;
const K_AX_VALUE_TYPE_CG_POINT: u32 = 1;
const K_AX_VALUE_TYPE_CG_SIZE: u32 = 2;
const K_CF_STRING_ENCODING_UTF8: u32 = 0x08000100;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct CGPoint {
    x: f64,
    y: f64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct CGSize {
    width: f64,
    height: f64,
}

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXUIElementCreateSystemWide() -> AXUIElementRef;
    fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> AXError;
    fn AXValueGetValue(value: AXValueRef, value_type: u32, value_ptr: *mut c_void) -> bool;
    fn CGEventCreate(source: *const c_void) -> *mut c_void;
    fn CGEventGetLocation(event: *const c_void) -> CGPoint;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFRelease(cf: CFTypeRef);
    fn CFStringCreateWithCString(
        allocator: *const c_void,
        c_str: *const u8,
        encoding: u32,
    ) -> CFStringRef;
}

/// CFString을 생성하는 헬퍼 (호출자가 CFRelease 해야 함)
unsafe fn cf_str(s: &str) -> CFStringRef {
    let mut bytes = s.as_bytes().to_vec();
    bytes.push(0);
    CFStringCreateWithCString(ptr::null(), bytes.as_ptr(), K_CF_STRING_ENCODING_UTF8)
}

/// AX 속성 값을 가져오는 헬퍼 (실패 시 None)
unsafe fn ax_get_attr(element: AXUIElementRef, attr_name: &str) -> Option<CFTypeRef> {
    let attr = cf_str(attr_name);
    let mut value: CFTypeRef = ptr::null_mut();
    let err = AXUIElementCopyAttributeValue(element, attr, &mut value);
    CFRelease(attr as CFTypeRef);
    if err == K_AX_ERROR_SUCCESS && !value.is_null() {
        Some(value)
    } else {
        None
    }
}

/// AXValue에서 값을 꺼내고 해제
unsafe fn take_ax_value<T: Default>(value: CFTypeRef, value_type: u32) -> Option<T> {
    let mut out = T::default();
    let ok = AXValueGetValue(value, value_type, &mut out as *mut T as *mut c_void);
    CFRelease(value);
    ok.then_some(out)
}

/// 마우스 커서 위치
pub fn mouse_position() -> Option<(f64, f64)> {
    unsafe {
        let event = CGEventCreate(ptr::null());
        if event.is_null() {
            return None;
        }
        let point = CGEventGetLocation(event);
        CFRelease(event);
        Some((point.x, point.y))
    }
}

/// 활성 앱의 포커스 윈도우 중심점
pub fn focused_window_center() -> Option<(f64, f64)> {
    unsafe {
        let system_wide = AXUIElementCreateSystemWide();
        if system_wide.is_null() {
            return None;
        }
        let app = ax_get_attr(system_wide, "AXFocusedApplication");
        CFRelease(system_wide as CFTypeRef);
        let app = app?;

        let window = ax_get_attr(app as AXUIElementRef, "AXFocusedWindow");
        CFRelease(app);
        let window = window?;

        let position = ax_get_attr(window as AXUIElementRef, "AXPosition")
            .and_then(|v| take_ax_value::<CGPoint>(v, K_AX_VALUE_TYPE_CG_POINT));
        let size = ax_get_attr(window as AXUIElementRef, "AXSize")
            .and_then(|v| take_ax_value::<CGSize>(v, K_AX_VALUE_TYPE_CG_SIZE));
        CFRelease(window);

        let position = position?;
        let size = size.unwrap_or_default();
        Some((
            position.x + size.width / 2.0,
            position.y + size.height / 2.0,
        ))
    }
}

/// 연결된 모든 모니터 (첫 번째가 주 모니터). **메인 스레드에서 호출해야 합니다.**
pub fn screen_rects() -> Vec<Rect> {
    unsafe {
        let screens: id = msg_send![class!(NSScreen), screens];
        if screens == nil {
            return Vec::new();
        }
        let count: usize = msg_send![screens, count];
        let frames: Vec<NSRect> = (0..count)
            .map(|i| {
                let screen: id = msg_send![screens, objectAtIndex: i];
                let frame: NSRect = msg_send![screen, frame];
                frame
            })
            .collect();

        let Some(primary_height) = frames.first().map(|f| f.size.height) else {
            return Vec::new();
        };
        frames
            .iter()
            .map(|f| {
                Rect::from_bottom_left(
                    f.origin.x,
                    f.origin.y,
                    f.size.width,
                    f.size.height,
                    primary_height,
                )
            })
            .collect()
    }
}

/// 주 모니터 크기 (조회 실패 시 0)
pub fn primary_screen_size() -> (i32, i32) {
    screen_rects()
        .first()
        .map(|r| (r.width(), r.height()))
        .unwrap_or((0, 0))
}

/// NSScreen 기반 모니터 조회
pub struct ScreenLocator;

impl ScreenLocator {
    fn area_at(point: Option<(f64, f64)>, what: &str) -> MonitorArea {
        let found = point.and_then(|(x, y)| monitor_at(&screen_rects(), x, y));
        match found {
            Some(rect) => MonitorArea::Bounds(rect),
            None => {
                log::warn!("{} 모니터를 찾지 못함, 전체 화면 사용", what);
                MonitorArea::FullScreen
            }
        }
    }
}

impl MonitorLocator for ScreenLocator {
    fn locate(&self, mode: MonitorConf) -> MonitorArea {
        match mode {
            MonitorConf::Primary => MonitorArea::FullScreen,
            MonitorConf::Cursor => Self::area_at(mouse_position(), "커서"),
            MonitorConf::Focused => Self::area_at(focused_window_center(), "활성 윈도우"),
        }
    }
}
