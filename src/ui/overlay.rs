//! 한/영 팝업 오버레이 윈도우 (NSPanel)
//! 화면에 "가" / "A"를 크게 띄우고 투명도는 PopupController가 조절한다.

#![allow(deprecated)]

use crate::layout::Geometry;
use crate::platform::screens::primary_screen_size;
use crate::popup::OverlaySurface;
use cocoa::base::{id, nil, NO, YES};
use cocoa::foundation::{NSPoint, NSRect, NSSize, NSString};
use objc::{class, msg_send, sel, sel_impl};

/// ObjC id wrapper for Send (all access on main thread)
#[derive(Clone, Copy)]
struct SendId(id);
unsafe impl Send for SendId {}

/// kCGStatusWindowLevel
const STATUS_WINDOW_LEVEL: i64 = 25;
const CORNER_RADIUS: f64 = 40.0;
/// 창 높이 대비 글자 크기
const FONT_SCALE: f64 = 0.6;

/// 팝업 윈도우. **메인 스레드에서만 생성/조작해야 합니다.**
pub struct OverlayWindow {
    window: SendId,
    label: SendId,
}

impl OverlayWindow {
    pub fn new() -> Self {
        let (window, label) = create_overlay_window();
        Self {
            window: SendId(window),
            label: SendId(label),
        }
    }
}

impl Default for OverlayWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlaySurface for OverlayWindow {
    fn screen_size(&self) -> (i32, i32) {
        primary_screen_size()
    }

    fn set_geometry(&mut self, geometry: Geometry) {
        let (_, primary_height) = primary_screen_size();
        let width = geometry.width as f64;
        let height = geometry.height as f64;

        unsafe {
            // 좌상단 원점 → AppKit 좌하단 원점
            let frame = NSRect::new(
                NSPoint::new(
                    geometry.x as f64,
                    primary_height as f64 - geometry.y as f64 - height,
                ),
                NSSize::new(width, height),
            );
            let _: () = msg_send![self.window.0, setFrame: frame display: NO];

            // 라벨은 세로 가운데
            let font_size = (height * FONT_SCALE).max(1.0);
            let font: id = msg_send![class!(NSFont), boldSystemFontOfSize: font_size];
            let _: () = msg_send![self.label.0, setFont: font];
            let label_height = font_size * 1.25;
            let label_frame = NSRect::new(
                NSPoint::new(0.0, (height - label_height) / 2.0),
                NSSize::new(width, label_height),
            );
            let _: () = msg_send![self.label.0, setFrame: label_frame];
        }
    }

    fn set_label(&mut self, label: &str) {
        unsafe {
            let ns_text = NSString::alloc(nil).init_str(label);
            let _: () = msg_send![self.label.0, setStringValue: ns_text];
        }
    }

    fn set_opacity(&mut self, opacity: f64) {
        unsafe {
            let _: () = msg_send![self.window.0, setAlphaValue: opacity];
            if opacity > 0.0 {
                let _: () = msg_send![self.window.0, orderFrontRegardless];
            } else {
                let _: () = msg_send![self.window.0, orderOut: nil];
            }
        }
    }
}

/// 오버레이 윈도우와 라벨을 생성합니다.
fn create_overlay_window() -> (id, id) {
    unsafe {
        let frame = NSRect::new(NSPoint::new(0.0, 0.0), NSSize::new(1.0, 1.0));

        // NSWindowStyleMaskBorderless = 0
        let window: id = msg_send![class!(NSPanel), alloc];
        let window: id = msg_send![window,
            initWithContentRect: frame
            styleMask: 0u64
            backing: 2u64  // NSBackingStoreBuffered
            defer: NO
        ];

        let _: () = msg_send![window, setLevel: STATUS_WINDOW_LEVEL];
        let _: () = msg_send![window, setOpaque: NO];
        let _: () = msg_send![window, setHasShadow: NO];
        let _: () = msg_send![window, setIgnoresMouseEvents: YES];
        let _: () = msg_send![window, setCollectionBehavior: 1u64 << 4]; // canJoinAllSpaces
        let _: () = msg_send![window, setHidesOnDeactivate: NO];
        let _: () = msg_send![window, setAlphaValue: 0.0f64];
        let clear: id = msg_send![class!(NSColor), clearColor];
        let _: () = msg_send![window, setBackgroundColor: clear];

        // 배경: 반투명 검정 + 둥근 모서리
        let content_view: id = msg_send![window, contentView];
        let _: () = msg_send![content_view, setWantsLayer: YES];
        let layer: id = msg_send![content_view, layer];
        let bg_color: id = msg_send![class!(NSColor),
            colorWithRed: 0.0f64
            green: 0.0f64
            blue: 0.0f64
            alpha: 0.7f64
        ];
        let cg_color: *mut std::ffi::c_void = msg_send![bg_color, CGColor];
        let _: () = msg_send![layer, setBackgroundColor: cg_color];
        let _: () = msg_send![layer, setCornerRadius: CORNER_RADIUS];

        let label: id = msg_send![class!(NSTextField), alloc];
        let label: id = msg_send![label, initWithFrame: frame];
        let _: () = msg_send![label, setBezeled: NO];
        let _: () = msg_send![label, setDrawsBackground: NO];
        let _: () = msg_send![label, setEditable: NO];
        let _: () = msg_send![label, setSelectable: NO];
        let _: () = msg_send![label, setAlignment: 2u64]; // NSTextAlignmentCenter

        let white: id = msg_send![class!(NSColor), whiteColor];
        let _: () = msg_send![label, setTextColor: white];

        let _: () = msg_send![content_view, addSubview: label];

        (window, label)
    }
}
