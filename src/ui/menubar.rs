//! macOS 메뉴바 트레이 (NSStatusBar)
//!
//! 설정 그룹마다 서브메뉴를 두고, 현재 값에 체크 표시를 한다.
#![allow(deprecated)] // cocoa 크레이트 deprecated API 사용

use crate::config::ConfigStore;
use crate::tray::{self, MenuGroup, TrayAction, QUIT_TITLE, RELOAD_TITLE};
use cocoa::appkit::{
    NSApp, NSApplication, NSApplicationActivationPolicyAccessory, NSMenu, NSMenuItem, NSStatusBar,
    NSStatusItem, NSVariableStatusItemLength,
};
use cocoa::base::{id, nil, selector};
use cocoa::foundation::{NSAutoreleasePool, NSInteger, NSString};
use objc::declare::ClassDecl;
use objc::runtime::{Class, Object, Sel};
use objc::{class, msg_send, sel, sel_impl};
use std::sync::{Arc, Mutex, OnceLock};

const DELEGATE_CLASS_NAME: &str = "KRToasterMenuDelegate";
const STATUS_TITLE: &str = "가A";

/// ObjC id wrapper for Send/Sync (all access on main thread)
#[derive(Clone, Copy)]
struct SendId(id);
unsafe impl Send for SendId {}
unsafe impl Sync for SendId {}

/// 라디오 항목 하나 (그룹 번호, 그룹 내 번호, NSMenuItem)
struct RadioItem {
    group: usize,
    index: usize,
    item: SendId,
}

/// 메뉴 액션 핸들러가 참조하는 전역 상태
struct MenuState {
    /// NSMenuItem tag → 동작
    actions: Vec<TrayAction>,
    groups: Vec<MenuGroup>,
    radios: Vec<RadioItem>,
    store: Arc<ConfigStore>,
    quit: Arc<dyn Fn() + Send + Sync>,
    status_item: SendId,
    /// NSMenuItem.target은 unretained이므로 여기서 유지
    _delegate: SendId,
}

static MENU_STATE: Mutex<Option<MenuState>> = Mutex::new(None);
static DELEGATE_CLASS: OnceLock<Option<&'static Class>> = OnceLock::new();

fn lock_menu_state() -> std::sync::MutexGuard<'static, Option<MenuState>> {
    MENU_STATE.lock().unwrap_or_else(|e| e.into_inner())
}

/// 메뉴 항목 클릭 핸들러. tag로 동작을 찾는다
extern "C" fn menu_action(_this: &Object, _cmd: Sel, sender: id) {
    let tag: NSInteger = unsafe { msg_send![sender, tag] };

    // 콜백이 다시 메뉴를 건드릴 수 있으므로 잠금 밖에서 실행
    let picked = {
        let guard = lock_menu_state();
        guard.as_ref().and_then(|state| {
            let action = usize::try_from(tag).ok().and_then(|i| state.actions.get(i))?;
            Some((
                *action,
                Arc::clone(&state.store),
                Arc::clone(&state.quit),
                state.status_item,
            ))
        })
    };
    let Some((action, store, quit, status_item)) = picked else {
        log::warn!("알 수 없는 메뉴 항목: tag={}", tag);
        return;
    };

    if action == TrayAction::Quit {
        // 트레이 아이콘을 먼저 내린다
        unsafe {
            let status_bar = NSStatusBar::systemStatusBar(nil);
            let _: () = msg_send![status_bar, removeStatusItem: status_item.0];
        }
    }

    tray::dispatch(&store, action, &*quit);
    refresh_checks();
}

/// 현재 설정값에 맞춰 라디오 체크 표시 갱신
fn refresh_checks() {
    let guard = lock_menu_state();
    let Some(state) = guard.as_ref() else { return };
    let config = state.store.snapshot();
    let selected: Vec<Option<usize>> = state.groups.iter().map(|g| g.selected(&config)).collect();

    for radio in &state.radios {
        let on = selected.get(radio.group).copied().flatten() == Some(radio.index);
        let value: NSInteger = if on { 1 } else { 0 };
        unsafe {
            let _: () = msg_send![radio.item.0, setState: value];
        }
    }
}

fn delegate_class() -> Option<&'static Class> {
    *DELEGATE_CLASS.get_or_init(|| {
        let superclass = class!(NSObject);
        match ClassDecl::new(DELEGATE_CLASS_NAME, superclass) {
            Some(mut decl) => {
                unsafe {
                    decl.add_method(
                        sel!(menuAction:),
                        menu_action as extern "C" fn(&Object, Sel, id),
                    );
                }
                Some(decl.register())
            }
            // 클래스가 이미 등록됨 (재사용)
            None => Class::get(DELEGATE_CLASS_NAME),
        }
    })
}

/// NSApplication을 메뉴바 전용(Dock 아이콘 없음)으로 초기화.
/// 윈도우를 만들기 전에 메인 스레드에서 호출해야 합니다.
pub fn init_application() {
    unsafe {
        let app = NSApp();
        app.setActivationPolicy_(NSApplicationActivationPolicyAccessory);
    }
}

/// 메뉴바 앱
pub struct MenuBarApp {
    _status_item: SendId,
}

impl MenuBarApp {
    /// 새 메뉴바 앱 생성. `quit`은 종료 메뉴에서 호출됨
    pub fn new(store: Arc<ConfigStore>, quit: Arc<dyn Fn() + Send + Sync>) -> Self {
        unsafe {
            let _pool = NSAutoreleasePool::new(nil);

            let status_bar = NSStatusBar::systemStatusBar(nil);
            let status_item = status_bar.statusItemWithLength_(NSVariableStatusItemLength);
            let title = NSString::alloc(nil).init_str(STATUS_TITLE);
            let _: () = msg_send![status_item, setTitle: title];

            let delegate: id = match delegate_class() {
                Some(class) => msg_send![class, new],
                None => {
                    log::error!("{} 클래스 등록 실패, 메뉴 동작 없음", DELEGATE_CLASS_NAME);
                    nil
                }
            };

            let menu = NSMenu::new(nil).autorelease();
            let groups = tray::menu_groups();
            let config = store.snapshot();
            let mut actions = Vec::new();
            let mut radios = Vec::new();

            for (g, group) in groups.iter().enumerate() {
                let submenu = NSMenu::new(nil).autorelease();
                let selected = group.selected(&config);

                for (i, choice) in group.choices.iter().enumerate() {
                    let Some(action) = group.action(i) else { continue };
                    let item = action_item(choice.title, delegate, actions.len());
                    actions.push(action);

                    let value: NSInteger = if selected == Some(i) { 1 } else { 0 };
                    let _: () = msg_send![item, setState: value];
                    submenu.addItem_(item);
                    radios.push(RadioItem {
                        group: g,
                        index: i,
                        item: SendId(item),
                    });
                }

                let parent = NSMenuItem::alloc(nil).initWithTitle_action_keyEquivalent_(
                    NSString::alloc(nil).init_str(group.title),
                    selector(""),
                    NSString::alloc(nil).init_str(""),
                );
                let _: () = msg_send![parent, setSubmenu: submenu];
                menu.addItem_(parent);
            }

            menu.addItem_(NSMenuItem::separatorItem(nil));

            let reload_item = action_item(RELOAD_TITLE, delegate, actions.len());
            actions.push(TrayAction::Reload);
            menu.addItem_(reload_item);

            let quit_item = action_item(QUIT_TITLE, delegate, actions.len());
            actions.push(TrayAction::Quit);
            menu.addItem_(quit_item);

            status_item.setMenu_(menu);

            *lock_menu_state() = Some(MenuState {
                actions,
                groups,
                radios,
                store,
                quit,
                status_item: SendId(status_item),
                _delegate: SendId(delegate),
            });

            log::info!("메뉴바 준비됨");
            Self {
                _status_item: SendId(status_item),
            }
        }
    }

    /// 앱 실행 (블로킹)
    pub fn run(&self) {
        unsafe {
            let app = NSApp();
            app.run();
        }
    }
}

/// menuAction: 셀렉터로 연결된 메뉴 항목 (tag = 동작 번호)
unsafe fn action_item(title: &str, target: id, tag: usize) -> id {
    let item = NSMenuItem::alloc(nil).initWithTitle_action_keyEquivalent_(
        NSString::alloc(nil).init_str(title),
        sel!(menuAction:),
        NSString::alloc(nil).init_str(""),
    );
    let _: () = msg_send![item, setTarget: target];
    let _: () = msg_send![item, setTag: tag as NSInteger];
    item
}
