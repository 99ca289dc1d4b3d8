//! KRToaster - macOS 한/영 전환 알림 팝업

#[cfg(target_os = "macos")]
fn main() {
    use krtoaster::config::{config_path, ConfigStore};
    use krtoaster::ime::{initial_label, ImeProbe};
    use krtoaster::platform::{
        event_tap::start_event_tap, input_source::TisProbe, screens::ScreenLocator, MainQueue,
    };
    use krtoaster::platform::permissions::ensure_accessibility;
    use krtoaster::ui::{
        menubar::{init_application, MenuBarApp},
        overlay::OverlayWindow,
    };
    use krtoaster::{logging, Conductor, KeyHookRegistry, PopupController};
    use std::sync::{Arc, Mutex};
    use std::thread;

    logging::init();
    log::info!("KRToaster v{} 시작", env!("CARGO_PKG_VERSION"));

    // Accessibility 권한 확인 (없으면 허용 다이얼로그)
    ensure_accessibility(true);

    let config = Arc::new(ConfigStore::open(config_path()));
    log::info!("설정 파일: {}", config.path().display());

    init_application();

    let probe = Arc::new(TisProbe);
    let popup = PopupController::new(
        Box::new(OverlayWindow::new()),
        Arc::new(MainQueue),
        Arc::clone(&config),
        Arc::new(ScreenLocator),
        initial_label(probe.probe()),
    );

    let hooks = Arc::new(KeyHookRegistry::new());
    let conductor = Conductor::new(probe, Arc::clone(&popup) as Arc<dyn krtoaster::PopupSink>)
        .start(Arc::clone(&hooks));
    let conductor = Arc::new(Mutex::new(Some(conductor)));

    // 이벤트 탭 스레드 시작
    let hooks_for_tap = Arc::clone(&hooks);
    thread::spawn(move || {
        if let Err(e) = start_event_tap(hooks_for_tap) {
            log::error!("Event tap 시작 실패: {}", e);
        }
    });

    // 종료: 훅 해제 → 워커 종료 → 팝업 정리 → 앱 종료
    let quit = {
        let popup = Arc::clone(&popup);
        move || {
            let handle = conductor.lock().unwrap_or_else(|e| e.into_inner()).take();
            if let Some(handle) = handle {
                handle.detach();
            }
            hooks.unregister_all();
            popup.shutdown();
            log::info!("KRToaster 종료");
            unsafe {
                use cocoa::appkit::NSApp;
                use cocoa::base::nil;
                use objc::{msg_send, sel, sel_impl};
                let _: () = msg_send![NSApp(), terminate: nil];
            }
        }
    };

    // 메뉴바 앱 실행 (메인 스레드에서)
    let app = MenuBarApp::new(config, Arc::new(quit));
    app.run();
}

#[cfg(not(target_os = "macos"))]
fn main() {
    krtoaster::logging::init();
    log::error!("지원하지 않는 운영체제입니다");
    eprintln!("KRToaster는 macOS에서만 실행됩니다.");
    std::process::exit(1);
}
