//! 입력 모드 팝업 윈도우 컨트롤러
//!
//! 상태 전이: `Hidden` → `Shown` (유지 타이머) → `FadingOut` (20ms 단위 투명도 감소) → `Hidden`.
//! 모든 상태 변경은 UI 루프 위에서만 일어난다. 다른 스레드는 [`PopupController::show`]로
//! 작업을 UI 루프에 넘긴다.
//!
//! 유지 타이머와 페이드 단계는 예약될 때의 generation을 들고 있다가, 실행 시점에
//! generation이 바뀌었으면 (새 trigger가 들어왔으면) 아무것도 쓰지 않고 끝난다.

use crate::config::{ConfigStore, Field, SubscriptionId};
use crate::layout::{compute_geometry, Geometry, MonitorLocator};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// 페이드 한 단계 간격
pub const FADE_STEP: Duration = Duration::from_millis(20);

/// UI 루프에 넘기는 작업
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// 단일 스레드 UI 이벤트 루프
pub trait UiLoop: Send + Sync {
    /// 다음 루프 틱에 실행
    fn post(&self, task: Task);
    /// delay 후 실행
    fn post_after(&self, delay: Duration, task: Task);
}

/// 화면에 떠 있는 실제 오버레이 윈도우
pub trait OverlaySurface: Send {
    /// 모니터를 특정하지 못했을 때 쓰는 전체 화면 크기
    fn screen_size(&self) -> (i32, i32);
    fn set_geometry(&mut self, geometry: Geometry);
    fn set_label(&mut self, label: &str);
    fn set_opacity(&mut self, opacity: f64);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupPhase {
    Hidden,
    Shown,
    /// `step`은 다음에 쓸 단계 (steps..=0)
    FadingOut { step: u32, steps: u32 },
}

/// 페이드 시간(초)을 20ms 단계 수로 변환 (최소 1)
pub fn fade_steps(fade_duration: f64) -> u32 {
    let millis = (fade_duration * 1000.0).round().max(0.0) as u64;
    (millis / FADE_STEP.as_millis() as u64).clamp(1, u32::MAX as u64) as u32
}

/// 초 → Duration. 음수/NaN은 설정 검증에서 걸러지므로 남는 실패는 표현 범위 초과뿐
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

struct PopupState {
    surface: Box<dyn OverlaySurface>,
    phase: PopupPhase,
    /// trigger마다 증가. 예약된 타이머/페이드 단계의 유효성 판단용
    generation: u64,
    geometry: Option<Geometry>,
    label: String,
    opacity: f64,
    /// 페이드 시작 시점의 투명도
    fade_from: f64,
}

impl PopupState {
    fn write_opacity(&mut self, opacity: f64) {
        let opacity = opacity.clamp(0.0, 1.0);
        self.opacity = opacity;
        self.surface.set_opacity(opacity);
    }

    fn write_geometry(&mut self, geometry: Geometry) {
        self.geometry = Some(geometry);
        self.surface.set_geometry(geometry);
        log::info!(
            "팝업 위치 갱신: {}x{}+{}+{}",
            geometry.width,
            geometry.height,
            geometry.x,
            geometry.y
        );
    }
}

/// 프로세스에 하나뿐인 팝업 윈도우의 상태 머신
pub struct PopupController {
    me: Weak<PopupController>,
    state: Mutex<PopupState>,
    ui: Arc<dyn UiLoop>,
    config: Arc<ConfigStore>,
    locator: Arc<dyn MonitorLocator>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl PopupController {
    /// 컨트롤러를 만들고 크기/모니터 설정 변경을 구독한다. 첫 배치는 UI 루프에 예약됨
    pub fn new(
        surface: Box<dyn OverlaySurface>,
        ui: Arc<dyn UiLoop>,
        config: Arc<ConfigStore>,
        locator: Arc<dyn MonitorLocator>,
        initial_label: &str,
    ) -> Arc<Self> {
        let controller = Arc::new_cyclic(|me| Self {
            me: me.clone(),
            state: Mutex::new(PopupState {
                surface,
                phase: PopupPhase::Hidden,
                generation: 0,
                geometry: None,
                label: initial_label.to_string(),
                opacity: 0.0,
                fade_from: 1.0,
            }),
            ui,
            config,
            locator,
            subscriptions: Mutex::new(Vec::new()),
        });

        for field in [Field::WindowSizeRatio, Field::MonitorConf] {
            let weak = Arc::downgrade(&controller);
            let id = controller.config.listen(field, move |value| {
                if let Some(controller) = weak.upgrade() {
                    log::info!("{} 변경({}), 팝업 재배치 예약", field, value);
                    controller.post_relayout();
                }
            });
            controller.lock_subscriptions().push(id);
        }

        {
            let mut state = controller.lock_state();
            let label = state.label.clone();
            state.surface.set_label(&label);
        }
        controller.post_relayout();
        controller
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PopupState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_subscriptions(&self) -> std::sync::MutexGuard<'_, Vec<SubscriptionId>> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 아무 스레드에서나 호출 가능. trigger를 UI 루프에 넘김
    pub fn show(&self, label: &str) {
        let label = label.to_string();
        self.post_after(Duration::ZERO, move |this| this.trigger(&label));
    }

    /// 컨트롤러가 살아 있을 때만 실행되는 작업 예약
    fn post_after<F>(&self, delay: Duration, f: F)
    where
        F: FnOnce(&PopupController) + Send + 'static,
    {
        let me = self.me.clone();
        let task: Task = Box::new(move || {
            if let Some(this) = me.upgrade() {
                f(&this);
            }
        });
        if delay.is_zero() {
            self.ui.post(task);
        } else {
            self.ui.post_after(delay, task);
        }
    }

    /// 팝업 표시. **UI 루프에서만 호출해야 합니다.**
    ///
    /// 대기 중인 유지 타이머와 진행 중인 페이드를 무효화하고, 모니터를 다시 찾아
    /// 배치한 뒤 불투명하게 표시하고 유지 타이머를 건다.
    pub fn trigger(&self, label: &str) {
        let config = self.config.snapshot();
        let area = self.locator.locate(config.monitor_conf);

        let generation = {
            let mut state = self.lock_state();
            state.generation += 1;
            if let PopupPhase::FadingOut { step, steps } = state.phase {
                log::debug!("페이드 중단 ({}/{})", step, steps);
            }

            let geometry = compute_geometry(area, state.surface.screen_size(), config.window_size_ratio);
            state.write_geometry(geometry);
            state.label = label.to_string();
            state.surface.set_label(label);
            state.write_opacity(config.initial_alpha);
            state.phase = PopupPhase::Shown;
            state.generation
        };
        log::info!("팝업 표시: '{}' (gen {})", label, generation);

        self.post_after(seconds(config.window_lifetime), move |this| {
            this.on_lifetime_elapsed(generation)
        });
    }

    fn on_lifetime_elapsed(&self, generation: u64) {
        let fade_duration = self.config.fade_duration();
        {
            let mut state = self.lock_state();
            if state.generation != generation || state.phase != PopupPhase::Shown {
                return;
            }
            if fade_duration <= 0.0 {
                state.write_opacity(0.0);
                state.phase = PopupPhase::Hidden;
                log::debug!("팝업 숨김 (애니메이션 없음)");
                return;
            }
            let steps = fade_steps(fade_duration);
            state.fade_from = state.opacity;
            state.phase = PopupPhase::FadingOut { step: steps, steps };
        }
        self.fade_step(generation);
    }

    fn fade_step(&self, generation: u64) {
        {
            let mut state = self.lock_state();
            // 새 trigger가 윈도우를 가져갔으면 투명도를 건드리지 않음
            if state.generation != generation {
                return;
            }
            let PopupPhase::FadingOut { step, steps } = state.phase else {
                return;
            };
            let opacity = state.fade_from * step as f64 / steps as f64;
            state.write_opacity(opacity);
            if step == 0 {
                state.phase = PopupPhase::Hidden;
                log::debug!("팝업 페이드 완료");
                return;
            }
            state.phase = PopupPhase::FadingOut {
                step: step - 1,
                steps,
            };
        }

        self.post_after(FADE_STEP, move |this| this.fade_step(generation));
    }

    fn post_relayout(&self) {
        self.post_after(Duration::ZERO, |this| this.relayout());
    }

    /// 현재 설정으로 위치/크기만 다시 계산 (투명도, 라벨 유지). UI 루프에서 호출
    pub fn relayout(&self) {
        let config = self.config.snapshot();
        let area = self.locator.locate(config.monitor_conf);
        let mut state = self.lock_state();
        let geometry = compute_geometry(area, state.surface.screen_size(), config.window_size_ratio);
        state.write_geometry(geometry);
    }

    /// 구독 해제, 타이머 무효화, 윈도우 숨김. UI 루프에서 호출
    pub fn shutdown(&self) {
        for id in self.lock_subscriptions().drain(..) {
            self.config.forget(id);
        }
        let mut state = self.lock_state();
        state.generation += 1;
        state.write_opacity(0.0);
        state.phase = PopupPhase::Hidden;
        log::info!("팝업 종료");
    }

    pub fn phase(&self) -> PopupPhase {
        self.lock_state().phase
    }

    pub fn opacity(&self) -> f64 {
        self.lock_state().opacity
    }

    pub fn label(&self) -> String {
        self.lock_state().label.clone()
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.lock_state().geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConf, Value};
    use crate::layout::{MonitorArea, Rect};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Geometry(Geometry),
        Label(String),
        Opacity(f64),
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Call>>>);

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.0.lock().unwrap().clone()
        }

        fn opacities(&self) -> Vec<f64> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Opacity(o) => Some(o),
                    _ => None,
                })
                .collect()
        }

        fn clear(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    struct FakeSurface(Recorder);

    impl OverlaySurface for FakeSurface {
        fn screen_size(&self) -> (i32, i32) {
            (1920, 1080)
        }
        fn set_geometry(&mut self, geometry: Geometry) {
            self.0 .0.lock().unwrap().push(Call::Geometry(geometry));
        }
        fn set_label(&mut self, label: &str) {
            self.0 .0.lock().unwrap().push(Call::Label(label.to_string()));
        }
        fn set_opacity(&mut self, opacity: f64) {
            self.0 .0.lock().unwrap().push(Call::Opacity(opacity));
        }
    }

    /// 가상 시계로 동작하는 UI 루프
    #[derive(Default)]
    struct ManualLoop {
        inner: Mutex<(Duration, u64, Vec<(Duration, u64, Task)>)>,
    }

    impl UiLoop for ManualLoop {
        fn post(&self, task: Task) {
            self.post_after(Duration::ZERO, task);
        }
        fn post_after(&self, delay: Duration, task: Task) {
            let mut inner = self.inner.lock().unwrap();
            let due = inner.0.saturating_add(delay);
            inner.1 += 1;
            let seq = inner.1;
            inner.2.push((due, seq, task));
        }
    }

    impl ManualLoop {
        fn advance(&self, by: Duration) {
            let deadline = self.inner.lock().unwrap().0 + by;
            loop {
                let task = {
                    let mut inner = self.inner.lock().unwrap();
                    let next = inner
                        .2
                        .iter()
                        .enumerate()
                        .filter(|(_, (due, _, _))| *due <= deadline)
                        .min_by_key(|(_, (due, seq, _))| (*due, *seq))
                        .map(|(i, _)| i);
                    match next {
                        Some(i) => {
                            let (due, _, task) = inner.2.remove(i);
                            inner.0 = due;
                            task
                        }
                        None => {
                            inner.0 = deadline;
                            break;
                        }
                    }
                };
                task();
            }
        }

        fn run_until_idle(&self) {
            self.advance(Duration::from_secs(3600));
        }
    }

    struct FixedLocator {
        area: MonitorArea,
        asked: Mutex<Vec<MonitorConf>>,
    }

    impl MonitorLocator for FixedLocator {
        fn locate(&self, mode: MonitorConf) -> MonitorArea {
            self.asked.lock().unwrap().push(mode);
            self.area
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: Arc<ConfigStore>,
        ui: Arc<ManualLoop>,
        locator: Arc<FixedLocator>,
        recorder: Recorder,
        popup: Arc<PopupController>,
    }

    fn fixture(area: MonitorArea) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(ConfigStore::open(dir.path().join("config.json")));
        let ui = Arc::new(ManualLoop::default());
        let locator = Arc::new(FixedLocator {
            area,
            asked: Mutex::new(Vec::new()),
        });
        let recorder = Recorder::default();
        let popup = PopupController::new(
            Box::new(FakeSurface(recorder.clone())),
            ui.clone(),
            Arc::clone(&config),
            locator.clone(),
            "?",
        );
        ui.run_until_idle();
        recorder.clear();
        Fixture {
            _dir: dir,
            config,
            ui,
            locator,
            recorder,
            popup,
        }
    }

    fn primary() -> MonitorArea {
        MonitorArea::Bounds(Rect {
            left: 0,
            top: 0,
            right: 1920,
            bottom: 1080,
        })
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_fade_steps() {
        assert_eq!(fade_steps(0.5), 25);
        assert_eq!(fade_steps(1.0), 50);
        assert_eq!(fade_steps(0.3), 15);
        assert_eq!(fade_steps(0.01), 1);
    }

    #[test]
    fn test_initial_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(ConfigStore::open(dir.path().join("config.json")));
        let ui = Arc::new(ManualLoop::default());
        let recorder = Recorder::default();
        let popup = PopupController::new(
            Box::new(FakeSurface(recorder.clone())),
            ui.clone(),
            config,
            Arc::new(FixedLocator {
                area: primary(),
                asked: Mutex::new(Vec::new()),
            }),
            "가",
        );
        ui.run_until_idle();

        assert_eq!(popup.phase(), PopupPhase::Hidden);
        assert_eq!(popup.label(), "가");
        assert!(recorder.opacities().is_empty());
        assert_eq!(
            popup.geometry(),
            Some(Geometry {
                x: 840,
                y: 895,
                width: 240,
                height: 135
            })
        );
    }

    #[test]
    fn test_trigger_shows_opaque() {
        let f = fixture(primary());
        f.popup.trigger("A");

        assert_eq!(f.popup.phase(), PopupPhase::Shown);
        assert_eq!(f.popup.opacity(), 1.0);
        assert_eq!(f.popup.label(), "A");
        let calls = f.recorder.calls();
        assert!(calls.contains(&Call::Label("A".into())));
        assert_eq!(calls.last(), Some(&Call::Opacity(1.0)));
    }

    #[test]
    fn test_show_is_marshaled_to_ui_loop() {
        let f = fixture(primary());
        f.popup.show("가");
        assert_eq!(f.popup.phase(), PopupPhase::Hidden);
        f.ui.advance(Duration::ZERO);
        assert_eq!(f.popup.phase(), PopupPhase::Shown);
        assert_eq!(f.popup.label(), "가");
    }

    #[test]
    fn test_full_cycle() {
        let f = fixture(primary());
        f.popup.trigger("가");

        f.ui.advance(ms(499));
        assert_eq!(f.popup.phase(), PopupPhase::Shown);
        assert_eq!(f.recorder.opacities(), vec![1.0]);

        f.ui.advance(ms(1));
        assert!(matches!(f.popup.phase(), PopupPhase::FadingOut { .. }));

        f.ui.run_until_idle();
        assert_eq!(f.popup.phase(), PopupPhase::Hidden);

        let opacities = f.recorder.opacities();
        // trigger 1회 + 페이드 25..=0 (26회)
        assert_eq!(opacities.len(), 27);
        assert_eq!(opacities[1], 1.0);
        assert_eq!(*opacities.last().unwrap(), 0.0);
        assert!(opacities.windows(2).skip(1).all(|w| w[1] < w[0]));
        assert_eq!(opacities[2], 24.0 / 25.0);
    }

    #[test]
    fn test_huge_lifetime_keeps_popup_shown() {
        let f = fixture(primary());
        f.config
            .set(Field::WindowLifetime, Value::Number(1e20))
            .unwrap();
        f.popup.trigger("A");

        f.ui.advance(ms(1));
        assert_eq!(f.popup.phase(), PopupPhase::Shown);
        f.ui.run_until_idle();
        assert_eq!(f.popup.phase(), PopupPhase::Shown);
        assert_eq!(f.recorder.opacities(), vec![1.0]);
    }

    #[test]
    fn test_seconds_out_of_range_saturates() {
        assert_eq!(seconds(0.5), ms(500));
        assert_eq!(seconds(1e20), Duration::MAX);
    }

    #[test]
    fn test_fade_takes_steps_of_20ms() {
        let f = fixture(primary());
        f.popup.trigger("가");
        f.ui.advance(ms(500));
        assert_eq!(f.recorder.opacities().len(), 2);
        f.ui.advance(ms(19));
        assert_eq!(f.recorder.opacities().len(), 2);
        f.ui.advance(ms(1));
        assert_eq!(f.recorder.opacities().len(), 3);
        f.ui.advance(ms(24 * 20));
        assert_eq!(f.recorder.opacities().len(), 27);
        assert_eq!(f.popup.phase(), PopupPhase::Hidden);
    }

    #[test]
    fn test_zero_fade_writes_two_opacities() {
        let f = fixture(primary());
        f.config.set(Field::FadeDuration, Value::Number(0.0)).unwrap();
        f.ui.run_until_idle();
        f.recorder.clear();

        f.popup.trigger("A");
        f.ui.run_until_idle();

        assert_eq!(f.recorder.opacities(), vec![1.0, 0.0]);
        assert_eq!(f.popup.phase(), PopupPhase::Hidden);
    }

    #[test]
    fn test_retrigger_mid_fade_wins() {
        let f = fixture(primary());
        f.popup.trigger("가");
        // 유지 500ms + 페이드 5단계 진행
        f.ui.advance(ms(500 + 5 * 20 + 5));
        assert!(matches!(f.popup.phase(), PopupPhase::FadingOut { .. }));
        assert!(f.popup.opacity() < 1.0);

        let before = f.recorder.opacities().len();
        f.popup.trigger("A");
        assert_eq!(f.popup.opacity(), 1.0);

        // 새 유지 시간이 끝나기 전까지는 1.0 미만의 값이 쓰이면 안 됨
        f.ui.advance(ms(499));
        let after: Vec<f64> = f.recorder.opacities()[before..].to_vec();
        assert_eq!(after, vec![1.0]);
        assert_eq!(f.popup.phase(), PopupPhase::Shown);

        f.ui.run_until_idle();
        let after: Vec<f64> = f.recorder.opacities()[before..].to_vec();
        assert_eq!(after.len(), 1 + 26);
        assert_eq!(*after.last().unwrap(), 0.0);
        assert_eq!(f.popup.label(), "A");
    }

    #[test]
    fn test_retrigger_while_shown_restarts_lifetime() {
        let f = fixture(primary());
        f.popup.trigger("가");
        f.ui.advance(ms(400));
        f.popup.trigger("A");

        // 첫 타이머(500ms)는 무효
        f.ui.advance(ms(200));
        assert_eq!(f.popup.phase(), PopupPhase::Shown);
        assert_eq!(f.recorder.opacities(), vec![1.0, 1.0]);

        f.ui.advance(ms(300));
        assert!(matches!(f.popup.phase(), PopupPhase::FadingOut { .. }));
    }

    #[test]
    fn test_initial_alpha_scales_ramp() {
        let f = fixture(primary());
        f.config.set(Field::InitialAlpha, Value::Number(0.5)).unwrap();
        f.popup.trigger("가");
        assert_eq!(f.popup.opacity(), 0.5);

        f.ui.run_until_idle();
        let opacities = f.recorder.opacities();
        assert_eq!(opacities[0], 0.5);
        assert_eq!(opacities[1], 0.5);
        assert!(opacities.iter().all(|o| *o <= 0.5));
        assert_eq!(*opacities.last().unwrap(), 0.0);
    }

    #[test]
    fn test_config_change_relayouts_without_touching_visuals() {
        let f = fixture(primary());
        f.popup.trigger("가");
        f.recorder.clear();

        f.config
            .set(Field::WindowSizeRatio, Value::Number(0.25))
            .unwrap();
        f.ui.advance(Duration::ZERO);

        assert_eq!(
            f.recorder.calls(),
            vec![Call::Geometry(Geometry {
                x: 720,
                y: 760,
                width: 480,
                height: 270
            })]
        );
        assert_eq!(f.popup.label(), "가");
        assert_eq!(f.popup.opacity(), 1.0);
    }

    #[test]
    fn test_monitor_conf_change_queries_locator() {
        let f = fixture(primary());
        f.config
            .set(Field::MonitorConf, Value::Monitor(MonitorConf::Cursor))
            .unwrap();
        f.ui.run_until_idle();
        assert_eq!(
            f.locator.asked.lock().unwrap().last(),
            Some(&MonitorConf::Cursor)
        );

        f.popup.trigger("A");
        assert_eq!(
            f.locator.asked.lock().unwrap().last(),
            Some(&MonitorConf::Cursor)
        );
    }

    #[test]
    fn test_full_screen_fallback() {
        let f = fixture(MonitorArea::FullScreen);
        f.popup.trigger("A");
        assert_eq!(
            f.popup.geometry(),
            Some(Geometry {
                x: 840,
                y: 895,
                width: 240,
                height: 135
            })
        );
    }

    #[test]
    fn test_shutdown_forgets_subscriptions() {
        let f = fixture(primary());
        f.popup.trigger("가");
        f.popup.shutdown();
        assert_eq!(f.popup.phase(), PopupPhase::Hidden);
        assert_eq!(f.popup.opacity(), 0.0);
        f.recorder.clear();

        f.config
            .set(Field::WindowSizeRatio, Value::Number(0.25))
            .unwrap();
        f.ui.run_until_idle();
        assert!(f.recorder.calls().is_empty());
    }
}
