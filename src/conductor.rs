//! 키 훅 이벤트 → 입력기 상태 조회 → 팝업 표시 연결

use crate::hook::{keycode, HookId, KeyEvent, KeyHookRegistry, KeyKind};
use crate::ime::{ImeProbe, InputLabel};
use crate::popup::PopupController;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 키 입력 후 입력기 상태가 반영될 때까지 기다리는 시간
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

/// 훅 스레드 → 워커 큐 크기
pub const QUEUE_CAPACITY: usize = 32;

/// 팝업을 띄우는 쪽
pub trait PopupSink: Send + Sync {
    fn show_popup(&self, label: &str);
}

impl PopupSink for PopupController {
    fn show_popup(&self, label: &str) {
        self.show(label);
    }
}

/// 감시할 키와 그중 무시할 키
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerKeys {
    pub watch: Vec<u16>,
    pub ignore: Vec<u16>,
}

impl Default for TriggerKeys {
    /// Caps Lock(한/영 전환)과 Option 키. 왼쪽 Option은 일반 수정키라 제외
    fn default() -> Self {
        Self {
            watch: vec![keycode::CAPS_LOCK, keycode::LEFT_OPTION, keycode::RIGHT_OPTION],
            ignore: vec![keycode::LEFT_OPTION],
        }
    }
}

impl TriggerKeys {
    pub fn is_ignored(&self, code: u16) -> bool {
        self.ignore.contains(&code)
    }
}

pub struct Conductor {
    keys: TriggerKeys,
    settle_delay: Duration,
    probe: Arc<dyn ImeProbe>,
    popup: Arc<dyn PopupSink>,
}

impl Conductor {
    pub fn new(probe: Arc<dyn ImeProbe>, popup: Arc<dyn PopupSink>) -> Self {
        Self {
            keys: TriggerKeys::default(),
            settle_delay: SETTLE_DELAY,
            probe,
            popup,
        }
    }

    pub fn with_keys(mut self, keys: TriggerKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// 키 이벤트 하나 처리. 워커 스레드에서 호출되며 settle delay 동안 블로킹됨
    pub fn handle(&self, event: &KeyEvent) -> Option<InputLabel> {
        if self.keys.is_ignored(event.scan_code) {
            log::info!("무시하는 키: {} ({})", event.name, event.scan_code);
            return None;
        }
        if event.kind != KeyKind::Down {
            return None;
        }

        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }

        let state = self.probe.probe();
        match state.label() {
            Some(label) => {
                log::info!("{} → 입력 언어 {}", event.name, label);
                self.popup.show_popup(label.as_str());
                Some(label)
            }
            None => {
                log::error!("현재 입력 언어를 알 수 없습니다 ({}: {:?})", event.name, state);
                None
            }
        }
    }

    /// 훅을 등록하고 워커 스레드를 시작
    ///
    /// 훅 콜백은 이벤트를 큐에 넣기만 하므로 이벤트 탭 스레드를 막지 않는다.
    pub fn start(self, hooks: Arc<KeyHookRegistry>) -> ConductorHandle {
        let (tx, rx) = mpsc::sync_channel::<KeyEvent>(QUEUE_CAPACITY);

        let hook_ids = self
            .keys
            .watch
            .iter()
            .map(|&code| {
                let tx = tx.clone();
                hooks.register(code, move |event| enqueue(&tx, event))
            })
            .collect();
        drop(tx);

        let worker = thread::Builder::new()
            .name("conductor".into())
            .spawn(move || self.run(rx))
            .map_err(|e| log::error!("워커 스레드 시작 실패: {}", e))
            .ok();

        ConductorHandle {
            hooks,
            hook_ids,
            worker,
        }
    }

    fn run(self, rx: Receiver<KeyEvent>) {
        while let Ok(event) = rx.recv() {
            self.handle(&event);
        }
        log::info!("Conductor 워커 종료");
    }
}

fn enqueue(tx: &SyncSender<KeyEvent>, event: &KeyEvent) {
    match tx.try_send(event.clone()) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => log::warn!("키 이벤트 큐가 가득 참, 버림: {}", event.name),
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// 실행 중인 Conductor. quit으로 훅 해제 및 워커 종료
pub struct ConductorHandle {
    hooks: Arc<KeyHookRegistry>,
    hook_ids: Vec<HookId>,
    worker: Option<JoinHandle<()>>,
}

impl ConductorHandle {
    pub fn hook_ids(&self) -> &[HookId] {
        &self.hook_ids
    }

    fn unhook(&mut self) {
        for id in self.hook_ids.drain(..) {
            self.hooks.unregister(id);
        }
    }

    /// 훅만 해제하고 워커는 기다리지 않음. 워커가 메인 스레드를 기다릴 수 있으므로
    /// 메인 스레드에서 종료할 때는 quit 대신 이것을 사용
    pub fn detach(mut self) {
        self.unhook();
        self.worker.take();
        log::info!("Conductor 훅 해제 (워커 분리)");
    }

    /// 훅을 해제하면 송신자가 모두 사라져 워커가 끝난다
    pub fn quit(&mut self) {
        self.unhook();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Conductor 워커 패닉");
            }
        }
    }
}

impl Drop for ConductorHandle {
    fn drop(&mut self) {
        self.quit();
    }
}
