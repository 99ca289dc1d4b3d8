//! 트레이(메뉴바) 메뉴 구성과 액션 처리
//!
//! 메뉴는 설정 필드마다 라디오 그룹 하나씩, 그리고 "설정 다시 불러오기"와 "종료"로 이루어진다.
//! 각 항목은 설정 저장소의 `set` 호출로만 동작한다.

use crate::config::{Config, ConfigStore, Field, MonitorConf, Value};

// --- 프리셋 상수 (ui::menubar에서 사용) ---

/// 창 유지 시간 프리셋 (초)
pub const LIFETIME_PRESETS: [f64; 5] = [0.0, 0.5, 1.0, 2.0, 3.0];
pub const LIFETIME_LABELS: [&str; 5] = ["0초", "0.5초", "1초", "2초", "3초"];

/// 창 애니메이션 속도 프리셋 (초)
pub const FADE_PRESETS: [f64; 5] = [0.0, 0.5, 1.0, 2.0, 3.0];
pub const FADE_LABELS: [&str; 5] = ["끄기", "0.5초", "1초", "2초", "3초"];

/// 창 시작 투명도 프리셋
pub const ALPHA_PRESETS: [f64; 5] = [0.3, 0.5, 0.7, 0.9, 1.0];
pub const ALPHA_LABELS: [&str; 5] = ["30%", "50%", "70%", "90%", "100% (불투명)"];

/// 창 크기 프리셋 (모니터 대비 비율)
pub const SIZE_PRESETS: [f64; 3] = [1.0 / 4.0, 1.0 / 6.0, 1.0 / 8.0];
pub const SIZE_LABELS: [&str; 3] = ["1/4", "1/6", "1/8"];

pub const MONITOR_PRESETS: [MonitorConf; 3] =
    [MonitorConf::Primary, MonitorConf::Cursor, MonitorConf::Focused];
pub const MONITOR_LABELS: [&str; 3] = [
    "항상 주 모니터에 표시",
    "커서가 있는 모니터에 표시",
    "활성 윈도우가 있는 모니터에 표시",
];

pub const RELOAD_TITLE: &str = "설정 다시 불러오기";
pub const QUIT_TITLE: &str = "종료";

/// 메뉴 항목이 수행하는 동작
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrayAction {
    Set(Field, Value),
    Reload,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuChoice {
    pub title: &'static str,
    pub value: Value,
}

/// 설정 필드 하나에 대한 라디오 그룹
#[derive(Debug, Clone, PartialEq)]
pub struct MenuGroup {
    pub title: &'static str,
    pub field: Field,
    pub choices: Vec<MenuChoice>,
}

impl MenuGroup {
    fn numbers(title: &'static str, field: Field, presets: &[f64], labels: &[&'static str]) -> Self {
        Self {
            title,
            field,
            choices: presets
                .iter()
                .zip(labels)
                .map(|(&n, &title)| MenuChoice {
                    title,
                    value: Value::Number(n),
                })
                .collect(),
        }
    }

    /// 현재 설정과 일치하는 항목 (라디오 체크 표시용)
    pub fn selected(&self, config: &Config) -> Option<usize> {
        let current = config.get(self.field);
        self.choices.iter().position(|c| same_value(&c.value, &current))
    }

    pub fn action(&self, index: usize) -> Option<TrayAction> {
        self.choices
            .get(index)
            .map(|c| TrayAction::Set(self.field, c.value))
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => (x - y).abs() < 1e-9,
        (Value::Monitor(x), Value::Monitor(y)) => x == y,
        _ => false,
    }
}

/// 트레이 메뉴의 라디오 그룹 목록 (표시 순서)
pub fn menu_groups() -> Vec<MenuGroup> {
    vec![
        MenuGroup::numbers("창 유지 시간", Field::WindowLifetime, &LIFETIME_PRESETS, &LIFETIME_LABELS),
        MenuGroup::numbers("창 애니메이션 속도", Field::FadeDuration, &FADE_PRESETS, &FADE_LABELS),
        MenuGroup::numbers("창 시작 투명도", Field::InitialAlpha, &ALPHA_PRESETS, &ALPHA_LABELS),
        MenuGroup::numbers("창 크기", Field::WindowSizeRatio, &SIZE_PRESETS, &SIZE_LABELS),
        MenuGroup {
            title: "다중 모니터 설정",
            field: Field::MonitorConf,
            choices: MONITOR_PRESETS
                .iter()
                .zip(MONITOR_LABELS)
                .map(|(&m, title)| MenuChoice {
                    title,
                    value: Value::Monitor(m),
                })
                .collect(),
        },
    ]
}

/// 메뉴 액션 실행. Quit은 `quit` 콜백에 맡김
pub fn dispatch(store: &ConfigStore, action: TrayAction, quit: &dyn Fn()) {
    match action {
        TrayAction::Set(field, value) => {
            log::info!("{} to {}", field, value);
            if let Err(e) = store.set(field, value) {
                log::error!("설정 변경 실패: {}", e);
            }
        }
        TrayAction::Reload => {
            log::info!("설정 다시 불러오기");
            store.reload();
        }
        TrayAction::Quit => {
            log::info!("종료 요청");
            quit();
        }
    }
}
