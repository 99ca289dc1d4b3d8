//! KRToaster - 한/영 전환 시 현재 입력 언어를 화면에 잠깐 띄워 주는 메뉴바 앱

pub mod conductor;
pub mod config;
pub mod hook;
pub mod ime;
pub mod layout;
pub mod logging;
pub mod popup;
pub mod tray;

#[cfg(target_os = "macos")]
pub mod platform;
#[cfg(target_os = "macos")]
pub mod ui;

pub use conductor::{Conductor, ConductorHandle, PopupSink, TriggerKeys};
pub use config::{Config, ConfigError, ConfigStore, Field, MonitorConf, Value};
pub use hook::{KeyEvent, KeyHookRegistry, KeyKind};
pub use ime::{ImeProbe, ImeState, InputLabel};
pub use popup::{OverlaySurface, PopupController, PopupPhase, UiLoop};
