//! 입력기(IME) 변환 상태와 팝업 라벨

use std::fmt;

/// 포그라운드 입력 컨텍스트의 변환 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImeState {
    /// 한글 입력
    Native,
    /// 영문 입력
    Latin,
    /// 판단 불가 (입력 소스 조회 실패, 기타 입력기)
    Unknown,
}

impl ImeState {
    /// 팝업에 표시할 라벨. 판단 불가면 None
    pub fn label(self) -> Option<InputLabel> {
        match self {
            ImeState::Native => Some(InputLabel::Hangul),
            ImeState::Latin => Some(InputLabel::Latin),
            ImeState::Unknown => None,
        }
    }
}

/// 현재 입력기 상태를 조회하는 외부 협력자
pub trait ImeProbe: Send + Sync {
    fn probe(&self) -> ImeState;
}

impl<F> ImeProbe for F
where
    F: Fn() -> ImeState + Send + Sync,
{
    fn probe(&self) -> ImeState {
        self()
    }
}

/// 팝업 라벨 (두 가지 기호)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputLabel {
    Hangul,
    Latin,
}

impl InputLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputLabel::Hangul => "가",
            InputLabel::Latin => "A",
        }
    }
}

impl fmt::Display for InputLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 시작 시 표시할 라벨 (판단 불가면 "?")
pub fn initial_label(state: ImeState) -> &'static str {
    state.label().map(|l| l.as_str()).unwrap_or("?")
}

/// 입력 소스 ID로 변환 상태 판단
///
/// macOS 한글 입력기는 `com.apple.inputmethod.Korean.*` 계열 ID를 쓰고,
/// 그중 `Roman` 모드는 영문 입력이다.
pub fn classify_input_source(source_id: &str) -> ImeState {
    if source_id.contains("Korean") {
        if source_id.ends_with(".Roman") {
            ImeState::Latin
        } else {
            ImeState::Native
        }
    } else if source_id.starts_with("com.apple.keylayout.") {
        ImeState::Latin
    } else {
        ImeState::Unknown
    }
}
