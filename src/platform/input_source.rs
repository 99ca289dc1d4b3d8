//! 현재 입력 소스(한/영) 조회
//! Carbon API의 TIS (Text Input Source) 함수 사용

use super::run_on_main;
use crate::ime::{classify_input_source, ImeProbe, ImeState};
use core_foundation::base::{CFRelease, CFTypeRef, TCFType};
use core_foundation::string::{CFString, CFStringRef};

// Carbon TIS 타입 정의
type TISInputSourceRef = *mut std::ffi::c_void;

// Carbon 프레임워크 링크
#[link(name = "Carbon", kind = "framework")]
extern "C" {
    fn TISCopyCurrentKeyboardInputSource() -> TISInputSourceRef;
    fn TISGetInputSourceProperty(
        inputSource: TISInputSourceRef,
        propertyKey: CFStringRef,
    ) -> CFTypeRef;

    // 상수 키 (런타임에 가져와야 함)
    static kTISPropertyInputSourceID: CFStringRef;
}

/// 현재 입력 소스 ID 가져오기
pub fn get_current_input_source_id() -> Option<String> {
    unsafe {
        let current = TISCopyCurrentKeyboardInputSource();
        if current.is_null() {
            return None;
        }

        let source_id = TISGetInputSourceProperty(current, kTISPropertyInputSourceID);
        if source_id.is_null() {
            CFRelease(current as CFTypeRef);
            return None;
        }

        // get rule: current를 해제하기 전에 문자열을 복사
        let id = CFString::wrap_under_get_rule(source_id as CFStringRef).to_string();
        CFRelease(current as CFTypeRef);
        Some(id)
    }
}

/// TIS 기반 입력기 상태 조회
///
/// TIS 함수는 메인 큐에서만 호출할 수 있어(다른 스레드에서는 SIGTRAP) 메인 스레드로 넘겨 조회한다.
pub struct TisProbe;

impl ImeProbe for TisProbe {
    fn probe(&self) -> ImeState {
        match run_on_main(get_current_input_source_id).flatten() {
            Some(id) => {
                let state = classify_input_source(&id);
                log::debug!("입력 소스: {} → {:?}", id, state);
                state
            }
            None => ImeState::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // GUI 환경에서만 테스트 가능
    fn test_get_current_input_source() {
        let id = get_current_input_source_id();
        assert!(id.is_some());
        println!("현재 입력 소스: {:?}", id);
    }

    #[test]
    #[ignore] // GUI 환경에서만 테스트 가능
    fn test_probe_known_state() {
        println!("입력기 상태: {:?}", TisProbe.probe());
    }
}
