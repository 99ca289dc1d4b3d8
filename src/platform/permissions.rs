//! 손쉬운 사용(Accessibility) 권한
//!
//! 키 이벤트 탭과 FOCUSED 모니터 모드(활성 윈도우 위치 조회)가 이 권한에 의존한다.
//! 권한이 없어도 앱은 뜨지만 한/영 키를 감지하지 못한다.

use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::dictionary::{CFDictionary, __CFDictionary};
use core_foundation::string::CFString;
use std::ptr;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrustedWithOptions(options: *const __CFDictionary) -> bool;
}

/// 권한이 없을 때 터미널에 보여줄 안내
pub const PERMISSION_NOTICE: [&str; 4] = [
    "⚠️  Accessibility 권한이 필요합니다.",
    "   시스템 설정 > 개인 정보 보호 및 보안 > 손쉬운 사용",
    "   에서 KRToaster를 허용해주세요.",
    "   허용 전까지는 한/영 전환 팝업이 뜨지 않습니다.",
];

/// 현재 프로세스가 신뢰되었는지. prompt가 true면 시스템 허용 다이얼로그를 띄움
fn is_trusted(prompt: bool) -> bool {
    unsafe {
        if prompt {
            let options = CFDictionary::from_CFType_pairs(&[(
                CFString::new("AXTrustedCheckOptionPrompt"),
                CFBoolean::true_value(),
            )]);
            AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef())
        } else {
            AXIsProcessTrustedWithOptions(ptr::null())
        }
    }
}

/// 시작 시 권한 확인. 없으면 허용 다이얼로그를 띄우고 안내를 출력/기록
pub fn ensure_accessibility(prompt: bool) -> bool {
    let trusted = is_trusted(prompt);
    if trusted {
        log::info!("Accessibility 권한 확인됨");
    } else {
        eprintln!();
        for line in PERMISSION_NOTICE {
            eprintln!("{}", line);
        }
        eprintln!();
        log::warn!("Accessibility 권한 없음, 키 입력 감지와 활성 윈도우 조회가 동작하지 않을 수 있음");
    }
    trusted
}
