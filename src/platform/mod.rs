pub mod event_tap;
pub mod input_source;
pub mod permissions;
pub mod screens;

use crate::popup::{Task, UiLoop};
use std::time::Duration;

extern "C" {
    // dispatch_get_main_queue()는 C 매크로이므로, 실제 심볼인 _dispatch_main_q를 사용
    static _dispatch_main_q: std::ffi::c_void;
    fn dispatch_async_f(
        queue: *const std::ffi::c_void,
        context: *mut std::ffi::c_void,
        work: extern "C" fn(*mut std::ffi::c_void),
    );
    fn dispatch_after_f(
        when: u64,
        queue: *const std::ffi::c_void,
        context: *mut std::ffi::c_void,
        work: extern "C" fn(*mut std::ffi::c_void),
    );
    fn dispatch_sync_f(
        queue: *const std::ffi::c_void,
        context: *mut std::ffi::c_void,
        work: extern "C" fn(*mut std::ffi::c_void),
    );
    fn dispatch_time(when: u64, delta: i64) -> u64;
    fn pthread_main_np() -> i32;
}

extern "C" fn trampoline<F: FnOnce()>(context: *mut std::ffi::c_void) {
    unsafe {
        let f = Box::from_raw(context as *mut F);
        f();
    }
}

/// GCD를 사용하여 클로저를 메인 스레드에서 실행합니다.
pub fn dispatch_to_main<F: FnOnce() + Send + 'static>(f: F) {
    let raw = Box::into_raw(Box::new(f)) as *mut std::ffi::c_void;

    unsafe {
        let main_queue = &_dispatch_main_q as *const std::ffi::c_void;
        dispatch_async_f(main_queue, raw, trampoline::<F>);
    }
}

/// delay 후 메인 스레드에서 클로저를 실행합니다.
pub fn dispatch_after_to_main<F: FnOnce() + Send + 'static>(delay: Duration, f: F) {
    let raw = Box::into_raw(Box::new(f)) as *mut std::ffi::c_void;
    let delay_ns = delay.as_nanos().min(i64::MAX as u128) as i64;

    unsafe {
        // DISPATCH_TIME_NOW = 0
        let when = dispatch_time(0, delay_ns);
        let main_queue = &_dispatch_main_q as *const std::ffi::c_void;
        dispatch_after_f(when, main_queue, raw, trampoline::<F>);
    }
}

/// 메인 스레드에서 f를 실행하고 결과를 기다립니다. 메인 스레드에서 부르면 바로 실행.
/// 작업이 실행되지 않았으면 None
///
/// 메인 스레드가 이 호출자를 기다리는 중이면 교착되므로, 메인 스레드에서 워커를 join하지 말 것.
pub fn run_on_main<R, F>(f: F) -> Option<R>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if unsafe { pthread_main_np() } != 0 {
        return Some(f());
    }

    struct Job<F, R> {
        f: Option<F>,
        result: Option<R>,
    }

    extern "C" fn run_job<F: FnOnce() -> R, R>(context: *mut std::ffi::c_void) {
        let job = unsafe { &mut *(context as *mut Job<F, R>) };
        if let Some(f) = job.f.take() {
            job.result = Some(f());
        }
    }

    let mut job = Job {
        f: Some(f),
        result: None,
    };
    unsafe {
        let main_queue = &_dispatch_main_q as *const std::ffi::c_void;
        dispatch_sync_f(
            main_queue,
            &mut job as *mut Job<F, R> as *mut std::ffi::c_void,
            run_job::<F, R>,
        );
    }
    job.result
}

/// AppKit 메인 스레드(GCD 메인 큐)를 UI 루프로 사용
pub struct MainQueue;

impl UiLoop for MainQueue {
    fn post(&self, task: Task) {
        dispatch_to_main(task);
    }

    fn post_after(&self, delay: Duration, task: Task) {
        dispatch_after_to_main(delay, task);
    }
}
