//! Windows device probe: low-level keyboard and mouse hooks.
//!
//! `WH_KEYBOARD_LL` / `WH_MOUSE_LL` hooks need a thread running a message
//! pump, so each hook gets a dedicated OS thread. Hook callbacks cannot
//! capture state; they push into a process-wide channel that a tokio task
//! drains into the core.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::error;

use greenwake_common::event::{EventType, WakeEvent};

use super::ProbeSwitch;
use crate::wakelock::WakeLockService;

const WH_KEYBOARD_LL: i32 = 13;
const WH_MOUSE_LL: i32 = 14;

type HookProc = extern "system" fn(code: i32, wparam: usize, lparam: isize) -> isize;

#[repr(C)]
struct Msg {
    hwnd: isize,
    message: u32,
    wparam: usize,
    lparam: isize,
    time: u32,
    pt: [i32; 2],
}

#[link(name = "user32")]
extern "system" {
    fn SetWindowsHookExW(id_hook: i32, lpfn: HookProc, hmod: isize, thread_id: u32) -> isize;
    fn CallNextHookEx(hhk: isize, code: i32, wparam: usize, lparam: isize) -> isize;
    fn GetMessageW(msg: *mut Msg, hwnd: isize, filter_min: u32, filter_max: u32) -> i32;
}

// Hook callbacks cannot capture state; the live sender is swapped in by
// each (re)start of the probe task.
static HOOK_SENDER: OnceLock<std::sync::Mutex<Option<mpsc::UnboundedSender<WakeEvent>>>> =
    OnceLock::new();
static HOOKS_INSTALLED: AtomicBool = AtomicBool::new(false);

fn current_sender() -> Option<mpsc::UnboundedSender<WakeEvent>> {
    HOOK_SENDER.get().and_then(|slot| slot.lock().unwrap().clone())
}

extern "system" fn keyboard_hook(code: i32, wparam: usize, lparam: isize) -> isize {
    if let Some(sender) = current_sender() {
        let _ = sender.send(WakeEvent::new(EventType::Device, "keyboard"));
    }
    unsafe { CallNextHookEx(0, code, wparam, lparam) }
}

extern "system" fn mouse_hook(code: i32, wparam: usize, lparam: isize) -> isize {
    if let Some(sender) = current_sender() {
        let _ = sender.send(WakeEvent::new(EventType::Device, "mouse"));
    }
    unsafe { CallNextHookEx(0, code, wparam, lparam) }
}

fn install_hook_thread(id_hook: i32, callback: HookProc, name: &'static str) {
    std::thread::spawn(move || {
        let hook = unsafe { SetWindowsHookExW(id_hook, callback, 0, 0) };
        if hook == 0 {
            error!("failed to install {name} hook");
            return;
        }
        let mut msg = Msg {
            hwnd: 0,
            message: 0,
            wparam: 0,
            lparam: 0,
            time: 0,
            pt: [0, 0],
        };
        // The message pump keeps the hook alive for the daemon's lifetime;
        // the hook is torn down by the OS when the process exits.
        loop {
            unsafe {
                GetMessageW(&mut msg, 0, 0, 0);
            }
        }
    });
}

pub(super) async fn run(
    core: Arc<WakeLockService>,
    switch: ProbeSwitch,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    *HOOK_SENDER
        .get_or_init(|| std::sync::Mutex::new(None))
        .lock()
        .unwrap() = Some(tx);

    if !HOOKS_INSTALLED.swap(true, Ordering::SeqCst) {
        install_hook_thread(WH_KEYBOARD_LL, keyboard_hook, "keyboard");
        install_hook_thread(WH_MOUSE_LL, mouse_hook, "mouse");
    }

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
            event = rx.recv() => {
                match event {
                    Some(event) => {
                        if switch.is_enabled() {
                            core.handle_wake_event(event);
                        }
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}
