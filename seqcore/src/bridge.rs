//! Script bridge: a process-wide "active engine" slot and the C-ABI shims
//! an embedded script interpreter calls into. Scope entry installs the
//! active engine pointer; scope exit (via [`ScopeGuard`]'s `Drop`) restores
//! whatever was active before, so nested calls compose safely.

use core::cell::RefCell;
use critical_section::Mutex;
use heapless::String;

use crate::model::teletype_track::{Script, TeletypeTrack};

/// What an embedded script interpreter can read from and write to via the
/// shims below. A concrete engine implements this directly; the bridge
/// itself only forwards.
pub trait ScriptHost {
    fn ticks(&self) -> u32;
    fn tr_set(&mut self, output: u8, on: bool);
    fn tr_pulse(&mut self, output: u8, duration_ms: u32);
    fn tr_pulse_clear(&mut self, output: u8);
    fn tr_pulse_time_remaining(&self, output: u8) -> u32;
    fn cv_set(&mut self, output: u8, volts: f32, slew: bool);
    fn set_cv_slew_time(&mut self, output: u8, rate_ms: u32);
    fn cv_off(&mut self, output: u8);
    fn cv_get(&self, output: u8) -> f32;
    fn input_state(&self, input: u8) -> bool;
    fn write_raw(&mut self, target: u8, value: i32);
    fn write_pattern(&mut self, pattern: u8, index: u8, value: i16);
    /// Requests an out-of-band ADC sample refresh ahead of the next
    /// `input_state`/pattern read, rather than waiting for the next
    /// scheduled poll.
    fn request_adc_update(&mut self);
    /// Whether the free-running metro script fired since this was last
    /// checked.
    fn metro_updated(&self) -> bool;
    fn metro_reset(&mut self);
}

/// Converts a raw 14-bit DAC code (`0..=16383`) to the `-5V..=5V` range the
/// hardware's bipolar CV outputs span.
fn raw14_to_volts(raw: i32) -> f32 {
    let clamped = raw.clamp(0, 16383) as f32;
    (clamped / 16383.0) * 10.0 - 5.0
}

/// Wraps the raw `*mut dyn ScriptHost` slot so it can live in a
/// `critical_section::Mutex` static. The pointer is only ever dereferenced
/// from inside a `critical_section::with` block (see `with_active`), which
/// on every supported target is equivalent to single-threaded access, so
/// the `Send`/`Sync` requirement the raw pointer can't express itself is
/// upheld by construction rather than by the type system.
struct ActiveEnginePtr(Option<*mut dyn ScriptHost>);

unsafe impl Send for ActiveEnginePtr {}

static ACTIVE_ENGINE: Mutex<RefCell<ActiveEnginePtr>> = Mutex::new(RefCell::new(ActiveEnginePtr(None)));

/// Installs `host` as the active engine for the lifetime of the guard,
/// restoring the previous one (possibly `None`) on drop.
pub struct ScopeGuard {
    previous: Option<*mut dyn ScriptHost>,
}

impl ScopeGuard {
    pub fn enter(host: &mut dyn ScriptHost) -> Self {
        // Safety: erasing the lifetime here is sound because `ScopeGuard`'s
        // `Drop` clears the slot before `host`'s borrow ends (the caller
        // holds `host` for at least as long as the guard lives, and the
        // guard is what controls the slot's contents).
        let ptr: *mut dyn ScriptHost = unsafe {
            core::mem::transmute::<&mut dyn ScriptHost, &'static mut dyn ScriptHost>(host)
        };
        let previous = critical_section::with(|cs| {
            ACTIVE_ENGINE.borrow(cs).replace(ActiveEnginePtr(Some(ptr))).0
        });
        Self { previous }
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        critical_section::with(|cs| {
            ACTIVE_ENGINE.borrow(cs).replace(ActiveEnginePtr(self.previous));
        });
    }
}

fn with_active<R>(f: impl FnOnce(&mut dyn ScriptHost) -> R) -> Option<R> {
    critical_section::with(|cs| {
        let ptr = ACTIVE_ENGINE.borrow(cs).borrow().0;
        // Safety: `ptr` is only ever set by `ScopeGuard::enter` from a live
        // `&mut dyn ScriptHost`, and cleared (by `Drop`) before that
        // reference's scope ends, so the pointer is always either null or
        // still valid here.
        ptr.map(|p| unsafe { f(&mut *p) })
    })
}

#[no_mangle]
pub extern "C" fn tele_get_ticks() -> u32 {
    with_active(|host| host.ticks()).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn tele_tr(output: i32, on: i32) {
    with_active(|host| host.tr_set(output as u8, on != 0));
}

#[no_mangle]
pub extern "C" fn tele_tr_pulse(output: i32, duration_ms: i32) {
    with_active(|host| host.tr_pulse(output as u8, duration_ms.max(0) as u32));
}

#[no_mangle]
pub extern "C" fn tele_tr_pulse_clear(output: i32) {
    with_active(|host| host.tr_pulse_clear(output as u8));
}

#[no_mangle]
pub extern "C" fn tele_tr_pulse_time(output: i32) -> i32 {
    with_active(|host| host.tr_pulse_time_remaining(output as u8) as i32).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn tele_cv(output: i32, v14bit: i32, slew: i32) {
    with_active(|host| host.cv_set(output as u8, raw14_to_volts(v14bit), slew != 0));
}

#[no_mangle]
pub extern "C" fn tele_cv_slew(output: i32, ms: i32) {
    with_active(|host| host.set_cv_slew_time(output as u8, ms.max(0) as u32));
}

#[no_mangle]
pub extern "C" fn tele_cv_off(output: i32) {
    with_active(|host| host.cv_off(output as u8));
}

#[no_mangle]
pub extern "C" fn tele_get_cv(output: i32) -> i32 {
    with_active(|host| (host.cv_get(output as u8) * 1000.0) as i32).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn tele_get_input_state(input: i32) -> i32 {
    with_active(|host| host.input_state(input as u8) as i32).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn tele_wr(target: i32, value: i32) {
    with_active(|host| host.write_raw(target as u8, value));
}

#[no_mangle]
pub extern "C" fn tele_wpat(pattern: i32, index: i32, value: i32) {
    with_active(|host| host.write_pattern(pattern as u8, index as u8, value as i16));
}

#[no_mangle]
pub extern "C" fn tele_update_adc() {
    with_active(|host| host.request_adc_update());
}

#[no_mangle]
pub extern "C" fn tele_metro_updated() -> i32 {
    with_active(|host| host.metro_updated() as i32).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn tele_metro_reset() {
    with_active(|host| host.metro_reset());
}

pub const TR_OUTPUT_COUNT: usize = 8;

/// Per-trigger-output millisecond countdown, driven by `tele_tr_pulse`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PulseTimers {
    remaining_ms: [u32; TR_OUTPUT_COUNT],
}

impl PulseTimers {
    pub fn start(&mut self, output: usize, duration_ms: u32) {
        if output < TR_OUTPUT_COUNT {
            self.remaining_ms[output] = duration_ms;
        }
    }

    pub fn clear(&mut self, output: usize) {
        if output < TR_OUTPUT_COUNT {
            self.remaining_ms[output] = 0;
        }
    }

    pub fn remaining(&self, output: usize) -> u32 {
        self.remaining_ms.get(output).copied().unwrap_or(0)
    }

    /// Advances every timer by `dt_ms`. Returns, per output, whether it
    /// expired exactly on this call (the edge the host forwards to the
    /// interpreter as a pulse-end event).
    pub fn tick(&mut self, dt_ms: u32) -> [bool; TR_OUTPUT_COUNT] {
        let mut expired = [false; TR_OUTPUT_COUNT];
        for (i, remaining) in self.remaining_ms.iter_mut().enumerate() {
            if *remaining == 0 {
                continue;
            }
            if *remaining <= dt_ms {
                *remaining = 0;
                expired[i] = true;
            } else {
                *remaining -= dt_ms;
            }
        }
        expired
    }
}

/// A free-running period timer whose period and enabled flag live in the
/// script scene-state; when the period elapses the host runs the metro
/// script.
#[derive(Clone, Copy, Debug)]
pub struct MetroState {
    pub enabled: bool,
    pub period_ms: u32,
    elapsed_ms: u32,
}

impl Default for MetroState {
    fn default() -> Self {
        Self { enabled: false, period_ms: 1000, elapsed_ms: 0 }
    }
}

impl MetroState {
    pub fn reset(&mut self) {
        self.elapsed_ms = 0;
    }

    /// Returns true the frame the period elapses (may fire more than once
    /// per call if `dt_ms` spans multiple periods).
    pub fn tick(&mut self, dt_ms: u32) -> u32 {
        if !self.enabled || self.period_ms == 0 {
            return 0;
        }
        self.elapsed_ms += dt_ms;
        let fires = self.elapsed_ms / self.period_ms;
        self.elapsed_ms %= self.period_ms;
        fires
    }
}

/// Installs the fixed boot script ("TR.PULSE 1") into the track's
/// configured boot slot. Called on reset, and again on pattern load when
/// `reset_metro_on_load` is set.
pub fn install_boot_script(track: &mut TeletypeTrack) {
    let slot = (track.boot_script.saturating_sub(1)) as usize % track.scripts.len();
    let mut script = Script::default();
    let _ = script.push_line(boot_line());
    track.scripts[slot] = script;
}

fn boot_line() -> String<64> {
    "TR.PULSE 1".parse().unwrap_or_default()
}
