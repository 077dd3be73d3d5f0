//! Fault Injection Hardening
//!
//! A single glitched branch must not turn a rejected pointer or id into an
//! accepted one. `fault_assert!` evaluates a condition that already passed a
//! first check a second time, separated by a compiler fence.

/// Re-evaluate a security condition that has already been checked.
///
/// Both evaluations must hold. Otherwise the secure world stops through
/// [`fault_detected`].
#[macro_export]
macro_rules! fault_assert {
    ($cond:expr) => {{
        let first: bool = $cond;
        ::core::sync::atomic::compiler_fence(::core::sync::atomic::Ordering::SeqCst);
        let second: bool = $cond;
        if !(first && second) {
            $crate::security::fault_detected(::core::stringify!($cond));
        }
    }};
}

/// Stop after a failed fault assertion.
#[cold]
#[inline(never)]
pub fn fault_detected(condition: &'static str) -> ! {
    log::error!("fault detected: `{}` did not hold on re-check", condition);
    panic!("fault assertion failed: {}", condition);
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_holding_condition_passes() {
        let len = 4usize;
        crate::fault_assert!(len < 8);
    }

    #[test]
    #[should_panic(expected = "fault assertion failed")]
    fn test_failing_condition_stops() {
        let len = 9usize;
        crate::fault_assert!(len < 8);
    }
}
