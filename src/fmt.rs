//! Logging shims.
//!
//! The crate logs through these macros so that the backend is selected by
//! feature flag: `log`, `defmt` or `esp32-log` (raw `esp-println`). With no
//! backend enabled the macros expand to nothing but still borrow their
//! arguments, so call sites do not trip unused-variable lints.
#![allow(unused_macros)]

macro_rules! log_with {
    ($level:ident, $tag:literal, $s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "log")]
            ::log::$level!($s $(, $x)*);
            #[cfg(feature = "defmt")]
            ::defmt::$level!($s $(, $x)*);
            #[cfg(feature = "esp32-log")]
            ::esp_println::println!(concat!("[", $tag, "] ", $s) $(, $x)*);
            #[cfg(not(any(feature = "log", feature = "defmt", feature = "esp32-log")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! trace {
    ($s:literal $(, $x:expr)* $(,)?) => { log_with!(trace, "TRACE", $s $(, $x)*) };
}

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => { log_with!(debug, "DEBUG", $s $(, $x)*) };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => { log_with!(info, "INFO", $s $(, $x)*) };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => { log_with!(warn, "WARN", $s $(, $x)*) };
}

macro_rules! error {
    ($s:literal $(, $x:expr)* $(,)?) => { log_with!(error, "ERROR", $s $(, $x)*) };
}
