// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

// Control-plane logging. Expands to `tracing` on hosted builds and to nothing on bare metal.

macro_rules! evr_debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "std")]
        {
            tracing::debug!($($arg)*);
        }
    };
}

macro_rules! evr_info {
    ($($arg:tt)*) => {
        #[cfg(feature = "std")]
        {
            tracing::info!($($arg)*);
        }
    };
}

macro_rules! evr_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "std")]
        {
            tracing::warn!($($arg)*);
        }
    };
}
