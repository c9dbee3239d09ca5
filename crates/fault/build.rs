// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::env;

const PROFILES: [(&str, &str); 6] = [
    ("thumbv6m", "armv6m"),
    ("thumbv7m", "armv7m"),
    ("thumbv7em", "armv7m"),
    ("thumbv8m.base", "armv8m_base"),
    ("thumbv8m.main", "armv8m_main"),
    ("thumbv8.1m.main", "armv81m_main"),
];

fn main() {
    for cfg in ["armv6m", "armv7m", "armv8m_base", "armv8m_main", "armv81m_main"] {
        println!("cargo:rustc-check-cfg=cfg({cfg})");
    }

    let target = env::var("TARGET").unwrap_or_default();
    if let Some((_, cfg)) = PROFILES.iter().find(|(prefix, _)| target.starts_with(prefix)) {
        println!("cargo:rustc-cfg={cfg}");
    }
}
