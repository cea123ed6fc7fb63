// build.rs

use chrono::Utc;

fn main() {
    // Stamp the binary so the startup log line identifies the build.
    let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    println!("cargo:rustc-env=BUILD_DATE={stamp}");
    println!("cargo:rerun-if-changed=build.rs");
}
