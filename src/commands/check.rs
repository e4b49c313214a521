//! Check command implementation.
//!
//! Validates that process stats can be read and that the configuration is valid.

use peekprof::process::{default_source, is_alive};

use crate::config::{validate_effective_config, Config};

/// Reads one sample of `pid` (the profiler itself by default) and validates
/// the configuration. Returns whether every check passed.
pub fn command_check(pid: Option<u32>, config: &Config) -> bool {
    println!("peekprof - System Check");
    println!("=======================");

    let mut all_ok = true;
    let pid = pid.unwrap_or_else(std::process::id);
    let source = default_source();

    println!("\nChecking process {}...", pid);
    if !is_alive(pid) {
        println!("   [FAIL] Process {} does not exist", pid);
        all_ok = false;
    } else {
        match source.get_stats(pid) {
            Ok(sample) => {
                println!(
                    "   [ OK ] RSS={} kb, RSS+Swap={} kb, CPU={:.1}%",
                    sample.rss_kb(),
                    sample.rss_swap_kb(),
                    sample.cpu_percent()
                );
            }
            Err(e) => {
                println!("   [FAIL] Reading stats failed: {}", e);
                all_ok = false;
            }
        }
        match source.process_name(pid) {
            Some(name) => println!("   [ OK ] Process name: {}", name),
            None => println!("   [WARN] Process name unavailable"),
        }
        if !source.supports_swap() {
            println!("   [WARN] Swap is not reported on this platform");
        }
    }

    println!("\nChecking configuration...");
    match validate_effective_config(config) {
        Ok(()) => println!("   [ OK ] Configuration is valid"),
        Err(e) => {
            println!("   [FAIL] Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\nSummary:");
    if all_ok {
        println!("   All checks passed");
    } else {
        println!("   Some checks failed");
    }
    all_ok
}
