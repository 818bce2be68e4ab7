use std::path::Path;
use std::process::Command;

use anyhow::Result;
use tracing::warn;

use loadsweep::affinity::AffinityMask;
use loadsweep::config::SweepConfig;

fn check_tool(name: &str) -> bool {
    if name.contains('/') {
        return Path::new(name).is_file();
    }
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

// MASKS OUTSIDE OUR OWN AFFINITY STILL LAUNCH, THE KERNEL JUST REFUSES THE PIN
fn check_masks(config: &SweepConfig) {
    let allowed = match AffinityMask::current() {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "could not read own cpu affinity, mask check skipped");
            return;
        }
    };
    let masks = config.load_cpus.iter().chain(&config.service_cpus);
    for mask in masks {
        if mask.is_subset_of(&allowed) {
            println!("  cpus {:<19}OK", mask.to_string());
        } else {
            println!("  cpus {:<19}NOT IN ALLOWED SET ({})", mask.to_string(), allowed);
        }
    }
}

/// Prints one line per prerequisite. False if any target file or the
/// generator binary is missing.
pub fn check_prereqs(config: &SweepConfig) -> bool {
    let mut ok = true;

    let generator = &config.generator.binary;
    if check_tool(generator) {
        println!("  {:<24}OK", generator);
    } else {
        println!("  {:<24}MISSING", generator);
        ok = false;
    }

    let missing = config.missing_targets();
    for target in &config.targets {
        let path = target.path.as_path();
        if missing.contains(&path) {
            println!("  {:<24}MISSING ({})", target.description, path.display());
            ok = false;
        } else {
            println!("  {:<24}OK", target.description);
        }
    }

    check_masks(config);
    ok
}

pub fn run_check(config: &SweepConfig) -> Result<()> {
    println!("LOADSWEEP PREREQUISITE CHECK");
    println!();

    let ok = check_prereqs(config);
    println!();

    if ok {
        println!("ALL CHECKS PASSED");
    } else {
        println!("SOME CHECKS FAILED");
        if !check_tool(&config.generator.binary) {
            println!("  Install wrk: https://github.com/wg/wrk");
        }
        if !config.missing_targets().is_empty() {
            println!("  Build the target services or fix [[targets]] paths");
        }
        std::process::exit(1);
    }

    Ok(())
}
