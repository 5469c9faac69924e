//! Environment readiness check.

use crate::cli::output::check_output_dir;
use crate::config::RunConfig;
use crate::renderer::chromium::find_chromium;
use answer_scribe::LocatorTable;
use anyhow::Result;
use std::path::Path;

/// Report on Chromium, the output directory and the locator table.
/// Returns whether a live run can start.
pub fn run(config: &RunConfig, locators: &LocatorTable, output_dir: &Path) -> Result<bool> {
    println!("Scribe Doctor");
    println!("=============");
    println!();

    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!("Site: {}", config.site_url);
    println!();

    let chromium = find_chromium(config.chromium_path.as_deref());
    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome or set SCRIBE_CHROMIUM_PATH."
        ),
    }

    let output_ok = match check_output_dir(output_dir) {
        Ok(()) => {
            println!("[OK] Output directory {} is writable", output_dir.display());
            true
        }
        Err(e) => {
            println!("[!!] Output directory {} unusable: {e}", output_dir.display());
            false
        }
    };

    let problems = locators.validate();
    if problems.is_empty() {
        println!("[OK] Locator table: every selector parses");
    } else {
        for p in &problems {
            println!("[!!] {p}");
        }
    }

    println!();
    let ready = chromium.is_some() && output_ok && problems.is_empty();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(ready)
}

#[cfg(test)]
mod tests {
    use super::*;
    use answer_scribe::Role;

    #[test]
    fn test_bad_locator_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let mut locators = LocatorTable::bohrium();
        locators.set(Role::PromptInput, ["textarea[["]);
        let ready = run(&RunConfig::default(), &locators, dir.path()).unwrap();
        assert!(!ready);
    }
}
