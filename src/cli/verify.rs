use super::{extension_vendor_dir, resolve_extension, GlobalOptions};
use xpm::core::{XpmError, XpmResult};
use xpm::package::{InstalledState, PackageVerifier};

/// `xpm verify <extension>`: compare installed trees with their recorded checksums
pub fn run(options: &GlobalOptions, extension: &str) -> XpmResult<()> {
    let config = options.load_config()?;
    let extension_dir = resolve_extension(&config, extension)?;
    let vendor = extension_vendor_dir(&config, &extension_dir);
    let state = InstalledState::load(&vendor)?;

    if state.is_empty() {
        println!("No packages to verify");
        return Ok(());
    }

    println!("Verifying {} package(s)...", state.len());
    let result = PackageVerifier::verify_installed(&state, &vendor);

    if result.is_success() {
        println!("✓ All packages verified successfully");
        println!("  {} package(s) verified", result.successful.len());
        return Ok(());
    }

    println!("❌ Verification failed");
    println!("  {} package(s) verified", result.successful.len());
    println!("  {} package(s) failed", result.failed.len());
    for (package, error) in &result.failed {
        println!("  ❌ {}: {}", package, error);
    }

    Err(XpmError::Package(format!(
        "Verification failed for {} package(s)",
        result.failed.len()
    )))
}
