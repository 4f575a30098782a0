use super::{extension_vendor_dir, resolve_extension, GlobalOptions};
use xpm::core::path::package_dir;
use xpm::core::XpmResult;
use xpm::package::InstalledState;

/// `xpm list <extension>`: installed packages, one `name version` per line
pub fn run(options: &GlobalOptions, extension: &str) -> XpmResult<()> {
    let config = options.load_config()?;
    let extension_dir = resolve_extension(&config, extension)?;
    let vendor = extension_vendor_dir(&config, &extension_dir);
    let state = InstalledState::load(&vendor)?;

    if state.is_empty() {
        println!("No packages installed.");
        return Ok(());
    }

    for (name, installed) in &state.packages {
        if package_dir(&vendor, name).is_dir() {
            println!("{} {}", name, installed.version);
        } else {
            println!("{} {} (missing)", name, installed.version);
        }
    }
    Ok(())
}
