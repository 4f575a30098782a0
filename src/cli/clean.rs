use super::GlobalOptions;
use xpm::cache::Cache;
use xpm::core::XpmResult;

/// `xpm clean-cache`: drop cached archives and indexes by age, then by size
pub fn run(options: &GlobalOptions, max_age_days: u64, max_size_mb: u64) -> XpmResult<()> {
    let config = options.load_config()?;
    let cache = Cache::new(config.get_cache_dir()?)?;

    println!("Cleaning cache at {}...", cache.root().display());
    let result = cache.clean(max_age_days, max_size_mb)?;

    if result.files_removed == 0 {
        println!("✓ Cache already clean");
    } else {
        println!(
            "✓ Removed {} file(s), freed {:.1} MB",
            result.files_removed,
            result.bytes_freed as f64 / (1024.0 * 1024.0)
        );
    }
    Ok(())
}
