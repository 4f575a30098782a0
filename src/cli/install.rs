use super::{resolve_extension, GlobalOptions};
use xpm::core::{CancelFlag, XpmError, XpmResult};
use xpm::di::ServiceContainer;
use xpm::runner::{RunMode, RunReport, Runner, UpdateScope};

/// `xpm install <extension> [--update]` and `xpm update <extension>`
pub async fn run(
    options: &GlobalOptions,
    extension: &str,
    update: bool,
    cancel: CancelFlag,
) -> XpmResult<()> {
    let config = options.load_config()?;
    let extension_dir = resolve_extension(&config, extension)?;
    let container = ServiceContainer::new(config)?;

    let mode = if update {
        RunMode::Update(UpdateScope::All)
    } else {
        RunMode::Install
    };
    println!(
        "{} packages for {}...",
        if update { "Updating" } else { "Installing" },
        extension_dir.display()
    );

    let report = Runner::new(container)
        .with_cancel_flag(cancel)
        .run_extension(mode, &extension_dir)
        .await?;

    for line in summary_lines(&report) {
        println!("{}", line);
    }

    match &report.failed {
        Some(failed) => Err(XpmError::Package(failed.to_string())),
        None => Ok(()),
    }
}

/// Human-readable summary of a run, one change per line
pub fn summary_lines(report: &RunReport) -> Vec<String> {
    let mut lines = Vec::new();
    for warning in &report.warnings {
        lines.push(format!("  ⚠ {}", warning));
    }
    lines.extend(report.installed.iter().map(|p| format!("  + {}", p)));
    lines.extend(report.updated.iter().map(|p| format!("  ~ {}", p)));
    lines.extend(report.removed.iter().map(|p| format!("  - {}", p)));
    lines.extend(report.provided.iter().map(|p| format!("  = {} (provided)", p)));
    for name in &report.skipped_removals {
        lines.push(format!("  ! kept {}, still required", name));
    }

    if let Some(failed) = &report.failed {
        lines.push(format!("❌ {}", failed));
    } else if report.is_noop() {
        lines.push("✓ Nothing to install or update".to_string());
    } else {
        let changed = report.installed.len() + report.updated.len() + report.removed.len();
        lines.push(format!("✓ {} package(s) changed", changed));
        if report.lock_written {
            lines.push("  Lock file written".to_string());
        }
    }
    lines
}
