mod archive;
mod args;
mod context;
mod error;
mod interrupt;
mod manifest;
mod pack;
mod result;
mod selector;
mod staging;
mod utils;

use args::{Action, Args};
use context::Context;
use error::Error;
use interrupt::Interrupt;
use manifest::Release;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        let code = match e {
            Error::Interrupted => 130,
            _ => 1,
        };
        std::process::exit(code);
    }
}

fn run() -> result::Result<()> {
    // Parse command-line arguments
    let Args {
        action,
        verbose,
        path,
    } = Args::parse();

    // Malformed exclusion rules are reported before anything touches the disk
    let release = Release::embedded()?;

    let project_root = utils::find_project_root(path.as_deref())?;
    let ctx = Context::new(project_root, verbose).with_interrupt(Interrupt::install()?);

    cliclack::intro(&release.title)?;

    match action {
        Action::Build => build(&ctx, &release),
        Action::Clean => clean(&ctx, &release),
    }
}

fn build(ctx: &Context, release: &Release) -> result::Result<()> {
    cliclack::log::step(format!(
        "Packaging {} from {}",
        release.title,
        ctx.project_root.display()
    ))?;

    if ctx.verbose {
        for pattern in release.selector.patterns() {
            println!("Excluding {}", pattern.as_str());
        }
    }

    let spinner = cliclack::spinner();
    spinner.start("Creating zip archive...");

    let report = match pack::build(ctx, release) {
        Ok(report) => report,
        Err(e) => {
            spinner.error("Failed to create archive");
            return Err(e);
        }
    };
    spinner.stop(format!(
        "Staged {} files, archived {}",
        report.staged, report.archived
    ));

    cliclack::outro(format!("Created {}", report.artifact.display()))?;
    Ok(())
}

fn clean(ctx: &Context, release: &Release) -> result::Result<()> {
    let removed = pack::clean(ctx, release)?;

    if ctx.verbose {
        for path in &removed {
            println!("Removed {}", path.display());
        }
    }

    if removed.is_empty() {
        cliclack::outro("Nothing to clean")?;
    } else {
        cliclack::outro(format!("Cleaned {} release outputs", removed.len()))?;
    }
    Ok(())
}
