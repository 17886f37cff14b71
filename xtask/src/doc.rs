use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Library crates in dependency order; `std` pulls the host mocks into the
/// platform docs.
const CRATES: &[&str] = &["platform", "playback", "tdeck"];

pub fn run(open: bool) -> Result<()> {
    println!();
    println!("{}", "📚 Building documentation...".cyan().bold());
    println!();

    let start = Instant::now();

    let mut cmd = Command::new("cargo");
    cmd.args(["doc", "--no-deps", "--features", "tdeck/std"]);
    for krate in CRATES {
        cmd.args(["-p", krate]);
    }
    if open {
        cmd.arg("--open");
    }

    let output = cmd.output().context("Failed to build documentation")?;

    if !output.status.success() {
        eprintln!("{}", "✗ Documentation build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("Documentation build failed");
    }

    let warnings = String::from_utf8_lossy(&output.stderr)
        .lines()
        .filter(|line| line.starts_with("warning:"))
        .count();
    let summary = format!(
        "✓ Documentation for {} crates built in {:.2}s",
        CRATES.len(),
        start.elapsed().as_secs_f64()
    );
    println!("{}", summary.green());
    if warnings > 0 {
        println!("{}", format!("  ⚠ {warnings} rustdoc warnings").yellow());
    }

    if !open {
        println!();
        for krate in CRATES {
            println!("   {}", format!("target/doc/{krate}/index.html").dimmed());
        }
    }
    println!();

    Ok(())
}
