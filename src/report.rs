use colored::{Color, Colorize};

use crate::error::ScenarioError;
use crate::scenario::{ScenarioReport, UnitReport};

pub fn print_scenario_report(report: &ScenarioReport) {
    let (label, color) = if report.ok() {
        ("PASS", Color::Green)
    } else {
        ("FAIL", Color::Red)
    };
    println!("{} {}", label.color(color).bold(), report.title.bold());

    for unit in &report.units {
        print_unit(unit);
    }
    for title in &report.skipped {
        println!("  {} {}", "-".dimmed(), format!("{title} (skipped)").dimmed());
    }
}

pub fn print_scenario_error(title: &str, err: &ScenarioError) {
    println!("{} {}", "ERROR".red().bold(), title.bold());
    println!("  {}", err.to_string().red());
}

fn print_unit(unit: &UnitReport) {
    let marker = if unit.ok() {
        "✓".green()
    } else {
        "✗".red()
    };
    let mut line = format!(
        "  {} {} {}",
        marker,
        unit.method.as_str().bold(),
        unit.url.cyan()
    );
    if unit.title != format!("{}:{}", unit.method, unit.url) {
        line.push_str(&format!(" {}", unit.title.dimmed()));
    }
    if let Some(ms) = unit.duration_ms {
        line.push_str(&format!(" {}", format!("({ms:.1} ms)").dimmed()));
    }
    if unit.attempts > 1 {
        line.push_str(&format!(
            " {}",
            format!("[{} attempts]", unit.attempts).yellow()
        ));
    }
    println!("{line}");

    for failure in &unit.failures {
        println!("      {}", failure.to_string().red());
    }
    if !unit.saved_vars.is_empty() {
        println!(
            "      {} {}",
            "saved:".dimmed(),
            unit.saved_vars.join(", ").dimmed()
        );
    }
}
