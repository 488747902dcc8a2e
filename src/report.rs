//! Report rendering for finished analyses.
//!
//! Terminal output uses colored; exports are plain Markdown.

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use std::fmt::Write;
use std::io;
use std::path::Path;

use crate::analysis::{AnalysisResult, RiskLevel};

pub const DISCLAIMER: &str =
    "ContractClarity AI is not a lawyer. This report is for informational purposes only and is not legal advice.";

fn risk_badge(level: RiskLevel) -> ColoredString {
    let label = format!(" {} Risk ", level).bold();
    match level {
        RiskLevel::Low => label.black().on_green(),
        RiskLevel::Medium => label.black().on_yellow(),
        RiskLevel::High => label.white().on_red(),
    }
}

fn risk_dot(level: RiskLevel) -> ColoredString {
    match level {
        RiskLevel::Low => "●".green(),
        RiskLevel::Medium => "●".yellow(),
        RiskLevel::High => "●".red(),
    }
}

/// Print the analysis to stdout
pub fn print_report(result: &AnalysisResult) {
    let overview = &result.overview;

    println!("=== {} ===\n", overview.contract_type.bold());
    println!("🛡️  Mainly protects: {}", overview.who_it_mainly_protects);
    println!("🗣️  Tone: {}\n", overview.overall_tone);

    println!(
        "⚖️  Verdict {}",
        risk_badge(result.summary.overall_risk_level)
    );
    println!("  {}\n", result.summary.plain_verdict);

    if !result.red_flags.is_empty() {
        println!("{}", "🚩 Red Flags:".red().bold());
        for flag in &result.red_flags {
            println!("  • {}", flag);
        }
        println!();
    }

    let high = result.clauses_at(RiskLevel::High).count();
    if high > 0 {
        println!("📑 Clauses ({}, {} high risk):", result.clauses.len(), high);
    } else {
        println!("📑 Clauses ({}):", result.clauses.len());
    }
    for clause in &result.clauses {
        println!(
            "\n  {} {} {}",
            risk_dot(clause.risk_level),
            clause.title.bold(),
            risk_badge(clause.risk_level)
        );
        println!("    {} {}", "What this means:".dimmed(), clause.what_it_means);
        println!("    {} {}", "Why it matters:".dimmed(), clause.why_it_matters);
        if let Some(caveat) = clause.caveat() {
            println!("    {} \"{}\"", "⚠️  Watch out if:".yellow(), caveat);
        }
    }

    if !result.checklist.is_empty() {
        println!("\n✅ Before you sign:");
        for item in &result.checklist {
            println!("  [ ] {}", item);
        }
    }

    if let Some(sources) = result.sources.as_deref().filter(|s| !s.is_empty()) {
        println!("\n🔗 Sources:");
        for source in sources {
            println!("  • {} ({})", source.title, source.uri.underline());
        }
    }

    println!("\n{}", DISCLAIMER.italic().dimmed());
}

/// Render the analysis as a Markdown document
pub fn to_markdown(
    result: &AnalysisResult,
    generated_at: DateTime<Utc>,
) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    let overview = &result.overview;

    writeln!(out, "# Contract Report: {}\n", overview.contract_type)?;
    writeln!(
        out,
        "_Generated {}_\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    )?;

    writeln!(out, "## Overview\n")?;
    writeln!(out, "- **Contract type:** {}", overview.contract_type)?;
    writeln!(out, "- **Mainly protects:** {}", overview.who_it_mainly_protects)?;
    writeln!(out, "- **Tone:** {}\n", overview.overall_tone)?;

    writeln!(out, "## Verdict\n")?;
    writeln!(
        out,
        "**Overall risk: {}**\n",
        result.summary.overall_risk_level
    )?;
    writeln!(out, "{}\n", result.summary.plain_verdict)?;

    writeln!(out, "## Red Flags\n")?;
    if result.red_flags.is_empty() {
        writeln!(out, "No red flags found.\n")?;
    } else {
        for flag in &result.red_flags {
            writeln!(out, "- {}", flag)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "## Clauses\n")?;
    for clause in &result.clauses {
        writeln!(out, "### {} ({} Risk)\n", clause.title, clause.risk_level)?;
        writeln!(out, "**What this means:** {}\n", clause.what_it_means)?;
        writeln!(out, "**Why it matters:** {}\n", clause.why_it_matters)?;
        if let Some(caveat) = clause.caveat() {
            writeln!(out, "> **Watch out if:** {}\n", caveat)?;
        }
    }

    writeln!(out, "## Checklist\n")?;
    for item in &result.checklist {
        writeln!(out, "- [ ] {}", item)?;
    }
    writeln!(out)?;

    if let Some(sources) = result.sources.as_deref().filter(|s| !s.is_empty()) {
        writeln!(out, "## Sources\n")?;
        for source in sources {
            writeln!(out, "- [{}]({})", source.title, source.uri)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "---\n\n_{}_", DISCLAIMER)?;
    Ok(out)
}

/// Write an exported report, creating the parent directory.
///
/// An existing file is replaced only with `force` or when `confirm` agrees.
/// Returns whether the file was written.
pub fn save_export<E: From<io::Error>>(
    path: &Path,
    contents: &str,
    force: bool,
    confirm: impl FnOnce(&Path) -> Result<bool, E>,
) -> Result<bool, E> {
    if path.exists() && !force && !confirm(path)? {
        return Ok(false);
    }
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, contents)?;
    Ok(true)
}

/// File name for an exported report, e.g. `ContractClarity_Lease_Agreement.md`.
///
/// Runs of non-alphanumeric characters collapse into one underscore.
pub fn export_file_name(contract_type: &str) -> String {
    let mut name = String::with_capacity(contract_type.len());
    for ch in contract_type.chars() {
        if ch.is_alphanumeric() {
            name.push(ch);
        } else if !name.is_empty() && !name.ends_with('_') {
            name.push('_');
        }
    }
    let name = name.trim_end_matches('_');

    if name.is_empty() {
        "ContractClarity_Report.md".to_string()
    } else {
        format!("ContractClarity_{}.md", name)
    }
}
