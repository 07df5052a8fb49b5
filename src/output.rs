//! Output formatting module
//!
//! Human-readable tables for the console and `ps`, JSON through serde_json.

use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;

use locker::models::{GuardStatus, ProcessInstance, ProcessMatch, ProcessName, ProtectedProgram};

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Process search hits, best match first
pub fn format_matches(matches: &[ProcessMatch]) -> String {
    if matches.is_empty() {
        return "No matching processes found.\n".to_string();
    }

    let width = matches.iter().map(|m| m.name.as_str().len()).max().unwrap_or(0).max(4);
    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:>6}  PIDS", "NAME", "MATCH", width = width);
    for hit in matches {
        let pids: Vec<String> = hit.pids.iter().map(u32::to_string).collect();
        let _ = writeln!(
            out,
            "{:<width$}  {:>5.0}%  {}",
            hit.name,
            hit.similarity,
            pids.join(", "),
            width = width
        );
    }
    let _ = writeln!(out, "\n{} program(s) found", matches.len());
    out
}

pub fn format_protected(programs: &[ProtectedProgram]) -> String {
    if programs.is_empty() {
        return "No programs are protected.\n".to_string();
    }

    let width = programs.iter().map(|p| p.name.as_str().len()).max().unwrap_or(0).max(4);
    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:<8}  PASSWORD", "NAME", "STATE", width = width);
    for program in programs {
        let _ = writeln!(
            out,
            "{:<width$}  {:<8}  {}",
            program.name,
            program.state,
            program.password,
            width = width
        );
    }
    out
}

fn format_instances(out: &mut String, label: &str, instances: &[ProcessInstance]) {
    let _ = writeln!(out, "  {}: {}", label, instances.len());
    for instance in instances {
        let _ = writeln!(out, "    {}", instance);
    }
}

pub fn format_status(status: &GuardStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Guard Status:");
    let _ = writeln!(out, "  Protected programs: {}", status.protected.len());
    format_instances(&mut out, "Queued", &status.queued);
    format_instances(&mut out, "Locked", &status.suspended);
    format_instances(&mut out, "Unlocked", &status.resumed);
    let _ = writeln!(out, "  Running processes: {}", status.running_processes);
    out
}

/// Console notice for programs that were just locked
pub fn format_locked_notice(names: &[ProcessName]) -> String {
    let list: Vec<&str> = names.iter().map(ProcessName::as_str).collect();
    format!(
        "🔒 {} locked. Enter its password to unlock (or `unlock <password>`).\n",
        list.join(", ")
    )
}

pub fn format_unlocked(names: &[ProcessName]) -> String {
    if names.is_empty() {
        return "❌ Wrong password.\n".to_string();
    }
    let list: Vec<&str> = names.iter().map(ProcessName::as_str).collect();
    format!("🔓 Unlocked {}\n", list.join(", "))
}
