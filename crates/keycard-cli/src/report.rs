//! Human and JSON output for CLI results.

use keycard_permissions::{
    CommonPermission, GateDecision, GrantMatcher, PermissionResult, PermissionSet, PermissionSpec,
};
use serde::Serialize;
use serde_json::json;
use std::io::{self, Write};
use std::process::ExitCode;

/// 0 when allowed, 1 otherwise.
pub fn exit_code(allowed: bool) -> ExitCode {
    if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

pub fn result_label(result: &PermissionResult) -> &'static str {
    if result.allowed {
        "allowed"
    } else if result.is_loading {
        "loading"
    } else if result.error.is_some() {
        "error"
    } else {
        "denied"
    }
}

pub fn gate_label(decision: &GateDecision) -> &'static str {
    match decision {
        GateDecision::Content => "content",
        GateDecision::Loading => "loading",
        GateDecision::Unauthorized => "unauthorized",
        GateDecision::Nothing => "nothing",
    }
}

pub fn print_result(specs: &[PermissionSpec], result: &PermissionResult, as_json: bool) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if as_json {
        #[derive(Serialize)]
        struct Report<'a> {
            specs: &'a [PermissionSpec],
            result: &'a PermissionResult,
        }
        let body = serde_json::to_string_pretty(&Report { specs, result })?;
        return writeln!(out, "{body}");
    }

    let names: Vec<String> = specs.iter().map(ToString::to_string).collect();
    match &result.error {
        Some(message) => writeln!(out, "{}: {} ({message})", result_label(result), names.join(", ")),
        None => writeln!(out, "{}: {}", result_label(result), names.join(", ")),
    }
}

pub fn print_gate(decision: &GateDecision, as_json: bool) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if as_json {
        writeln!(out, "{}", json!({ "render": gate_label(decision) }))
    } else {
        writeln!(out, "render: {}", gate_label(decision))
    }
}

pub fn print_common_table(as_json: bool) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if as_json {
        let table: serde_json::Map<String, serde_json::Value> = CommonPermission::ALL
            .iter()
            .map(|c| (c.as_str().to_string(), json!(c.spec())))
            .collect();
        return writeln!(out, "{}", serde_json::to_string_pretty(&table)?);
    }
    for common in CommonPermission::ALL {
        writeln!(out, "{:<26} {}", common.as_str(), common.spec())?;
    }
    Ok(())
}

pub fn print_grants(set: &PermissionSet, as_json: bool) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if as_json {
        return writeln!(out, "{}", serde_json::to_string_pretty(set)?);
    }
    writeln!(
        out,
        "{} grant(s), fetched {}",
        set.len(),
        set.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    for grant in &set.grants {
        writeln!(out, "  {}", GrantMatcher::describe(grant))?;
    }
    Ok(())
}
