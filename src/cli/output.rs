//! Rendering results for humans and scripts.

use std::io::{self, Write};

use super::args::OutputFormat;
use super::inventory::Check;
use crate::outcome::ValidationResult;

#[derive(serde::Serialize)]
struct TargetRecord<'a> {
    target: &'a str,
    #[serde(flatten)]
    result: &'a ValidationResult,
}

#[derive(serde::Serialize)]
struct CheckRecord<'a> {
    name: &'a str,
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pass: Option<bool>,
    #[serde(flatten)]
    result: &'a ValidationResult,
}

/// Write one command-line result.
///
/// Human mode puts accepted results on stdout and everything else on
/// stderr; JSON mode writes one object per line to stdout.
pub fn write_result(
    format: OutputFormat,
    target: &str,
    result: &ValidationResult,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            let line = serde_json::to_string(&TargetRecord { target, result })?;
            writeln!(stdout, "{line}")
        }
        OutputFormat::Human if result.is_accepted() => writeln!(stdout, "{target}: {result}"),
        OutputFormat::Human => writeln!(stderr, "{target}: {result}"),
    }
}

/// Write one inventory check with its verdict. Failed expectations go to
/// stderr in human mode.
pub fn write_check(
    format: OutputFormat,
    check: &Check,
    result: &ValidationResult,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> io::Result<()> {
    let pass = check.passes(result);
    let target = match check.port {
        Some(port) => format!("{}:{}", check.host, port),
        None => check.host.clone(),
    };
    match format {
        OutputFormat::Json => {
            let record = CheckRecord {
                name: &check.name,
                target,
                expect: check.expect.map(|e| e.to_string()),
                pass,
                result,
            };
            writeln!(stdout, "{}", serde_json::to_string(&record)?)
        }
        OutputFormat::Human => {
            let verdict = match pass {
                Some(true) => "PASS",
                Some(false) => "FAIL",
                None => "----",
            };
            let line = match check.expect {
                Some(expect) if pass == Some(false) => {
                    format!("{verdict} {} ({target}): expected {expect}, got {result}", check.name)
                }
                _ => format!("{verdict} {} ({target}): {result}", check.name),
            };
            if pass == Some(false) {
                writeln!(stderr, "{line}")
            } else {
                writeln!(stdout, "{line}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::inventory::Inventory;
    use crate::outcome::RejectReason;

    fn render(format: OutputFormat, result: &ValidationResult) -> (String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_result(format, "192.0.2.1:161", result, &mut out, &mut err).unwrap();
        (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn human_splits_streams() {
        let (out, err) = render(OutputFormat::Human, &ValidationResult::Accepted { value: "Linux".into() });
        assert_eq!(out, "192.0.2.1:161: credentials accepted: Linux\n");
        assert!(err.is_empty());

        let rejected = ValidationResult::Rejected {
            reason: RejectReason::WrongCommunity,
        };
        let (out, err) = render(OutputFormat::Human, &rejected);
        assert!(out.is_empty());
        assert!(err.contains("community string not accepted"));
    }

    #[test]
    fn json_is_one_object_per_line() {
        let (out, err) = render(
            OutputFormat::Json,
            &ValidationResult::Rejected {
                reason: RejectReason::WrongPrivKey,
            },
        );
        assert!(err.is_empty());
        let value: serde_json::Value = serde_json::from_str(out.trim_end()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"target": "192.0.2.1:161", "outcome": "rejected", "reason": "wrong_priv_key"})
        );
    }

    #[test]
    fn check_verdicts() {
        let inventory = Inventory::from_yaml(
            "checks:\n  - name: edge\n    host: 192.0.2.9\n    version: 2c\n    community: public\n    expect: accepted\n",
        )
        .unwrap();
        let check = &inventory.checks[0];

        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_check(OutputFormat::Human, check, &ValidationResult::Timeout, &mut out, &mut err).unwrap();
        let err = String::from_utf8(err).unwrap();
        assert!(out.is_empty());
        assert!(err.starts_with("FAIL edge (192.0.2.9): expected accepted"));

        let mut out = Vec::new();
        let accepted = ValidationResult::Accepted { value: "x".into() };
        write_check(OutputFormat::Json, check, &accepted, &mut out, &mut io::sink()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["pass"], true);
        assert_eq!(value["expect"], "accepted");
        assert_eq!(value["outcome"], "accepted");
    }
}
