use clap::Parser;
use remora_cli::commands::{Cmd, Command as _};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// One class whose constructor calls a boolean predicate reading an int field.
fn version(class: &str, predicate: &str, field: &str) -> String {
    format!(
        r#"{{
  "classes": [
    {{
      "name": "{class}",
      "super_name": "java/lang/Object",
      "fields": [{{"name": "{field}", "desc": "I"}}],
      "methods": [
        {{"name": "<init>", "desc": "()V", "instructions": [
          {{"kind": "var", "opcode": "ALOAD", "var": 0}},
          {{"kind": "invoke", "opcode": "INVOKEVIRTUAL", "owner": "{class}", "name": "{predicate}", "desc": "()Z"}},
          {{"kind": "op", "opcode": "POP"}},
          {{"kind": "op", "opcode": "RETURN"}}
        ]}},
        {{"name": "{predicate}", "desc": "()Z", "instructions": [
          {{"kind": "var", "opcode": "ALOAD", "var": 0}},
          {{"kind": "field", "opcode": "GETFIELD", "owner": "{class}", "name": "{field}", "desc": "I"}},
          {{"kind": "op", "opcode": "IRETURN"}}
        ]}}
      ]
    }}
  ]
}}"#
    )
}

const MAPPING: &str = r#"[
  {
    "name": "Gate",
    "obfuscatedName": "c",
    "fields": [
      {"name": "openCount", "obfuscatedName": "f", "owner": "Gate", "ownerObfuscatedName": "c", "descriptor": "I", "isStatic": false}
    ],
    "methods": [
      {"name": "isOpen", "obfuscatedName": "a", "owner": "Gate", "ownerObfuscatedName": "c", "descriptor": "()Z", "isStatic": false}
    ]
  }
]"#;

fn workspace() -> anyhow::Result<TempDir> {
    let tmp = TempDir::new()?;
    fs::write(tmp.path().join("old.json"), version("c", "a", "f"))?;
    fs::write(tmp.path().join("new.json"), version("d", "b", "g"))?;
    fs::write(tmp.path().join("old-mapping.json"), MAPPING)?;
    Ok(tmp)
}

fn arg(path: &Path) -> anyhow::Result<&str> {
    path.to_str().ok_or_else(|| anyhow::anyhow!("Invalid path"))
}

#[test]
fn e2e_remap_carries_names() -> anyhow::Result<()> {
    let tmp = workspace()?;
    let dir = tmp.path();
    let out = dir.join("new-mapping.json");
    let report = dir.join("report.json");

    let output = Command::new(env!("CARGO_BIN_EXE_remora"))
        .args([
            "remap",
            arg(&dir.join("old.json"))?,
            arg(&dir.join("new.json"))?,
            "--mappings",
            arg(&dir.join("old-mapping.json"))?,
            "-o",
            arg(&out)?,
            "--emit",
            arg(&report)?,
            "--neighbor-weight",
            "0.4",
        ])
        .output()?;
    if !output.status.success() {
        anyhow::bail!("remora remap failed: {}", String::from_utf8_lossy(&output.stderr));
    }
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("c.a()Z -> d.b()Z"), "{stdout}");

    let mapping: Value = serde_json::from_str(&fs::read_to_string(&out)?)?;
    let gate = &mapping[0];
    assert_eq!(gate["name"], "Gate");
    assert_eq!(gate["obfuscatedName"], "d");
    let is_open = gate["methods"]
        .as_array()
        .and_then(|ms| ms.iter().find(|m| m["obfuscatedName"] == "b"))
        .ok_or_else(|| anyhow::anyhow!("b missing from mapping"))?;
    assert_eq!(is_open["name"], "isOpen");
    assert_eq!(is_open["owner"], "Gate");
    assert_eq!(gate["fields"][0]["name"], "openCount");

    let report: Value = serde_json::from_str(&fs::read_to_string(&report)?)?;
    assert_eq!(report["carry"]["methodsCarried"], 1);
    assert_eq!(report["carry"]["fieldsCarried"], 1);
    Ok(())
}

#[test]
fn e2e_rejects_bad_neighbor_weight() -> anyhow::Result<()> {
    let tmp = workspace()?;
    let dir = tmp.path();
    let status = Command::new(env!("CARGO_BIN_EXE_remora"))
        .args([
            "remap",
            arg(&dir.join("old.json"))?,
            arg(&dir.join("new.json"))?,
            "--neighbor-weight",
            "1.5",
        ])
        .status()?;
    assert!(!status.success());
    Ok(())
}

#[derive(Parser)]
struct Harness {
    #[command(subcommand)]
    command: Cmd,
}

#[tokio::test]
async fn callgraph_writes_dot() -> anyhow::Result<()> {
    let tmp = workspace()?;
    let dot = tmp.path().join("graph.dot");
    let harness = Harness::try_parse_from([
        "remora",
        "callgraph",
        arg(&tmp.path().join("new.json"))?,
        "-o",
        arg(&dot)?,
    ])?;
    harness
        .command
        .execute()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let text = fs::read_to_string(&dot)?;
    assert!(text.starts_with("digraph"));
    assert!(text.contains("d.b()Z"));
    Ok(())
}

#[test]
fn fingerprint_lists_live_methods() -> anyhow::Result<()> {
    let tmp = workspace()?;
    let output = Command::new(env!("CARGO_BIN_EXE_remora"))
        .args(["fingerprint", arg(&tmp.path().join("old.json"))?])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.split_whitespace().next().map(str::len) == Some(64)));
    assert!(lines.iter().any(|l| l.ends_with("c.a()Z")));
    Ok(())
}
