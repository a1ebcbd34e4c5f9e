//! File formats accepted by the command-line adapter.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use blastgrid_core::{Inbound, Position, Tuning};
use serde::Deserialize;
use serde_json::Value;

/// Message kinds the engine understands; anything else becomes
/// [`Inbound::Unhandled`].
const KNOWN_KINDS: [&str; 5] = ["map", "self_position", "hazard", "eliminated", "unhandled"];

/// Loads tuning overrides from a TOML file, or the defaults without one.
pub(crate) fn load_tuning(path: Option<&Path>) -> Result<Tuning> {
    let Some(path) = path else {
        return Ok(Tuning::default());
    };
    let text =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    parse_tuning(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn parse_tuning(text: &str) -> Result<Tuning> {
    Ok(toml::from_str(text)?)
}

/// A live device given to the `plan` subcommand.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub(crate) struct HazardSpec {
    /// Placement position of the device.
    pub(crate) position: Position,
    /// Seconds until the device detonates.
    pub(crate) fuse_secs: f64,
}

/// Parses a JSON array of devices.
pub(crate) fn parse_hazards(text: &str) -> Result<Vec<HazardSpec>> {
    serde_json::from_str(text).context("hazard file must be a JSON array of devices")
}

/// One timed message of a replay script.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ScriptEntry {
    /// Seconds after the replay starts at which the message is delivered.
    pub(crate) at: f64,
    /// Message to deliver.
    pub(crate) message: Inbound,
}

/// Parses a JSON-lines replay script.
///
/// Every non-empty line is an inbound message object with an optional `at`
/// field. Lines whose `type` is unknown are kept as unhandled messages.
pub(crate) fn parse_script(text: &str) -> Result<Vec<ScriptEntry>> {
    let mut entries = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry = parse_line(line).with_context(|| format!("script line {}", index + 1))?;
        entries.push(entry);
    }
    entries.sort_by(|left, right| left.at.total_cmp(&right.at));
    Ok(entries)
}

fn parse_line(line: &str) -> Result<ScriptEntry> {
    let mut value: Value = serde_json::from_str(line)?;
    let Some(object) = value.as_object_mut() else {
        bail!("expected a JSON object");
    };
    let at = match object.remove("at") {
        Some(at) => at.as_f64().context("`at` must be a number of seconds")?,
        None => 0.0,
    };
    let Some(kind) = object.get("type").and_then(Value::as_str).map(str::to_owned) else {
        bail!("missing message `type`");
    };

    let message = if KNOWN_KINDS.contains(&kind.as_str()) {
        serde_json::from_value(value)?
    } else {
        Inbound::Unhandled { kind }
    };
    Ok(ScriptEntry { at, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use blastgrid_core::{HazardPhase, HazardTiming};

    #[test]
    fn config_overrides_only_named_fields() {
        let tuning = parse_tuning("max_depth = 6\nheat_map_weight = 0.25\n").expect("parse");
        assert_eq!(tuning.max_depth, 6);
        assert_eq!(tuning.heat_map_weight, Some(0.25));
        assert_eq!(tuning.blast_distance, Tuning::default().blast_distance);
    }

    #[test]
    fn config_rejects_unknown_fields() {
        assert!(parse_tuning("max_dept = 6\n").is_err());
    }

    #[test]
    fn hazards_decode_from_json() {
        let hazards =
            parse_hazards(r#"[{"position": {"x": 3, "y": 1}, "fuse_secs": 1.5}]"#).expect("parse");
        assert_eq!(
            hazards,
            vec![HazardSpec {
                position: Position::new(3, 1),
                fuse_secs: 1.5,
            }]
        );
    }

    #[test]
    fn script_lines_are_ordered_and_unknown_kinds_kept() {
        let script = r#"
# arena bootstrap
{"at": 0.5, "type": "hazard", "position": {"x": 1, "y": 1}, "timing": {"remaining_fuse": 2.0}, "phase": {"kind": "armed"}}
{"type": "map", "rows": "ggg\nggg\n"}
{"at": 0.2, "type": "scoreboard", "entries": []}
"#;
        let entries = parse_script(script).expect("parse");
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0].message,
            Inbound::Map {
                rows: "ggg\nggg\n".to_owned()
            }
        );
        assert_eq!(
            entries[1],
            ScriptEntry {
                at: 0.2,
                message: Inbound::Unhandled {
                    kind: "scoreboard".to_owned()
                },
            }
        );
        assert_eq!(
            entries[2].message,
            Inbound::Hazard {
                position: Position::new(1, 1),
                timing: HazardTiming::RemainingFuse(2.0),
                phase: HazardPhase::Armed,
            }
        );
    }

    #[test]
    fn malformed_known_kind_reports_line() {
        let error = parse_script("{\"type\": \"map\"}\n").expect_err("rows missing");
        assert!(format!("{error:#}").contains("script line 1"));
    }
}
