use chrono::Utc;
use serde_json::json;

use hangar_store::notes::Note;
use hangar_store::sessions::Session;

/// Render a session's notes as a Markdown document for copy/paste into
/// other systems.
pub fn render_markdown(session: &Session, notes: &[Note]) -> String {
    let mut lines: Vec<String> = vec![
        format!("# {}", session.name),
        String::new(),
        format!("**Session ID:** {}", session.id),
        format!("**Started:** {}", session.started_at.to_rfc3339()),
        format!("**Status:** {}", session.status),
        String::new(),
        "---".to_string(),
        String::new(),
        "## Notes".to_string(),
        String::new(),
    ];

    for note in notes {
        let speaker = note.speaker.as_deref().unwrap_or("Unknown");
        lines.push(format!(
            "### [{}] {speaker}",
            note.timestamp.format("%H:%M:%S")
        ));
        lines.push(String::new());
        lines.push(note.content.clone());
        lines.push(String::new());

        if let Some(snapshot) = &note.telemetry_snapshot {
            if !snapshot.is_empty() {
                lines.push(format!(
                    "**Telemetry:** {}",
                    serde_json::Value::Object(snapshot.clone())
                ));
                lines.push(String::new());
            }
        }
        if !note.tags.is_empty() {
            lines.push(format!("*Tags: {}*", note.tags.join(", ")));
            lines.push(String::new());
        }

        lines.push("---".to_string());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Render the JSON export document.
pub fn render_json(session: &Session, notes: &[Note]) -> serde_json::Value {
    json!({
        "session_id": session.id,
        "session_name": session.name,
        "exported_at": Utc::now(),
        "notes": notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use hangar_core::ids::{NoteId, SessionId};
    use hangar_store::notes::NoteKind;
    use hangar_store::sessions::SessionStatus;

    fn session() -> Session {
        Session {
            id: SessionId::from_raw("sess_export"),
            name: "Rover Test".into(),
            description: None,
            status: SessionStatus::Active,
            started_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            ended_at: None,
        }
    }

    fn note(content: &str, tags: Vec<String>) -> Note {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 5, 30).unwrap();
        Note {
            id: NoteId::from_raw("note_export"),
            session_id: SessionId::from_raw("sess_export"),
            timestamp: at,
            speaker: Some("operator".into()),
            content: content.into(),
            kind: NoteKind::Observation,
            tags,
            telemetry_snapshot: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn markdown_contains_header_and_note() {
        let md = render_markdown(&session(), &[note("motor start", vec!["power".into()])]);
        assert!(md.starts_with("# Rover Test"));
        assert!(md.contains("**Session ID:** sess_export"));
        assert!(md.contains("### [12:05:30] operator"));
        assert!(md.contains("motor start"));
        assert!(md.contains("*Tags: power*"));
    }

    #[test]
    fn markdown_includes_telemetry_snapshot() {
        let mut n = note("voltage check", vec![]);
        let mut snapshot = serde_json::Map::new();
        snapshot.insert("voltage".into(), json!(12.1));
        n.telemetry_snapshot = Some(snapshot);

        let md = render_markdown(&session(), &[n]);
        assert!(md.contains("**Telemetry:**"));
        assert!(md.contains("12.1"));
    }

    #[test]
    fn markdown_skips_empty_snapshot_and_tags() {
        let mut n = note("plain", vec![]);
        n.telemetry_snapshot = Some(serde_json::Map::new());

        let md = render_markdown(&session(), &[n]);
        assert!(!md.contains("**Telemetry:**"));
        assert!(!md.contains("*Tags:"));
    }

    #[test]
    fn json_export_round_trips() {
        let doc = render_json(&session(), &[note("motor start", vec![])]);
        let text = serde_json::to_string_pretty(&doc).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["session_name"], "Rover Test");
        assert_eq!(parsed["notes"][0]["content"], "motor start");
    }
}
