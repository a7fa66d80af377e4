use attest_model::AttestationRecord;

use crate::Notification;

/// Summary sent after an attestation is recorded: who, where, when, and which protocols were
/// marked complete versus left open.
pub fn attestation_summary(record: &AttestationRecord, recipients: &[String]) -> Notification {
    let notes = record
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("None");

    let mut lines = vec![
        format!("Supervisor: {}", record.name),
        format!("Site: {}", record.site),
        format!("Timestamp: {}", record.timestamp_display()),
        String::new(),
        format!("Notes: {notes}"),
        String::new(),
        "Completed Protocols:".to_string(),
    ];
    push_protocols(&mut lines, record.protocols_completed.iter().map(String::as_str));
    lines.push(String::new());
    lines.push("Not Marked Complete:".to_string());
    push_protocols(&mut lines, record.protocols_not_completed().into_iter());

    Notification {
        recipients: recipients.to_vec(),
        subject: format!("Protocol Attestation Submitted by {}", record.name),
        body: lines.join("\n"),
    }
}

fn push_protocols<'a>(lines: &mut Vec<String>, protocols: impl Iterator<Item = &'a str>) {
    let before = lines.len();
    lines.extend(protocols.map(|p| format!("  {p}")));
    if lines.len() == before {
        lines.push("  None".to_string());
    }
}
