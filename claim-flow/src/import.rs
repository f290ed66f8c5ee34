//! Import of claim snapshots exported elsewhere.
//!
//! Records are validated one at a time; an invalid record is dropped whole,
//! never partially accepted. Accepted records become read-only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::Result;
use crate::model::{Claim, EventKind};

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub imported: Vec<Claim>,
    pub dropped: Vec<String>,
}

fn missing_field(claim: &Claim) -> Option<&'static str> {
    if claim.id.trim().is_empty() {
        Some("id")
    } else if claim.vehicle.year == 0 {
        Some("vehicle.year")
    } else if claim.vehicle.make.trim().is_empty() {
        Some("vehicle.make")
    } else if claim.vehicle.model.trim().is_empty() {
        Some("vehicle.model")
    } else {
        None
    }
}

fn record_label(value: &Value, index: usize) -> String {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{index}"))
}

/// Parses a JSON array of claims. Only a payload that is not a JSON array at
/// all is an error.
pub fn import_claims(json: &str, now: DateTime<Utc>) -> Result<ImportReport> {
    let records: Vec<Value> = serde_json::from_str(json)?;
    let mut report = ImportReport::default();

    for (index, record) in records.into_iter().enumerate() {
        let label = record_label(&record, index);
        let mut claim: Claim = match serde_json::from_value(record) {
            Ok(claim) => claim,
            Err(e) => {
                warn!(record = %label, error = %e, "Dropping malformed claim record");
                report.dropped.push(label);
                continue;
            }
        };
        if let Some(field) = missing_field(&claim) {
            warn!(record = %label, field, "Dropping claim record missing a required field");
            report.dropped.push(label);
            continue;
        }

        claim.record(
            EventKind::ClaimImported,
            "import",
            "Imported as a read-only snapshot",
            now,
        );
        claim.read_only = true;
        report.imported.push(claim);
    }

    info!(
        imported = report.imported.len(),
        dropped = report.dropped.len(),
        "Claim import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow;
    use chrono::TimeZone;

    #[test]
    fn test_invalid_records_are_dropped_and_rest_are_read_only() {
        let json = r#"[
            {"id": "CLM-9001", "vehicle": {"year": 2015, "make": "Mazda", "model": "CX-5"},
             "status": "In Review", "submitted_at": "2024-02-01T10:00:00Z",
             "drivable": "no", "photos": [{"id": "a", "name": "a.jpg", "url": "u"}]},
            {"id": "CLM-9002", "vehicle": {"year": 2015, "make": "", "model": "CX-5"},
             "status": "New", "submitted_at": "2024-02-01T10:00:00Z"},
            {"id": "CLM-9003", "status": "New"},
            {"id": "CLM-9004", "vehicle": {"year": 2015, "make": "VW", "model": "Golf"},
             "status": "Archived", "submitted_at": "2024-02-01T10:00:00Z"}
        ]"#;
        let now = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
        let mut report = import_claims(json, now).unwrap();

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.dropped, vec!["CLM-9002", "CLM-9003", "CLM-9004"]);

        let claim = &mut report.imported[0];
        assert!(claim.read_only);
        assert!(claim.drivable.is_no());
        assert_eq!(claim.timeline.last().unwrap().kind, EventKind::ClaimImported);

        let before = claim.clone();
        assert!(workflow::update_notes(claim, "edit", "agent", now).is_err());
        assert_eq!(*claim, before);
    }

    #[test]
    fn test_non_array_payload_is_an_error() {
        assert!(import_claims("{}", Utc::now()).is_err());
    }
}
