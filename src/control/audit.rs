//! Action audit log
//!
//! An injectable collaborator with an explicit append contract. The drive
//! loop hands it one record per cycle; sinks decide where records go (JSON
//! lines, nothing, a test buffer). Decision logic never writes logs itself.

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::vision::Classification;

/// Audit sink errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit append failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("audit record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One cycle's worth of observations and actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// 1-based cycle index within the run
    pub cycle: u32,
    /// Classification result, if a frame was captured
    pub classification: Option<Classification>,
    pub color_candidates: usize,
    pub template_candidates: usize,
    pub edge_candidates: usize,
    /// Decision taken, if the cycle got that far
    pub decision: Option<Decision>,
    /// Whether the tap was delivered; `None` when no tap was attempted
    pub action_ok: Option<bool>,
}

impl CycleRecord {
    /// A record for a cycle whose frame could not be captured
    pub fn skipped(cycle: u32) -> Self {
        Self {
            cycle,
            classification: None,
            color_candidates: 0,
            template_candidates: 0,
            edge_candidates: 0,
            decision: None,
            action_ok: None,
        }
    }
}

/// Append contract for audit collaborators
pub trait AuditSink {
    fn append(&mut self, record: &CycleRecord) -> Result<(), AuditError>;
}

/// Discards every record
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudit;

impl AuditSink for NullAudit {
    fn append(&mut self, _record: &CycleRecord) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Writes one JSON object per line to any writer
pub struct JsonLinesAudit<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesAudit<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> AuditSink for JsonLinesAudit<W> {
    fn append(&mut self, record: &CycleRecord) -> Result<(), AuditError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{Confidence, FeatureReport, ScreenState};
    use crate::Action;

    fn sample_record() -> CycleRecord {
        CycleRecord {
            cycle: 3,
            classification: Some(Classification {
                state: ScreenState::Lobby,
                confidence: Confidence::High,
                report: FeatureReport::default(),
            }),
            color_candidates: 2,
            template_candidates: 1,
            edge_candidates: 0,
            decision: Some(Decision {
                action: Action::Tap { x: 640, y: 280 },
                tier: 2,
                rationale: "test".to_string(),
            }),
            action_ok: Some(true),
        }
    }

    #[test]
    fn test_json_lines_round_trip() {
        let mut sink = JsonLinesAudit::new(Vec::new());
        sink.append(&sample_record()).unwrap();
        sink.append(&CycleRecord::skipped(4)).unwrap();

        let buffer = sink.into_inner();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: CycleRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, sample_record());

        let second: CycleRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.cycle, 4);
        assert!(second.classification.is_none());
    }

    #[test]
    fn test_null_audit_accepts_everything() {
        let mut sink = NullAudit;
        assert!(sink.append(&sample_record()).is_ok());
    }
}
