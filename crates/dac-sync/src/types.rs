use std::fmt;

use serde::{Deserialize, Serialize};

use dac_refs::validate_reference_name;
use dac_types::ObjectId;

use crate::error::{SyncError, SyncResult};
use crate::line::ProtoLine;

/// Receive-side session phases, in the only order they may be entered.
///
/// Any failure moves the session to `Aborted`, from which no phase can be
/// entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Advertising,
    AwaitingUpdates,
    ValidatingTransfer,
    Reporting,
    Done,
    Aborted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Advertising => "advertising",
            Phase::AwaitingUpdates => "awaiting-updates",
            Phase::ValidatingTransfer => "validating-transfer",
            Phase::Reporting => "reporting",
            Phase::Done => "done",
            Phase::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// A requested reference move from `from` to `to`.
///
/// `from == None` asks to create the reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefUpdate {
    pub name: String,
    pub from: Option<ObjectId>,
    pub to: ObjectId,
}

impl RefUpdate {
    pub fn new(name: impl Into<String>, from: Option<ObjectId>, to: ObjectId) -> Self {
        Self {
            name: name.into(),
            from,
            to,
        }
    }

    /// Parse an update request line: command `hex(from)`, payload
    /// `hex(to) <name>`. The name may carry `prefix`, which is stripped.
    pub fn parse(line: &ProtoLine, prefix: &str) -> SyncResult<Self> {
        let from = ObjectId::from_hex(&line.command)
            .map_err(|e| SyncError::MalformedLine(format!("bad from id: {e}")))?;
        let payload = line
            .payload_str()
            .ok_or_else(|| SyncError::MalformedLine("payload is not UTF-8".into()))?;
        let (to_hex, wire_name) = payload
            .split_once(' ')
            .ok_or_else(|| SyncError::MalformedLine("missing reference name".into()))?;
        let to = ObjectId::from_hex(to_hex)
            .map_err(|e| SyncError::MalformedLine(format!("bad to id: {e}")))?;
        if to.is_null() {
            return Err(SyncError::MalformedLine("update target is the null id".into()));
        }

        let name = wire_name.strip_prefix(prefix).unwrap_or(wire_name);
        validate_reference_name(name).map_err(|e| SyncError::MalformedLine(e.to_string()))?;

        Ok(Self::new(name, from.into_option(), to))
    }

    /// Encode as an update request line, namespacing the name with `prefix`.
    pub fn to_line(&self, prefix: &str) -> ProtoLine {
        ProtoLine::new(
            ObjectId::from_option(self.from).to_hex(),
            format!("{} {prefix}{}", self.to.to_hex(), self.name).into_bytes(),
        )
    }

    pub fn is_creation(&self) -> bool {
        self.from.is_none()
    }
}

/// The fate of one update after validation.
#[derive(Debug)]
pub struct RefUpdateOutcome {
    pub update: RefUpdate,
    pub result: SyncResult<()>,
}

impl RefUpdateOutcome {
    pub fn is_applied(&self) -> bool {
        self.result.is_ok()
    }

    /// The wire status for this outcome.
    pub fn status(&self) -> RefStatus {
        match &self.result {
            Ok(()) => RefStatus::Ok {
                name: self.update.name.clone(),
            },
            Err(e) => RefStatus::Rejected {
                name: self.update.name.clone(),
                reason: e.to_string(),
            },
        }
    }
}

/// Per-reference status as carried by the report lines
/// `ok <name>` and `ng <name> <reason>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefStatus {
    Ok { name: String },
    Rejected { name: String, reason: String },
}

impl RefStatus {
    pub fn name(&self) -> &str {
        match self {
            RefStatus::Ok { name } | RefStatus::Rejected { name, .. } => name,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RefStatus::Ok { .. })
    }

    pub fn to_line(&self) -> ProtoLine {
        match self {
            RefStatus::Ok { name } => ProtoLine::new("ok", name.as_bytes()),
            RefStatus::Rejected { name, reason } => {
                ProtoLine::new("ng", format!("{name} {reason}").into_bytes())
            }
        }
    }

    pub fn parse(line: &ProtoLine) -> SyncResult<Self> {
        let payload = line
            .payload_str()
            .ok_or_else(|| SyncError::MalformedLine("status payload is not UTF-8".into()))?;
        match line.command.as_str() {
            "ok" if !payload.is_empty() => Ok(RefStatus::Ok {
                name: payload.to_string(),
            }),
            "ng" => {
                let (name, reason) = payload.split_once(' ').unwrap_or((payload, ""));
                if name.is_empty() {
                    return Err(SyncError::MalformedLine("status without a name".into()));
                }
                Ok(RefStatus::Rejected {
                    name: name.to_string(),
                    reason: reason.to_string(),
                })
            }
            other => Err(SyncError::MalformedLine(format!(
                "unknown status command {other:?}"
            ))),
        }
    }
}

/// Everything the receiving side decided during one session.
#[derive(Debug, Default)]
pub struct ReceiveReport {
    pub outcomes: Vec<RefUpdateOutcome>,
    pub objects_received: usize,
    pub malformed_lines: usize,
}

impl ReceiveReport {
    pub fn applied(&self) -> impl Iterator<Item = &RefUpdate> {
        self.outcomes
            .iter()
            .filter(|o| o.is_applied())
            .map(|o| &o.update)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &RefUpdateOutcome> {
        self.outcomes.iter().filter(|o| !o.is_applied())
    }

    pub fn statuses(&self) -> Vec<RefStatus> {
        self.outcomes.iter().map(RefUpdateOutcome::status).collect()
    }
}
