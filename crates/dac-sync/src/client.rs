//! Sending side of a sync exchange.

use tracing::{debug, warn};

use dac_refs::{validate_reference_name, Reference};
use dac_types::ObjectId;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::line::ProtoLine;
use crate::transport::{next_line, with_deadline, LineSink, LineSource};
use crate::types::{Phase, RefStatus, RefUpdate};

/// Read a peer's reference advertisement up to its flush line.
///
/// Lines that do not parse as `hex(target) <name>` are dropped.
pub async fn read_advertisement<S: LineSource + ?Sized>(
    source: &mut S,
    config: &SyncConfig,
) -> SyncResult<Vec<Reference>> {
    let lines = read_section(source, config, Phase::Advertising).await?;
    let refs: Vec<_> = lines
        .iter()
        .filter_map(|line| match parse_advertisement(line, config) {
            Ok(reference) => Some(reference),
            Err(e) => {
                warn!(error = %e, "dropping malformed advertisement line");
                None
            }
        })
        .collect();
    debug!(refs = refs.len(), "read advertisement");
    Ok(refs)
}

/// Send update requests followed by a flush line, then close `sink`.
pub async fn send_updates<S: LineSink + ?Sized>(
    sink: &mut S,
    updates: &[RefUpdate],
    config: &SyncConfig,
) -> SyncResult<()> {
    let send = async {
        for update in updates {
            sink.send_line(update.to_line(&config.ref_prefix)).await?;
        }
        sink.send_line(ProtoLine::flush()).await?;
        sink.close();
        Ok::<_, SyncError>(())
    };
    with_deadline(config.phase_timeout(), Phase::AwaitingUpdates, send).await?
}

/// Read the receiver's per-reference status lines up to the flush line.
pub async fn read_report<S: LineSource + ?Sized>(
    source: &mut S,
    config: &SyncConfig,
) -> SyncResult<Vec<RefStatus>> {
    let lines = read_section(source, config, Phase::Reporting).await?;
    Ok(lines
        .iter()
        .filter_map(|line| match RefStatus::parse(line) {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(error = %e, "dropping malformed status line");
                None
            }
        })
        .collect())
}

async fn read_section<S: LineSource + ?Sized>(
    source: &mut S,
    config: &SyncConfig,
    phase: Phase,
) -> SyncResult<Vec<ProtoLine>> {
    let read = async {
        let mut lines = Vec::new();
        loop {
            let line = next_line(source, None, phase).await?;
            if line.is_flush() {
                return Ok::<_, SyncError>(lines);
            }
            lines.push(line);
        }
    };
    with_deadline(config.phase_timeout(), phase, read).await?
}

fn parse_advertisement(line: &ProtoLine, config: &SyncConfig) -> SyncResult<Reference> {
    let target = ObjectId::from_hex(&line.command)
        .map_err(|e| SyncError::MalformedLine(format!("bad target id: {e}")))?;
    if target.is_null() {
        return Err(SyncError::MalformedLine("advertised target is the null id".into()));
    }
    let wire_name = line
        .payload_str()
        .ok_or_else(|| SyncError::MalformedLine("payload is not UTF-8".into()))?;
    let name = config.short_name(wire_name);
    validate_reference_name(name).map_err(|e| SyncError::MalformedLine(e.to_string()))?;
    Ok(Reference::new(name, target))
}
