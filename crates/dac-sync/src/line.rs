use dac_refs::Reference;

/// One protocol message: a short command token and an opaque payload.
///
/// A line with an empty command and an empty payload is the flush line,
/// which terminates every variable-length section of the exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtoLine {
    pub command: String,
    pub payload: Vec<u8>,
}

impl ProtoLine {
    pub fn new(command: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            command: command.into(),
            payload: payload.into(),
        }
    }

    /// The section terminator.
    pub fn flush() -> Self {
        Self::default()
    }

    pub fn is_flush(&self) -> bool {
        self.command.is_empty() && self.payload.is_empty()
    }

    /// Advertisement of one local reference: `hex(target)` with the
    /// namespaced name as payload.
    pub fn advertisement(reference: &Reference, prefix: &str) -> Self {
        Self::new(
            reference.target.to_hex(),
            reference.qualified_name(prefix).into_bytes(),
        )
    }

    /// Payload decoded as UTF-8, if it is.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dac_types::ObjectId;

    #[test]
    fn flush_line() {
        assert!(ProtoLine::flush().is_flush());
        assert!(!ProtoLine::new("", "x").is_flush());
        assert!(!ProtoLine::new("ok", "").is_flush());
    }

    #[test]
    fn advertisement_line() {
        let target = ObjectId::from_digest([0xab; 64]);
        let line = ProtoLine::advertisement(&Reference::new("B", target), "refs/heads/");
        assert_eq!(line.command, "ab".repeat(64));
        assert_eq!(line.payload_str(), Some("refs/heads/B"));
    }
}
