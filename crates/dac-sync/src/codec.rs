use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{SyncError, SyncResult};
use crate::line::ProtoLine;

/// Width of the hex length prefix.
const PREFIX_LEN: usize = 4;

/// Codec for length-prefixed protocol lines.
///
/// Frame layout: `[4 lowercase hex digits][command][NUL][payload]`. The
/// length counts the prefix itself. The flush line is the bare prefix
/// `0000`.
#[derive(Clone, Copy, Debug)]
pub struct PktLineCodec {
    max_line_len: usize,
}

impl PktLineCodec {
    /// Largest body that still fits a four-digit length.
    pub const LIMIT: usize = 0xffff - PREFIX_LEN;
    pub const DEFAULT_MAX_LINE_LEN: usize = 65516;

    pub fn new(max_line_len: usize) -> Self {
        Self {
            max_line_len: max_line_len.min(Self::LIMIT),
        }
    }

    pub fn encode(&self, line: &ProtoLine) -> SyncResult<Bytes> {
        if line.is_flush() {
            return Ok(Bytes::from_static(b"0000"));
        }
        if line.command.contains('\0') {
            return Err(SyncError::Framing("command contains NUL".into()));
        }
        let body_len = line.command.len() + 1 + line.payload.len();
        if body_len > self.max_line_len {
            return Err(SyncError::LineTooLong {
                len: body_len,
                max: self.max_line_len,
            });
        }

        let mut buf = BytesMut::with_capacity(PREFIX_LEN + body_len);
        buf.put_slice(format!("{:04x}", PREFIX_LEN + body_len).as_bytes());
        buf.put_slice(line.command.as_bytes());
        buf.put_u8(0);
        buf.put_slice(&line.payload);
        Ok(buf.freeze())
    }

    /// Decode one framed line. Returns (line, bytes_consumed).
    pub fn decode(&self, data: &[u8]) -> SyncResult<(ProtoLine, usize)> {
        let Some(total) = self.frame_len(data)? else {
            return Err(SyncError::Framing(format!(
                "incomplete: have {} bytes",
                data.len()
            )));
        };
        Ok((Self::parse_body(&data[..total])?, total))
    }

    /// Pull the next complete line off the front of `buf`, leaving partial
    /// frames in place.
    pub fn decode_from(&self, buf: &mut BytesMut) -> SyncResult<Option<ProtoLine>> {
        let Some(total) = self.frame_len(buf)? else {
            return Ok(None);
        };
        let line = Self::parse_body(&buf[..total])?;
        buf.advance(total);
        Ok(Some(line))
    }

    /// Full frame length, or `None` if `data` does not hold a whole frame yet.
    fn frame_len(&self, data: &[u8]) -> SyncResult<Option<usize>> {
        let Some(prefix) = data.get(..PREFIX_LEN) else {
            return Ok(None);
        };
        if !prefix.iter().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(SyncError::Framing(format!(
                "bad length prefix {:?}",
                String::from_utf8_lossy(prefix)
            )));
        }
        let total = prefix
            .iter()
            .fold(0usize, |acc, &b| (acc << 4) | (b as char).to_digit(16).unwrap_or(0) as usize);

        if total == 0 {
            return Ok(Some(PREFIX_LEN));
        }
        if total <= PREFIX_LEN {
            return Err(SyncError::Framing(format!("length {total} is shorter than a frame")));
        }
        if total - PREFIX_LEN > self.max_line_len {
            return Err(SyncError::LineTooLong {
                len: total - PREFIX_LEN,
                max: self.max_line_len,
            });
        }
        Ok((data.len() >= total).then_some(total))
    }

    fn parse_body(frame: &[u8]) -> SyncResult<ProtoLine> {
        let body = &frame[PREFIX_LEN..];
        if body.is_empty() {
            return Ok(ProtoLine::flush());
        }
        let split = body
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| SyncError::Framing("missing NUL separator".into()))?;
        let command = std::str::from_utf8(&body[..split])
            .map_err(|_| SyncError::Framing("command is not UTF-8".into()))?;
        Ok(ProtoLine::new(command, &body[split + 1..]))
    }
}

impl Default for PktLineCodec {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_LINE_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> PktLineCodec {
        PktLineCodec::default()
    }

    #[test]
    fn encode_layout() {
        let encoded = codec().encode(&ProtoLine::new("ok", "B")).unwrap();
        assert_eq!(&encoded[..], b"0008ok\0B");
    }

    #[test]
    fn flush_is_four_zeros() {
        let c = codec();
        assert_eq!(&c.encode(&ProtoLine::flush()).unwrap()[..], b"0000");
        let (line, consumed) = c.decode(b"0000trailing").unwrap();
        assert!(line.is_flush());
        assert_eq!(consumed, 4);
    }

    #[test]
    fn decode_reports_consumed() {
        let c = codec();
        let mut data = c.encode(&ProtoLine::new("cmd", vec![1u8, 2, 0, 3])).unwrap().to_vec();
        let frame_len = data.len();
        data.extend_from_slice(b"0000");
        let (line, consumed) = c.decode(&data).unwrap();
        assert_eq!(consumed, frame_len);
        assert_eq!(line, ProtoLine::new("cmd", vec![1u8, 2, 0, 3]));
    }

    #[test]
    fn truncated_and_bad_frames() {
        let c = codec();
        assert!(matches!(c.decode(b"00"), Err(SyncError::Framing(_))));
        assert!(matches!(c.decode(b"0010ok\0"), Err(SyncError::Framing(_))));
        assert!(matches!(c.decode(b"0003"), Err(SyncError::Framing(_))));
        assert!(matches!(c.decode(b"zzzzok"), Err(SyncError::Framing(_))));
        assert!(matches!(c.decode(b"0008ABCD"), Err(SyncError::Framing(_))));
        assert!(matches!(c.decode(b"000Aok\0Bxx"), Err(SyncError::Framing(_))));
    }

    #[test]
    fn oversized_lines_rejected() {
        let small = PktLineCodec::new(8);
        assert!(matches!(
            small.encode(&ProtoLine::new("cmd", vec![0u8; 16])),
            Err(SyncError::LineTooLong { len: 20, max: 8 })
        ));
        assert!(matches!(
            small.decode(b"00ffcmd\0"),
            Err(SyncError::LineTooLong { .. })
        ));
    }

    #[test]
    fn nul_in_command_rejected() {
        assert!(matches!(
            codec().encode(&ProtoLine::new("a\0b", "")),
            Err(SyncError::Framing(_))
        ));
    }

    #[test]
    fn streaming_decode_waits_for_whole_frames() {
        let c = codec();
        let first = c.encode(&ProtoLine::new("ok", "main")).unwrap();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&first[..5]);
        assert_eq!(c.decode_from(&mut buf).unwrap(), None);

        buf.extend_from_slice(&first[5..]);
        buf.extend_from_slice(b"0000");
        assert_eq!(
            c.decode_from(&mut buf).unwrap(),
            Some(ProtoLine::new("ok", "main"))
        );
        assert_eq!(c.decode_from(&mut buf).unwrap(), Some(ProtoLine::flush()));
        assert!(buf.is_empty());
    }
}
