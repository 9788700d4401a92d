//! The git smart-HTTP v0 wire format: packet-line (pkt-line) framing, the
//! ref-advertisement scrape, the want/done request body, and the
//! side-band-multiplexed response demultiplexer.

use core::str::from_utf8;

use crate::error::{Error, Result};
use crate::hash::Hash;

const FLUSH_LEN: &[u8; 4] = b"0000";

#[derive(Debug, PartialEq, Eq)]
pub enum PktLine<'a> {
    Flush,
    Data(&'a [u8]),
}

/// Iterates the pkt-lines in a buffer: each line is a 4-hex-digit length
/// (counting the 4 prefix digits themselves) followed by that many bytes of
/// payload; a length of `0000` is a flush marker with no payload.
pub struct PktLineReader<'a> {
    data: &'a [u8],
}

impl<'a> PktLineReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for PktLineReader<'a> {
    type Item = Result<PktLine<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.is_empty() {
            return None;
        }

        let result = (|| {
            let prefix = self.data.get(0..4).ok_or_else(|| Error::BadFraming("truncated pkt-line length".into()))?;
            let prefix = from_utf8(prefix).map_err(|_| Error::BadFraming("non-hex pkt-line length".into()))?;
            let len = usize::from_str_radix(prefix, 16).map_err(|_| Error::BadFraming("non-hex pkt-line length".into()))?;

            if len == 0 {
                self.data = &self.data[4..];
                return Ok(PktLine::Flush);
            }

            if len < 4 {
                return Err(Error::BadFraming("pkt-line length shorter than its own prefix".into()));
            }

            let line = self.data.get(4..len).ok_or_else(|| Error::BadFraming("truncated pkt-line payload".into()))?;
            self.data = &self.data[len..];
            Ok(PktLine::Data(line))
        })();

        Some(result)
    }
}

fn write_pkt_line(out: &mut Vec<u8>, payload: &[u8]) {
    let len = payload.len() + 4;
    out.extend_from_slice(format!("{:04x}", len).as_bytes());
    out.extend_from_slice(payload);
}

fn write_flush(out: &mut Vec<u8>) {
    out.extend_from_slice(FLUSH_LEN);
}

/// Scrapes the advertised `HEAD` digest out of an `info/refs` response.
///
/// The response is a `# service=...` pkt-line, a flush, then one pkt-line
/// per ref; the first ref line is `HEAD` and (after the first ref) embeds
/// `\0`-separated capabilities following the 40 hex digits of its SHA.
pub fn extract_head(advertisement: &[u8]) -> Result<Hash> {
    for line in PktLineReader::new(advertisement) {
        let PktLine::Data(bytes) = line? else {
            continue;
        };

        let text = from_utf8(bytes).map_err(|_| Error::BadFraming("non-utf8 ref line".into()))?;
        let text = text.trim_end_matches('\n');

        if text.starts_with('#') || text.is_empty() {
            continue;
        }

        let sha_hex = text.get(0..40).ok_or_else(|| Error::BadFraming("ref line shorter than a digest".into()))?;
        return Hash::from_hex(sha_hex).ok_or_else(|| Error::BadFraming("malformed digest in ref advertisement".into()));
    }

    Err(Error::BadFraming("no refs advertised".into()))
}

/// Builds the fixed `want <sha>\n` / flush / `done\n` upload-pack request
/// body; this client never negotiates capabilities or requests more than
/// one ref.
pub fn build_want_request(head: &Hash) -> Vec<u8> {
    let mut out = Vec::new();
    write_pkt_line(&mut out, format!("want {}\n", head).as_bytes());
    write_flush(&mut out);
    write_pkt_line(&mut out, b"done\n");
    out
}

/// Strips the side-band multiplexing from an `upload-pack` response,
/// returning the raw packfile bytes carried on channel 1. Channel 2 carries
/// progress text (logged, discarded); channel 3 carries a fatal error
/// message. Falls back to scanning for the `PACK` magic directly when the
/// response isn't pkt-line framed at all.
pub fn demux_sideband(data: &[u8]) -> Result<Vec<u8>> {
    let mut pack = Vec::new();

    for line in PktLineReader::new(data) {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };

        match line {
            PktLine::Flush => continue,
            PktLine::Data(bytes) if bytes.is_empty() => continue,
            PktLine::Data(bytes) => match bytes[0] {
                1 => pack.extend_from_slice(&bytes[1..]),
                2 => log::debug!("upload-pack progress: {}", String::from_utf8_lossy(&bytes[1..]).trim_end()),
                3 => {
                    return Err(Error::BadFraming(format!(
                        "remote reported an error: {}",
                        String::from_utf8_lossy(&bytes[1..]).trim_end()
                    )))
                }
                // unframed payloads (e.g. a bare "NAK\n") carry no channel byte; drop them
                _ => continue,
            },
        }
    }

    if !pack.is_empty() {
        return Ok(pack);
    }

    if let Some(start) = find_subsequence(data, b"PACK") {
        return Ok(data[start..].to_vec());
    }

    Err(Error::BadFraming("no packfile found in upload-pack response".into()))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkt_line_round_trip() {
        let mut buf = Vec::new();
        write_pkt_line(&mut buf, b"want deadbeef\n");
        write_flush(&mut buf);

        let mut lines = PktLineReader::new(&buf);
        assert_eq!(lines.next().unwrap().unwrap(), PktLine::Data(b"want deadbeef\n"));
        assert_eq!(lines.next().unwrap().unwrap(), PktLine::Flush);
        assert!(lines.next().is_none());
    }

    #[test]
    fn extracts_head_from_advertisement() {
        let sha = "95d09f2b10159347eece71399a7e2e907ea3df4";
        let mut buf = Vec::new();
        write_pkt_line(&mut buf, b"# service=git-upload-pack\n");
        write_flush(&mut buf);
        write_pkt_line(&mut buf, format!("{} HEAD\0multi_ack thin-pack\n", sha).as_bytes());

        let head = extract_head(&buf).unwrap();
        assert_eq!(head.to_string(), sha);
    }

    #[test]
    fn build_want_request_has_exact_shape() {
        let hash = Hash::from_hex("95d09f2b10159347eece71399a7e2e907ea3df4").unwrap();
        let body = build_want_request(&hash);
        assert_eq!(
            body,
            b"0032want 95d09f2b10159347eece71399a7e2e907ea3df4\n00000009done\n".to_vec()
        );
    }

    #[test]
    fn demux_extracts_channel_one_only() {
        let mut buf = Vec::new();
        let mut channel1 = vec![1u8];
        channel1.extend_from_slice(b"PACK\0\0\0\x02\0\0\0\0");
        write_pkt_line(&mut buf, &channel1);
        write_pkt_line(&mut buf, b"\x02still cloning...\n");
        write_flush(&mut buf);

        let pack = demux_sideband(&buf).unwrap();
        assert!(pack.starts_with(b"PACK"));
    }

    #[test]
    fn demux_falls_back_to_raw_scan() {
        let mut raw = b"garbage-not-pktline".to_vec();
        raw.extend_from_slice(b"PACK\0\0\0\x02\0\0\0\0");

        let pack = demux_sideband(&raw).unwrap();
        assert!(pack.starts_with(b"PACK"));
    }
}
