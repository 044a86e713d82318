//! DSV formatter - delimiter separated values, one record per line

use std::fmt::Write as _;

use bytes::BytesMut;
use chrono::DateTime;
use contracts::{FieldValue, FlowRecord, FormatConfig, RecordFormatter, TimestampFormat};

use crate::dictionary::{FieldDictionary, Semantic};

const TCP_FLAG_CHARS: [(u64, char); 8] = [
    (0x80, 'C'),
    (0x40, 'E'),
    (0x20, 'U'),
    (0x10, 'A'),
    (0x08, 'P'),
    (0x04, 'R'),
    (0x02, 'S'),
    (0x01, 'F'),
];

/// Formats records as delimiter separated values
#[derive(Debug, Clone)]
pub struct DsvFormatter {
    config: FormatConfig,
    dictionary: FieldDictionary,
}

impl DsvFormatter {
    pub fn new(config: FormatConfig, dictionary: FieldDictionary) -> Self {
        Self { config, dictionary }
    }

    /// Formatter with the IANA dictionary
    pub fn with_iana(config: FormatConfig) -> Self {
        Self::new(config, FieldDictionary::iana())
    }

    pub fn dictionary(&self) -> &FieldDictionary {
        &self.dictionary
    }

    /// Header line naming each element of `record`, in the same layout as `format`
    pub fn header(&self, record: &FlowRecord) -> String {
        let mut line = String::new();
        for field in self.visible_fields(record) {
            if !line.is_empty() {
                line.push(self.config.delimiter);
            }
            line.push_str(&self.dictionary.name_of(field.id));
        }
        line.push('\n');
        line
    }

    fn visible_fields<'a>(
        &'a self,
        record: &'a FlowRecord,
    ) -> impl Iterator<Item = &'a contracts::Field> + 'a {
        record
            .fields
            .iter()
            .filter(|f| !self.config.ignore_unknown || self.dictionary.get(f.id).is_some())
    }

    fn semantic(&self, id: u16) -> Semantic {
        self.dictionary
            .get(id)
            .map(|d| d.semantic)
            .unwrap_or(Semantic::Plain)
    }

    fn write_value(&self, out: &mut BytesMut, semantic: Semantic, value: &FieldValue) {
        match (semantic, value) {
            (Semantic::Protocol, FieldValue::Unsigned(n)) if self.config.proto => {
                match protocol_name(*n) {
                    Some(name) => out.extend_from_slice(name.as_bytes()),
                    None => push_display(out, n),
                }
            }
            (Semantic::TcpFlags, FieldValue::Unsigned(bits)) if self.config.tcp_flags => {
                for (mask, c) in TCP_FLAG_CHARS {
                    let flag = if bits & mask != 0 { c as u8 } else { b'.' };
                    out.extend_from_slice(&[flag]);
                }
            }
            (_, FieldValue::Unsigned(n)) => push_display(out, n),
            (_, FieldValue::Signed(n)) => push_display(out, n),
            (_, FieldValue::Float(n)) => push_display(out, n),
            (_, FieldValue::Bool(b)) => push_display(out, b),
            (_, FieldValue::Ip(ip)) => push_display(out, ip),
            (_, FieldValue::Mac(mac)) => {
                let _ = write!(
                    out,
                    "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                    mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
                );
            }
            (_, FieldValue::Octets(bytes)) => {
                out.extend_from_slice(b"0x");
                for b in bytes {
                    let _ = write!(out, "{b:02x}");
                }
            }
            (_, FieldValue::TimestampMs(ms)) => self.write_timestamp(out, *ms),
            (_, FieldValue::Str(s)) => self.write_str(out, s),
        }
    }

    fn write_timestamp(&self, out: &mut BytesMut, ms: i64) {
        match self.config.timestamp {
            TimestampFormat::Unix => push_display(out, ms),
            TimestampFormat::Iso => match DateTime::from_timestamp_millis(ms) {
                Some(ts) => {
                    let _ = write!(out, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.3fZ"));
                }
                None => push_display(out, ms),
            },
        }
    }

    fn write_str(&self, out: &mut BytesMut, s: &str) {
        let mut text = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '\n' | '\r' | '\t' if !self.config.white_spaces => {}
                '\n' => text.push_str("\\n"),
                '\r' => text.push_str("\\r"),
                '\t' => text.push_str("\\t"),
                c => text.push(c),
            }
        }

        if text.contains(self.config.delimiter) || text.contains('"') {
            out.extend_from_slice(b"\"");
            out.extend_from_slice(text.replace('"', "\"\"").as_bytes());
            out.extend_from_slice(b"\"");
        } else {
            out.extend_from_slice(text.as_bytes());
        }
    }
}

impl RecordFormatter for DsvFormatter {
    fn format(&self, record: &FlowRecord, out: &mut BytesMut) {
        let mut delimiter = [0u8; 4];
        let delimiter = self.config.delimiter.encode_utf8(&mut delimiter).as_bytes();

        for (idx, field) in self.visible_fields(record).enumerate() {
            if idx > 0 {
                out.extend_from_slice(delimiter);
            }
            self.write_value(out, self.semantic(field.id), &field.value);
        }
        out.extend_from_slice(b"\n");
    }
}

fn push_display(out: &mut BytesMut, value: impl std::fmt::Display) {
    // Writing into BytesMut cannot fail
    let _ = write!(out, "{value}");
}

fn protocol_name(proto: u64) -> Option<&'static str> {
    match proto {
        1 => Some("ICMP"),
        2 => Some("IGMP"),
        6 => Some("TCP"),
        17 => Some("UDP"),
        47 => Some("GRE"),
        50 => Some("ESP"),
        58 => Some("IPv6-ICMP"),
        132 => Some("SCTP"),
        _ => None,
    }
}
