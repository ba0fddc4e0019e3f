//! Decoders for structured cell content behind a segment marker directive.
//!
//! Every decoder yields an ordered list of `(key, value)` pairs; the
//! resolver projects one key out of it.

use std::fmt;
use std::str::FromStr;

/// Item delimiter of the `separator` encoding.
pub const SEPARATOR_ITEM: &str = "|?-++-?|";

/// Key/value delimiter of the `separator` encoding.
pub const SEPARATOR_KEY: &str = "+-?||?-+";

/// How a looked-up cell value is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// JSON object (or array, keyed by index).
    Json,
    /// PHP-style serialized array: `a:2:{s:2:"en";s:4:"shoe";...}`.
    Serial,
    /// `key+-?||?-+value|?-++-?|key+-?||?-+value`.
    Separator,
}

impl FromStr for Directive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Directive::Json),
            "serial" => Ok(Directive::Serial),
            "separator" => Ok(Directive::Separator),
            other => Err(format!("unknown directive '{other}'")),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Directive::Json => "json",
            Directive::Serial => "serial",
            Directive::Separator => "separator",
        })
    }
}

impl Directive {
    /// Decode `raw` into ordered key/value pairs. `None` if malformed.
    pub fn decode(&self, raw: &str) -> Option<Vec<(String, String)>> {
        match self {
            Directive::Json => decode_json(raw),
            Directive::Serial => SerialReader::new(raw).array(),
            Directive::Separator => decode_separator(raw),
        }
    }
}

fn decode_json(raw: &str) -> Option<Vec<(String, String)>> {
    match serde_json::from_str::<serde_json::Value>(raw).ok()? {
        serde_json::Value::Object(map) => Some(
            map.iter()
                .map(|(k, v)| (k.clone(), json_text(v)))
                .collect(),
        ),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), json_text(v)))
                .collect(),
        ),
        _ => None,
    }
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn decode_separator(raw: &str) -> Option<Vec<(String, String)>> {
    if raw.is_empty() {
        return None;
    }

    Some(
        raw.split(SEPARATOR_ITEM)
            .enumerate()
            .map(|(i, item)| match item.split_once(SEPARATOR_KEY) {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (i.to_string(), item.to_string()),
            })
            .collect(),
    )
}

/// Cursor over a serialized array. Only flat arrays of scalars are accepted.
struct SerialReader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SerialReader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input: input.trim(), pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn expect(&mut self, literal: &str) -> Option<()> {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            Some(())
        } else {
            None
        }
    }

    fn read_until(&mut self, delimiter: char) -> Option<&'a str> {
        let rest = self.rest();
        let end = rest.find(delimiter)?;
        self.pos += end + delimiter.len_utf8();
        Some(&rest[..end])
    }

    fn scalar(&mut self) -> Option<String> {
        let tag = self.rest().chars().next()?;
        self.pos += tag.len_utf8();

        if tag == 'N' {
            self.expect(";")?;
            return Some(String::new());
        }
        self.expect(":")?;

        match tag {
            's' => {
                // Length is in bytes.
                let len: usize = self.read_until(':')?.parse().ok()?;
                self.expect("\"")?;
                let end = self.pos.checked_add(len)?;
                let value = self.input.get(self.pos..end)?;
                self.pos = end;
                self.expect("\";")?;
                Some(value.to_string())
            }
            'i' | 'd' => Some(self.read_until(';')?.to_string()),
            'b' => Some((self.read_until(';')? == "1").to_string()),
            _ => None,
        }
    }

    fn array(mut self) -> Option<Vec<(String, String)>> {
        self.expect("a:")?;
        let count: usize = self.read_until(':')?.parse().ok()?;
        self.expect("{")?;

        let mut entries = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            let key = self.scalar()?;
            let value = self.scalar()?;
            entries.push((key, value));
        }

        self.expect("}")?;
        Some(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_json_object() {
        let decoded = Directive::Json
            .decode(r#"{"en":"red-shoe","tr":"kirmizi-ayakkabi","stock":3}"#)
            .unwrap();
        assert!(decoded.contains(&("en".to_string(), "red-shoe".to_string())));
        assert!(decoded.contains(&("stock".to_string(), "3".to_string())));
    }

    #[test]
    fn test_json_keeps_document_order() {
        let decoded = Directive::Json.decode(r#"{"tr":"menu","en":"menu","de":"speisekarte"}"#).unwrap();
        assert_eq!(decoded, pairs(&[("tr", "menu"), ("en", "menu"), ("de", "speisekarte")]));
    }

    #[test]
    fn test_json_rejects_scalars() {
        assert!(Directive::Json.decode("\"plain\"").is_none());
        assert!(Directive::Json.decode("{not json").is_none());
    }

    #[test]
    fn test_serial_array() {
        let raw = r#"a:2:{s:2:"en";s:8:"red-shoe";s:2:"tr";s:5:"ayakk";}"#;
        assert_eq!(
            Directive::Serial.decode(raw).unwrap(),
            pairs(&[("en", "red-shoe"), ("tr", "ayakk")])
        );
    }

    #[test]
    fn test_serial_integer_keys_and_multibyte() {
        let raw = "a:2:{i:0;s:6:\"çanta\";i:1;b:1;}";
        assert_eq!(
            Directive::Serial.decode(raw).unwrap(),
            pairs(&[("0", "çanta"), ("1", "true")])
        );
    }

    #[test]
    fn test_serial_malformed() {
        assert!(Directive::Serial.decode("a:2:{s:2:\"en\";}").is_none());
        assert!(Directive::Serial.decode("s:2:\"en\";").is_none());
        assert!(Directive::Serial.decode("a:1:{s:9:\"en\";s:1:\"x\";}").is_none());
    }

    #[test]
    fn test_separator() {
        let raw = format!("en{SEPARATOR_KEY}red-shoe{SEPARATOR_ITEM}tr{SEPARATOR_KEY}ayakkabi");
        assert_eq!(
            Directive::Separator.decode(&raw).unwrap(),
            pairs(&[("en", "red-shoe"), ("tr", "ayakkabi")])
        );

        let raw = format!("first{SEPARATOR_ITEM}second");
        assert_eq!(
            Directive::Separator.decode(&raw).unwrap(),
            pairs(&[("0", "first"), ("1", "second")])
        );
    }

    #[test]
    fn test_directive_parse() {
        assert_eq!("JSON".parse::<Directive>(), Ok(Directive::Json));
        assert!("yaml".parse::<Directive>().is_err());
    }
}
