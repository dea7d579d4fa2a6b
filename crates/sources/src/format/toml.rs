//! TOML format.
//!
//! Leading `#` lines form the header comment when comment reading is on; it is
//! written back above the document when comment writing is on.

use std::io::{Read, Write};

use serde_json::{Map, Value};

use layerconf::{Format, FormatOptions, LayerContents, LayerError, Location};

use super::{flatten, nest};

#[derive(Debug, Default, Clone, Copy)]
pub struct TomlFormat;

impl Format for TomlFormat {
    fn id(&self) -> &str {
        "toml"
    }

    fn extensions(&self) -> &[&'static str] {
        &["toml"]
    }

    fn read(
        &self,
        input: &mut dyn Read,
        location: &Location,
        options: &FormatOptions,
    ) -> Result<LayerContents, LayerError> {
        let mut text = String::new();
        input
            .read_to_string(&mut text)
            .map_err(|source| LayerError::Read {
                location: location.uri().to_string(),
                source,
            })?;
        let table: toml::Table = toml::from_str(&text).map_err(|e| LayerError::Parse {
            location: location.uri().to_string(),
            message: describe(&e, &text),
        })?;

        let mut contents = flatten(Value::Object(to_json_table(table)), location)?;
        if options.comments_reading {
            contents.set_header_comment(header_comment(&text));
        }
        Ok(contents)
    }

    fn write(
        &self,
        contents: &LayerContents,
        output: &mut dyn Write,
        location: &Location,
        options: &FormatOptions,
    ) -> Result<(), LayerError> {
        let document = Value::Object(nest(contents, location)?);
        let rendered = if options.condensed {
            toml::to_string(&document)
        } else {
            toml::to_string_pretty(&document)
        }
        .map_err(|e| LayerError::Encode {
            location: location.uri().to_string(),
            message: e.to_string(),
        })?;

        let mut text = String::new();
        if let Some(header) = contents.header_comment().filter(|_| options.comments_writing) {
            for line in header.lines() {
                text.push_str("# ");
                text.push_str(line);
                text.push('\n');
            }
            text.push('\n');
        }
        text.push_str(&rendered);
        output
            .write_all(text.as_bytes())
            .map_err(|source| LayerError::Write {
                location: location.uri().to_string(),
                source,
            })
    }
}

/// Parser message plus line number; the offending text is left out.
fn describe(error: &toml::de::Error, text: &str) -> String {
    let message = error.message().trim();
    match error.span() {
        Some(span) => {
            let line = text
                .get(..span.start)
                .map_or(1, |before| before.matches('\n').count() + 1);
            format!("line {line}: {message}")
        }
        None => message.to_string(),
    }
}

fn header_comment(text: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_start)
        .take_while(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim())
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

fn to_json_table(table: toml::Table) -> Map<String, Value> {
    table
        .into_iter()
        .map(|(name, value)| (name, to_json(value)))
        .collect()
}

fn to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(text) => Value::String(text),
        toml::Value::Integer(number) => Value::from(number),
        toml::Value::Float(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(flag) => Value::Bool(flag),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(to_json).collect()),
        toml::Value::Table(table) => Value::Object(to_json_table(table)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerconf::{ConfigKey, Entry, Scope};

    fn location() -> Location {
        let uri = Location::opaque_uri("test", &["app.toml"]).unwrap();
        Location::new(Scope::Host, "test", uri)
    }

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    fn read(text: &str, options: &FormatOptions) -> Result<LayerContents, LayerError> {
        TomlFormat.read(&mut text.as_bytes(), &location(), options)
    }

    #[test]
    fn test_reads_tables_and_arrays() {
        let contents = read(
            "title = \"demo\"\n\n[net]\nport = 8080\nhosts = [\"a\", \"b\"]\n\n[net.tls]\nenabled = true\n",
            &FormatOptions::default(),
        )
        .unwrap();

        assert_eq!(contents.len(), 4);
        assert_eq!(contents.get(&key("net/port")).unwrap().as_i64().unwrap(), 8080);
        assert!(contents.get(&key("net/tls/enabled")).unwrap().as_bool().unwrap());
        assert_eq!(
            contents.get(&key("net/hosts")).unwrap().as_list().unwrap(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_datetime_reads_as_text() {
        let contents = read("released = 1979-05-27\n", &FormatOptions::default()).unwrap();
        assert_eq!(
            contents.get(&key("released")).unwrap().as_string().unwrap(),
            "1979-05-27"
        );
    }

    #[test]
    fn test_parse_error_omits_content() {
        let err = read("ok = 1\npassword = \"hunter2\n", &FormatOptions::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("line 2"));
        assert!(!message.contains("hunter2"));
    }

    #[test]
    fn test_header_comment_round_trip() {
        let options = FormatOptions {
            comments_reading: true,
            comments_writing: true,
            condensed: false,
        };
        let contents = read("# managed by ops\n# do not edit\nport = 1\n", &options).unwrap();
        assert_eq!(contents.header_comment(), Some("managed by ops\ndo not edit"));

        let mut out = Vec::new();
        TomlFormat
            .write(&contents, &mut out, &location(), &options)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# managed by ops\n# do not edit\n\n"));
        assert!(text.contains("port = 1"));
    }

    #[test]
    fn test_comments_ignored_by_default() {
        let contents = read("# note\nport = 1\n", &FormatOptions::default()).unwrap();
        assert_eq!(contents.header_comment(), None);
    }

    #[test]
    fn test_writes_nested_tables() {
        let contents: LayerContents = [
            Entry::new(key("net/port"), 9000),
            Entry::new(key("name"), "demo"),
        ]
        .into_iter()
        .collect();
        let mut out = Vec::new();
        TomlFormat
            .write(&contents, &mut out, &location(), &FormatOptions::default())
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        let reread = read(&text, &FormatOptions::default()).unwrap();
        assert_eq!(reread.get(&key("net/port")).unwrap().as_i64().unwrap(), 9000);
        assert_eq!(reread.get(&key("name")).unwrap().as_string().unwrap(), "demo");
    }
}
