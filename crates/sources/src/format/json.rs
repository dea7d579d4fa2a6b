//! JSON format.

use std::io::{Read, Write};

use serde_json::Value;

use layerconf::{Format, FormatOptions, LayerContents, LayerError, Location};

use super::{flatten, nest};

/// JSON documents; comments are not representable and are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormat;

impl Format for JsonFormat {
    fn id(&self) -> &str {
        "json"
    }

    fn extensions(&self) -> &[&'static str] {
        &["json"]
    }

    fn read(
        &self,
        input: &mut dyn Read,
        location: &Location,
        _options: &FormatOptions,
    ) -> Result<LayerContents, LayerError> {
        let document: Value = serde_json::from_reader(input).map_err(|e| {
            if e.is_io() {
                LayerError::Read {
                    location: location.uri().to_string(),
                    source: e.into(),
                }
            } else {
                LayerError::Parse {
                    location: location.uri().to_string(),
                    message: format!(
                        "{:?} error at line {}, column {}",
                        e.classify(),
                        e.line(),
                        e.column()
                    ),
                }
            }
        })?;
        flatten(document, location)
    }

    fn write(
        &self,
        contents: &LayerContents,
        output: &mut dyn Write,
        location: &Location,
        options: &FormatOptions,
    ) -> Result<(), LayerError> {
        let document = Value::Object(nest(contents, location)?);
        let write_error = |source: std::io::Error| LayerError::Write {
            location: location.uri().to_string(),
            source,
        };
        let rendered = if options.condensed {
            serde_json::to_vec(&document)
        } else {
            serde_json::to_vec_pretty(&document)
        }
        .map_err(|e| LayerError::Encode {
            location: location.uri().to_string(),
            message: e.to_string(),
        })?;
        output.write_all(&rendered).map_err(write_error)?;
        output.write_all(b"\n").map_err(write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layerconf::{ConfigKey, Entry, Scope};

    fn location() -> Location {
        let uri = Location::opaque_uri("test", &["app.json"]).unwrap();
        Location::new(Scope::User, "test", uri)
    }

    fn key(raw: &str) -> ConfigKey {
        ConfigKey::parse(raw).unwrap()
    }

    fn render(contents: &LayerContents, condensed: bool) -> String {
        let options = FormatOptions {
            condensed,
            ..FormatOptions::default()
        };
        let mut out = Vec::new();
        JsonFormat
            .write(contents, &mut out, &location(), &options)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_reads_nested_document() {
        let mut input = r#"{"net": {"port": 9000, "tls": true}, "name": "demo"}"#.as_bytes();
        let contents = JsonFormat
            .read(&mut input, &location(), &FormatOptions::default())
            .unwrap();

        assert_eq!(contents.get(&key("net/port")).unwrap().as_i64().unwrap(), 9000);
        assert!(contents.get(&key("net/tls")).unwrap().as_bool().unwrap());
        assert_eq!(contents.get(&key("name")).unwrap().as_string().unwrap(), "demo");
    }

    #[test]
    fn test_parse_error_reports_position_only() {
        let mut input = r#"{"password": "hunter2" "#.as_bytes();
        let err = JsonFormat
            .read(&mut input, &location(), &FormatOptions::default())
            .unwrap_err();

        assert!(matches!(err, LayerError::Parse { .. }));
        let message = err.to_string();
        assert!(message.contains("line 1"));
        assert!(!message.contains("hunter2"));
    }

    #[test]
    fn test_condensed_and_pretty_output() {
        let contents: LayerContents = [
            Entry::new(key("net/port"), 8080),
            Entry::new(key("blob"), vec![0xffu8, 0x01]),
        ]
        .into_iter()
        .collect();

        let condensed = render(&contents, true);
        assert_eq!(
            condensed,
            "{\"blob\":{\"$bytes\":\"ff01\"},\"net\":{\"port\":8080}}\n"
        );
        let pretty = render(&contents, false);
        assert!(pretty.contains("\n  \"net\": {\n"));
    }

    #[test]
    fn test_written_document_reads_back() {
        let contents: LayerContents = [
            Entry::new(key("a/b/c"), "deep"),
            Entry::new(key("list"), vec!["x", "y"]),
        ]
        .into_iter()
        .collect();
        let rendered = render(&contents, false);

        let reread = JsonFormat
            .read(&mut rendered.as_bytes(), &location(), &FormatOptions::default())
            .unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread.get(&key("a/b/c")).unwrap().as_string().unwrap(), "deep");
        assert_eq!(reread.get(&key("list")).unwrap().as_list().unwrap(), vec!["x", "y"]);
    }
}
