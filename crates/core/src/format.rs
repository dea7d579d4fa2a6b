//! Serialization format contract.
//!
//! The core never parses or renders a concrete syntax; storages hand byte
//! streams to a `Format` and get `LayerContents` back.

use std::io::{Read, Write};

use crate::error::LayerError;
use crate::layer::{LayerContents, MemoryLayer};
use crate::location::Location;
use crate::settings::Settings;

/// Options passed to format readers and writers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    pub comments_reading: bool,
    pub comments_writing: bool,
    pub condensed: bool,
}

impl FormatOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            comments_reading: settings.comments_reading,
            comments_writing: settings.comments_writing,
            condensed: settings.write_condensed_format,
        }
    }
}

/// A serialization format such as JSON or TOML.
pub trait Format: Send + Sync {
    fn id(&self) -> &str;

    /// File extensions without the leading dot, preferred first.
    fn extensions(&self) -> &[&'static str];

    fn read(
        &self,
        input: &mut dyn Read,
        location: &Location,
        options: &FormatOptions,
    ) -> Result<LayerContents, LayerError>;

    fn write(
        &self,
        contents: &LayerContents,
        output: &mut dyn Write,
        location: &Location,
        options: &FormatOptions,
    ) -> Result<(), LayerError>;

    /// Reads a stream into a read-only layer bound to `location`.
    fn read_layer(
        &self,
        input: &mut dyn Read,
        location: &Location,
        options: &FormatOptions,
    ) -> Result<MemoryLayer, LayerError> {
        let contents = self.read(input, location, options)?;
        Ok(MemoryLayer::read_only(location.clone(), contents))
    }
}
