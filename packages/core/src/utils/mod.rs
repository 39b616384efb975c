//! Utility functions for XmlSpace Core
//!
//! This module provides the XML codec shared by the storage services.

mod xml;

pub use xml::{parse_document, render_document, render_element, XmlError, DEFAULT_MAX_DEPTH};
