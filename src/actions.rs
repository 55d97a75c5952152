//! Builders for Inkscape shell action strings.
//!
//! Actions are pure string formatting with no state: `name`, `name:arg` or
//! `name:arg1:arg2`. A command sent to the shell is one or more actions
//! joined with `;`. See `inkscape --actions` for the full catalogue.

use std::fmt;

/// DPI conversion method used when importing legacy documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpiMethod {
    None,
    ScaleViewbox,
    ScaleDocument,
}

impl DpiMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ScaleViewbox => "scale-viewbox",
            Self::ScaleDocument => "scale-document",
        }
    }
}

impl fmt::Display for DpiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scope used when inverting the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvertOption {
    All,
    Layers,
    NoLayers,
    Groups,
    NoGroups,
}

impl InvertOption {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Layers => "layers",
            Self::NoLayers => "no-layers",
            Self::Groups => "groups",
            Self::NoGroups => "no-groups",
        }
    }
}

impl fmt::Display for InvertOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open a file as the active document.
#[must_use]
pub fn file_open(path: &str) -> String {
    format!("file-open:{path}")
}

/// Close the active document.
#[must_use]
pub fn file_close() -> String {
    "file-close".to_owned()
}

/// Set the export file name; the extension selects the export type.
#[must_use]
pub fn export_filename(path: &str) -> String {
    format!("export-filename:{path}")
}

/// Perform the export with the current export settings.
#[must_use]
pub fn export_do() -> String {
    "export-do".to_owned()
}

/// Restrict the export to the given area.
#[must_use]
pub fn export_area(x0: i32, y0: i32, x1: i32, y1: i32) -> String {
    format!("export-area:{x0}:{y0}:{x1}:{y1}")
}

/// Set the PDF version for PDF exports.
#[must_use]
pub fn export_pdf_version(version: &str) -> String {
    format!("export-pdf-version:{version}")
}

/// Set the DPI conversion method for imports.
#[must_use]
pub fn convert_dpi_method(method: DpiMethod) -> String {
    format!("convert-dpi-method:{method}")
}

/// Select every object in the document.
#[must_use]
pub fn select_all() -> String {
    "select-all".to_owned()
}

/// Select objects by element id.
#[must_use]
pub fn select_by_id(id: &str) -> String {
    format!("select-by-id:{id}")
}

/// Select objects by class name.
#[must_use]
pub fn select_by_class(class_name: &str) -> String {
    format!("select-by-class:{class_name}")
}

/// Select objects by SVG element name, e.g. `rect`.
#[must_use]
pub fn select_by_element(element: &str) -> String {
    format!("select-by-element:{element}")
}

/// Select objects by CSS selector.
#[must_use]
pub fn select_by_css(selector: &str) -> String {
    format!("select-by-selector:{selector}")
}

/// Clear the current selection.
#[must_use]
pub fn select_clear() -> String {
    "select-clear".to_owned()
}

/// Invert the current selection within the given scope.
#[must_use]
pub fn select_invert(option: InvertOption) -> String {
    format!("select-invert:{option}")
}

/// Print the objects in the current selection.
#[must_use]
pub fn select_list() -> String {
    "select-list".to_owned()
}

/// Print the Inkscape version.
#[must_use]
pub fn version() -> String {
    "inkscape-version".to_owned()
}

/// Leave the interactive shell.
#[must_use]
pub fn quit() -> String {
    "quit".to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_arg_actions() {
        assert_eq!(file_open("in.svg"), "file-open:in.svg");
        assert_eq!(export_filename("out.pdf"), "export-filename:out.pdf");
        assert_eq!(select_by_id("rect42"), "select-by-id:rect42");
        assert_eq!(select_by_css("#circle"), "select-by-selector:#circle");
    }

    #[test]
    fn test_bare_actions() {
        assert_eq!(file_close(), "file-close");
        assert_eq!(export_do(), "export-do");
        assert_eq!(select_all(), "select-all");
        assert_eq!(version(), "inkscape-version");
        assert_eq!(quit(), "quit");
    }

    #[test]
    fn test_export_area_joins_coordinates() {
        assert_eq!(export_area(0, 0, 200, 100), "export-area:0:0:200:100");
    }

    #[test]
    fn test_enum_arguments() {
        assert_eq!(
            convert_dpi_method(DpiMethod::ScaleViewbox),
            "convert-dpi-method:scale-viewbox"
        );
        assert_eq!(
            select_invert(InvertOption::NoGroups),
            "select-invert:no-groups"
        );
    }
}
