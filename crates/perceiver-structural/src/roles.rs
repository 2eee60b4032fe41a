use std::fmt;

use serde::{Deserialize, Serialize};

/// Accessibility role of an element, reduced to the vocabulary the matcher
/// reasons about. Anything else is carried verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RoleKind {
    Button,
    Link,
    Textbox,
    Searchbox,
    Combobox,
    Checkbox,
    Radio,
    Slider,
    Spinbutton,
    Switch,
    Img,
    Menuitem,
    Tab,
    StaticText,
    Paragraph,
    Heading,
    Generic,
    Other(String),
}

impl RoleKind {
    /// Parses an ARIA or accessibility-tree role name. Never fails.
    pub fn parse(raw: &str) -> Self {
        let role = raw.trim().to_ascii_lowercase();
        match role.as_str() {
            "button" | "pushbutton" => RoleKind::Button,
            "link" => RoleKind::Link,
            "textbox" => RoleKind::Textbox,
            "searchbox" => RoleKind::Searchbox,
            "combobox" => RoleKind::Combobox,
            "checkbox" => RoleKind::Checkbox,
            "radio" => RoleKind::Radio,
            "slider" => RoleKind::Slider,
            "spinbutton" => RoleKind::Spinbutton,
            "switch" => RoleKind::Switch,
            "img" | "image" => RoleKind::Img,
            "menuitem" => RoleKind::Menuitem,
            "tab" => RoleKind::Tab,
            "statictext" | "text" => RoleKind::StaticText,
            "paragraph" => RoleKind::Paragraph,
            "heading" => RoleKind::Heading,
            "generic" => RoleKind::Generic,
            _ => RoleKind::Other(role),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoleKind::Button => "button",
            RoleKind::Link => "link",
            RoleKind::Textbox => "textbox",
            RoleKind::Searchbox => "searchbox",
            RoleKind::Combobox => "combobox",
            RoleKind::Checkbox => "checkbox",
            RoleKind::Radio => "radio",
            RoleKind::Slider => "slider",
            RoleKind::Spinbutton => "spinbutton",
            RoleKind::Switch => "switch",
            RoleKind::Img => "img",
            RoleKind::Menuitem => "menuitem",
            RoleKind::Tab => "tab",
            RoleKind::StaticText => "statictext",
            RoleKind::Paragraph => "paragraph",
            RoleKind::Heading => "heading",
            RoleKind::Generic => "generic",
            RoleKind::Other(raw) => raw,
        }
    }

    /// Roles a user operates: they need a name and keyboard access.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            RoleKind::Button
                | RoleKind::Link
                | RoleKind::Textbox
                | RoleKind::Searchbox
                | RoleKind::Combobox
                | RoleKind::Checkbox
                | RoleKind::Radio
                | RoleKind::Slider
                | RoleKind::Spinbutton
                | RoleKind::Switch
                | RoleKind::Menuitem
                | RoleKind::Tab
        )
    }

    /// Generic containers and roles outside the vocabulary.
    pub fn is_neutral(&self) -> bool {
        matches!(self, RoleKind::Generic | RoleKind::Other(_))
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for RoleKind {
    fn from(value: String) -> Self {
        RoleKind::parse(&value)
    }
}

impl From<RoleKind> for String {
    fn from(value: RoleKind) -> Self {
        value.as_str().to_string()
    }
}

/// Explicit `role` wins; otherwise the implicit role of the tag.
pub fn resolve_role(explicit: Option<&str>, tag_name: &str, input_type: Option<&str>) -> RoleKind {
    if let Some(role) = explicit.map(str::trim).filter(|r| !r.is_empty()) {
        // first token of a role list is the one browsers honour
        let first = role.split_whitespace().next().unwrap_or(role);
        return RoleKind::parse(first);
    }
    implicit_role(tag_name, input_type)
}

pub fn implicit_role(tag_name: &str, input_type: Option<&str>) -> RoleKind {
    let tag = tag_name.trim().to_ascii_uppercase();
    match tag.as_str() {
        "A" => RoleKind::Link,
        "BUTTON" => RoleKind::Button,
        "INPUT" => input_role(input_type),
        "TEXTAREA" => RoleKind::Textbox,
        "SELECT" => RoleKind::Combobox,
        "IMG" => RoleKind::Img,
        "H1" | "H2" | "H3" | "H4" | "H5" | "H6" => RoleKind::Heading,
        "P" => RoleKind::Paragraph,
        "DIV" | "SPAN" => RoleKind::Generic,
        "" => RoleKind::Generic,
        other => RoleKind::Other(other.to_ascii_lowercase()),
    }
}

fn input_role(input_type: Option<&str>) -> RoleKind {
    let kind = input_type
        .map(|t| t.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match kind.as_str() {
        "button" | "submit" | "reset" | "image" => RoleKind::Button,
        "checkbox" => RoleKind::Checkbox,
        "radio" => RoleKind::Radio,
        "range" => RoleKind::Slider,
        "number" => RoleKind::Spinbutton,
        "search" => RoleKind::Searchbox,
        "hidden" => RoleKind::Other("hidden".into()),
        _ => RoleKind::Textbox,
    }
}

/// Tags that take focus without a tabindex.
pub fn natively_focusable(tag_name: &str, input_type: Option<&str>) -> bool {
    match tag_name.trim().to_ascii_uppercase().as_str() {
        "A" | "BUTTON" | "SELECT" | "TEXTAREA" => true,
        "INPUT" => !matches!(input_type.map(str::trim), Some(t) if t.eq_ignore_ascii_case("hidden")),
        _ => false,
    }
}

/// First non-blank of aria-label, alt (images only), inner text, title.
pub fn accessible_name(
    aria_label: Option<&str>,
    alt: Option<&str>,
    inner_text: Option<&str>,
    title: Option<&str>,
    is_image: bool,
) -> String {
    let alt = if is_image { alt } else { None };
    [aria_label, alt, inner_text, title]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}
