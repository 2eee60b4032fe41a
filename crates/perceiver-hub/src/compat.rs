///! Which accessibility roles can stand behind which visual classes
use accessaudit_core_types::DetectionClass;
use perceiver_structural::RoleKind;

/// Semantic agreement between a detection class and an element role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    /// Generic containers and unknown roles
    Neutral,
    Incompatible,
}

impl Compatibility {
    pub fn score(self) -> f64 {
        match self {
            Compatibility::Compatible => 1.0,
            Compatibility::Neutral => 0.5,
            Compatibility::Incompatible => 0.0,
        }
    }
}

pub fn is_compatible(class: DetectionClass, role: &RoleKind) -> bool {
    use RoleKind::*;
    match class {
        DetectionClass::Button => matches!(role, Button | Menuitem | Tab),
        DetectionClass::Link => matches!(role, Link),
        DetectionClass::Input => matches!(
            role,
            Textbox | Searchbox | Combobox | Checkbox | Radio | Slider | Spinbutton | Switch
        ),
        DetectionClass::Image => matches!(role, Img),
        DetectionClass::Icon => matches!(role, Button | Link | Img | Menuitem | Tab),
        DetectionClass::Text => matches!(role, StaticText | Paragraph | Link),
        DetectionClass::Heading => matches!(role, Heading),
    }
}

pub fn compatibility(class: DetectionClass, role: &RoleKind) -> Compatibility {
    if is_compatible(class, role) {
        Compatibility::Compatible
    } else if role.is_neutral() {
        Compatibility::Neutral
    } else {
        Compatibility::Incompatible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookups() {
        assert!(is_compatible(DetectionClass::Button, &RoleKind::parse("pushbutton")));
        assert!(is_compatible(DetectionClass::Icon, &RoleKind::Img));
        assert!(is_compatible(DetectionClass::Text, &RoleKind::Link));
        assert!(!is_compatible(DetectionClass::Link, &RoleKind::Button));
        assert!(!is_compatible(DetectionClass::Heading, &RoleKind::Paragraph));
    }

    #[test]
    fn neutral_roles_score_half() {
        assert_eq!(
            compatibility(DetectionClass::Button, &RoleKind::Generic).score(),
            0.5
        );
        assert_eq!(
            compatibility(DetectionClass::Input, &RoleKind::Other("listitem".into())),
            Compatibility::Neutral
        );
        assert_eq!(
            compatibility(DetectionClass::Input, &RoleKind::Img),
            Compatibility::Incompatible
        );
        assert_eq!(
            compatibility(DetectionClass::Input, &RoleKind::Switch).score(),
            1.0
        );
    }
}
