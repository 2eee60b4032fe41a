use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// The detector's closed seven-way class taxonomy, in detector index order.
///
/// The evaluation tooling also knows a "background" class (index 7); it is
/// deliberately not representable here.
#[cfg_attr(
    feature = "serde-full",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum DetectionClass {
    Button,
    Link,
    Input,
    Image,
    Icon,
    Text,
    Heading,
}

impl DetectionClass {
    pub const ALL: [DetectionClass; 7] = [
        DetectionClass::Button,
        DetectionClass::Link,
        DetectionClass::Input,
        DetectionClass::Image,
        DetectionClass::Icon,
        DetectionClass::Text,
        DetectionClass::Heading,
    ];

    pub fn from_index(index: i64) -> Result<Self, CoreError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(CoreError::ClassIndexOutOfRange(index))
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Classes a user is expected to click, tap or type into.
    pub fn is_interactive(self) -> bool {
        matches!(
            self,
            DetectionClass::Button
                | DetectionClass::Link
                | DetectionClass::Input
                | DetectionClass::Icon
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DetectionClass::Button => "button",
            DetectionClass::Link => "link",
            DetectionClass::Input => "input",
            DetectionClass::Image => "image",
            DetectionClass::Icon => "icon",
            DetectionClass::Text => "text",
            DetectionClass::Heading => "heading",
        }
    }
}

impl fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.as_str() == lowered)
            .ok_or_else(|| format!("unknown detection class '{s}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trip() {
        for class in DetectionClass::ALL {
            assert_eq!(DetectionClass::from_index(class.index() as i64), Ok(class));
        }
    }

    #[test]
    fn background_index_is_rejected() {
        assert_eq!(
            DetectionClass::from_index(7),
            Err(CoreError::ClassIndexOutOfRange(7))
        );
        assert!(DetectionClass::from_index(-1).is_err());
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Button".parse::<DetectionClass>(), Ok(DetectionClass::Button));
        assert!("background".parse::<DetectionClass>().is_err());
    }
}
