use serde::{Deserialize, Serialize};

/// Drawing technique a worksheet is built around.
/// Unknown ids are kept verbatim in `Custom` so that parsing never fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Technique {
    Coloring,
    LineDrawing,
    Pattern,
    Mandala,
    Zentangle,
    ConnectTheDots,
    Symmetry,
    StepByStep,
    Custom(String),
}

impl Technique {
    pub const KNOWN: [Technique; 8] = [
        Technique::Coloring,
        Technique::LineDrawing,
        Technique::Pattern,
        Technique::Mandala,
        Technique::Zentangle,
        Technique::ConnectTheDots,
        Technique::Symmetry,
        Technique::StepByStep,
    ];

    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_uppercase().as_str() {
            "COLORING" => Technique::Coloring,
            "LINE_DRAWING" => Technique::LineDrawing,
            "PATTERN" => Technique::Pattern,
            "MANDALA" => Technique::Mandala,
            "ZENTANGLE" => Technique::Zentangle,
            "CONNECT_THE_DOTS" => Technique::ConnectTheDots,
            "SYMMETRY" => Technique::Symmetry,
            "STEP_BY_STEP" => Technique::StepByStep,
            _ => Technique::Custom(id.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Technique::Coloring => "COLORING",
            Technique::LineDrawing => "LINE_DRAWING",
            Technique::Pattern => "PATTERN",
            Technique::Mandala => "MANDALA",
            Technique::Zentangle => "ZENTANGLE",
            Technique::ConnectTheDots => "CONNECT_THE_DOTS",
            Technique::Symmetry => "SYMMETRY",
            Technique::StepByStep => "STEP_BY_STEP",
            Technique::Custom(id) => id.as_str(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Technique::Coloring => "Coloring page",
            Technique::LineDrawing => "Line drawing",
            Technique::Pattern => "Pattern design",
            Technique::Mandala => "Mandala",
            Technique::Zentangle => "Zentangle",
            Technique::ConnectTheDots => "Connect the dots",
            Technique::Symmetry => "Symmetry drawing",
            Technique::StepByStep => "Step-by-step drawing guide",
            Technique::Custom(id) => id.as_str(),
        }
    }

    /// Style constraints handed to the image model for this technique.
    pub fn description(&self) -> &str {
        match self {
            Technique::Coloring => {
                "bold, closed black outlines with large empty regions ready to be colored in"
            }
            Technique::LineDrawing => {
                "clean continuous contour lines with minimal hatching, suitable for tracing and copying"
            }
            Technique::Pattern => {
                "repeating decorative motifs arranged on a clear grid, outlines only"
            }
            Technique::Mandala => {
                "radially symmetric circular design built from concentric rings of motifs"
            }
            Technique::Zentangle => {
                "structured sections filled with distinct repetitive tangle patterns"
            }
            Technique::ConnectTheDots => {
                "numbered dots in sequence that reveal the subject when connected, with a faint hint outline"
            }
            Technique::Symmetry => {
                "one half of the subject fully drawn beside a vertical center line, the other half left blank for students to mirror"
            }
            Technique::StepByStep => {
                "a sequence of numbered panels that build the subject from basic shapes to the finished drawing"
            }
            Technique::Custom(id) => id.as_str(),
        }
    }
}

impl From<String> for Technique {
    fn from(value: String) -> Self {
        Technique::from_id(&value)
    }
}

impl From<Technique> for String {
    fn from(value: Technique) -> Self {
        value.id().to_string()
    }
}

/// Subject area of a worksheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Theme {
    Animals,
    Nature,
    Seasons,
    Holidays,
    Fantasy,
    Space,
    Ocean,
    Vehicles,
    Architecture,
    Food,
    Custom(String),
}

impl Theme {
    pub const KNOWN: [Theme; 10] = [
        Theme::Animals,
        Theme::Nature,
        Theme::Seasons,
        Theme::Holidays,
        Theme::Fantasy,
        Theme::Space,
        Theme::Ocean,
        Theme::Vehicles,
        Theme::Architecture,
        Theme::Food,
    ];

    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_uppercase().as_str() {
            "ANIMALS" => Theme::Animals,
            "NATURE" => Theme::Nature,
            "SEASONS" => Theme::Seasons,
            "HOLIDAYS" => Theme::Holidays,
            "FANTASY" => Theme::Fantasy,
            "SPACE" => Theme::Space,
            "OCEAN" => Theme::Ocean,
            "VEHICLES" => Theme::Vehicles,
            "ARCHITECTURE" => Theme::Architecture,
            "FOOD" => Theme::Food,
            _ => Theme::Custom(id.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Theme::Animals => "ANIMALS",
            Theme::Nature => "NATURE",
            Theme::Seasons => "SEASONS",
            Theme::Holidays => "HOLIDAYS",
            Theme::Fantasy => "FANTASY",
            Theme::Space => "SPACE",
            Theme::Ocean => "OCEAN",
            Theme::Vehicles => "VEHICLES",
            Theme::Architecture => "ARCHITECTURE",
            Theme::Food => "FOOD",
            Theme::Custom(id) => id.as_str(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Theme::Animals => "Animals",
            Theme::Nature => "Nature",
            Theme::Seasons => "Seasons",
            Theme::Holidays => "Holidays",
            Theme::Fantasy => "Fantasy",
            Theme::Space => "Space",
            Theme::Ocean => "Ocean life",
            Theme::Vehicles => "Vehicles",
            Theme::Architecture => "Architecture",
            Theme::Food => "Food",
            Theme::Custom(id) => id.as_str(),
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Theme::Animals => "friendly animals shown in their natural habitats",
            Theme::Nature => "plants, flowers, trees and landscapes",
            Theme::Seasons => "scenes and objects typical of spring, summer, autumn and winter",
            Theme::Holidays => "festive symbols and celebrations from around the world",
            Theme::Fantasy => "imaginative creatures, castles and magical scenes",
            Theme::Space => "planets, rockets, astronauts and stars",
            Theme::Ocean => "sea creatures, coral reefs and underwater scenery",
            Theme::Vehicles => "cars, trains, boats and aircraft",
            Theme::Architecture => "famous buildings, houses and city skylines",
            Theme::Food => "fruits, vegetables and everyday meals",
            Theme::Custom(id) => id.as_str(),
        }
    }
}

impl From<String> for Theme {
    fn from(value: String) -> Self {
        Theme::from_id(&value)
    }
}

impl From<Theme> for String {
    fn from(value: Theme) -> Self {
        value.id().to_string()
    }
}

/// Line weight, element count and complexity guidance for one age band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeGuidance {
    pub line_weight: &'static str,
    pub element_count: &'static str,
    pub complexity: &'static str,
}

/// Guidance used whenever the age group is not one of the known ids.
pub const MEDIUM_GUIDANCE: AgeGuidance = AgeGuidance {
    line_weight: "medium lines (about 2-3 pt)",
    element_count: "8 to 12 distinct elements",
    complexity: "medium complexity with a balance of large and small shapes",
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgeGroup {
    Preschool,
    LowerElem,
    UpperElem,
    MiddleSchool,
    HighSchool,
    Adult,
    Custom(String),
}

impl AgeGroup {
    pub const KNOWN: [AgeGroup; 6] = [
        AgeGroup::Preschool,
        AgeGroup::LowerElem,
        AgeGroup::UpperElem,
        AgeGroup::MiddleSchool,
        AgeGroup::HighSchool,
        AgeGroup::Adult,
    ];

    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_uppercase().as_str() {
            "PRESCHOOL" => AgeGroup::Preschool,
            "LOWER_ELEM" => AgeGroup::LowerElem,
            "UPPER_ELEM" => AgeGroup::UpperElem,
            "MIDDLE_SCHOOL" => AgeGroup::MiddleSchool,
            "HIGH_SCHOOL" => AgeGroup::HighSchool,
            "ADULT" => AgeGroup::Adult,
            _ => AgeGroup::Custom(id.to_string()),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            AgeGroup::Preschool => "PRESCHOOL",
            AgeGroup::LowerElem => "LOWER_ELEM",
            AgeGroup::UpperElem => "UPPER_ELEM",
            AgeGroup::MiddleSchool => "MIDDLE_SCHOOL",
            AgeGroup::HighSchool => "HIGH_SCHOOL",
            AgeGroup::Adult => "ADULT",
            AgeGroup::Custom(id) => id.as_str(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            AgeGroup::Preschool => "Preschool (3-5)",
            AgeGroup::LowerElem => "Lower elementary (6-8)",
            AgeGroup::UpperElem => "Upper elementary (9-11)",
            AgeGroup::MiddleSchool => "Middle school (11-14)",
            AgeGroup::HighSchool => "High school (14-18)",
            AgeGroup::Adult => "Adult",
            AgeGroup::Custom(id) => id.as_str(),
        }
    }

    pub fn guidance(&self) -> AgeGuidance {
        match self {
            AgeGroup::Preschool => AgeGuidance {
                line_weight: "very thick lines (about 5-6 pt)",
                element_count: "1 to 3 large elements",
                complexity: "very simple shapes with big open spaces",
            },
            AgeGroup::LowerElem => AgeGuidance {
                line_weight: "thick lines (about 4 pt)",
                element_count: "3 to 6 clear elements",
                complexity: "simple shapes with a few friendly details",
            },
            AgeGroup::UpperElem => MEDIUM_GUIDANCE,
            AgeGroup::MiddleSchool => AgeGuidance {
                line_weight: "medium-fine lines (about 1.5-2 pt)",
                element_count: "12 to 20 elements",
                complexity: "detailed shapes with some overlapping",
            },
            AgeGroup::HighSchool => AgeGuidance {
                line_weight: "fine lines (about 1 pt)",
                element_count: "20 or more elements",
                complexity: "intricate detail and layered composition",
            },
            AgeGroup::Adult => AgeGuidance {
                line_weight: "fine to very fine lines (0.5-1 pt)",
                element_count: "as many elements as the composition supports",
                complexity: "highly intricate detail suitable for focused, relaxing work",
            },
            AgeGroup::Custom(_) => MEDIUM_GUIDANCE,
        }
    }
}

impl From<String> for AgeGroup {
    fn from(value: String) -> Self {
        AgeGroup::from_id(&value)
    }
}

impl From<AgeGroup> for String {
    fn from(value: AgeGroup) -> Self {
        value.id().to_string()
    }
}
