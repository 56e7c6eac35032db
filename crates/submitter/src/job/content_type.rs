use serde::{Deserialize, Serialize};

/// Kind of content recognised by the content engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    Map,
    MapPack,
    Skin,
    Model,
    Voice,
    Mutator,
    Announcer,
    Unknown,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Map => "MAP",
            ContentType::MapPack => "MAP_PACK",
            ContentType::Skin => "SKIN",
            ContentType::Model => "MODEL",
            ContentType::Voice => "VOICE",
            ContentType::Mutator => "MUTATOR",
            ContentType::Announcer => "ANNOUNCER",
            ContentType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "MAP" => Ok(ContentType::Map),
            "MAP_PACK" => Ok(ContentType::MapPack),
            "SKIN" => Ok(ContentType::Skin),
            "MODEL" => Ok(ContentType::Model),
            "VOICE" => Ok(ContentType::Voice),
            "MUTATOR" => Ok(ContentType::Mutator),
            "ANNOUNCER" => Ok(ContentType::Announcer),
            "UNKNOWN" => Ok(ContentType::Unknown),
            other => Err(format!("unknown content type '{}'", other)),
        }
    }
}
