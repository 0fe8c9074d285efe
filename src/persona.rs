//! Agent persona catalog.
//!
//! Every conversation is scoped to exactly one [`Persona`]. The catalog is
//! fixed at compile time; personas are identified on the wire by their
//! snake_case tag (`career_explorer`, `skill_builder`, `job_advisor`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A named agent identity with fixed descriptive metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    /// Discovers career paths that match the visitor's interests.
    #[default]
    CareerExplorer,
    /// Builds the skills needed for a chosen career.
    SkillBuilder,
    /// Real-world job roles and opportunities.
    JobAdvisor,
}

impl Persona {
    /// All personas in sidebar order.
    pub const ALL: [Persona; 3] = [Self::CareerExplorer, Self::SkillBuilder, Self::JobAdvisor];

    /// Wire tag of this persona.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::CareerExplorer => "career_explorer",
            Self::SkillBuilder => "skill_builder",
            Self::JobAdvisor => "job_advisor",
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CareerExplorer => "Career Explorer",
            Self::SkillBuilder => "Skill Builder",
            Self::JobAdvisor => "Job Advisor",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::CareerExplorer => "Discovers career paths that match your interests",
            Self::SkillBuilder => "Helps you develop the skills needed for your chosen career",
            Self::JobAdvisor => "Provides information about real-world job roles and opportunities",
        }
    }

    /// Accent color used by the page for this persona.
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::CareerExplorer => "blue",
            Self::SkillBuilder => "green",
            Self::JobAdvisor => "purple",
        }
    }

    /// Opening message of a fresh session, authored as this persona.
    #[must_use]
    pub fn greeting(self) -> String {
        format!(
            "Hello! I'm your {}. I'm here to help you with your career journey. What would you like to know?",
            self.name()
        )
    }

    /// Catalog entry for API responses.
    #[must_use]
    pub fn info(self) -> PersonaInfo {
        PersonaInfo {
            tag: self,
            name: self.name(),
            description: self.description(),
            color: self.color(),
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Persona {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.tag() == s)
            .ok_or_else(|| AppError::UnknownPersona(s.to_string()))
    }
}

/// Serializable catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct PersonaInfo {
    pub tag: Persona,
    pub name: &'static str,
    pub description: &'static str,
    pub color: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip() {
        for persona in Persona::ALL {
            assert_eq!(persona.tag().parse::<Persona>().unwrap(), persona);
            let json = serde_json::to_string(&persona).unwrap();
            assert_eq!(json, format!("\"{}\"", persona.tag()));
        }
    }

    #[test]
    fn test_unknown_tag() {
        let err = "life_coach".parse::<Persona>().unwrap_err();
        assert!(matches!(err, AppError::UnknownPersona(tag) if tag == "life_coach"));
    }

    #[test]
    fn test_greeting_names_persona() {
        assert_eq!(
            Persona::SkillBuilder.greeting(),
            "Hello! I'm your Skill Builder. I'm here to help you with your career journey. What would you like to know?"
        );
        assert_eq!(Persona::default(), Persona::CareerExplorer);
    }
}
