//! Stage and task descriptors
//!
//! `StageId` is the stable identifier used as the result-map key and in
//! progress events. Display labels and prompt text live in a separate
//! table so renaming a role never changes a key.

use serde::{Deserialize, Serialize};

/// One step of the itinerary pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageId {
    Destination,
    Accommodation,
    Transportation,
    Activities,
    Dining,
    Itinerary,
}

impl StageId {
    /// Every stage in pipeline order.
    pub const ALL: [StageId; 6] = [
        StageId::Destination,
        StageId::Accommodation,
        StageId::Transportation,
        StageId::Activities,
        StageId::Dining,
        StageId::Itinerary,
    ];

    /// The independent research stages that feed the itinerary.
    pub const RESEARCH: [StageId; 5] = [
        StageId::Destination,
        StageId::Accommodation,
        StageId::Transportation,
        StageId::Activities,
        StageId::Dining,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StageId::Destination => "destination",
            StageId::Accommodation => "accommodation",
            StageId::Transportation => "transportation",
            StageId::Activities => "activities",
            StageId::Dining => "dining",
            StageId::Itinerary => "itinerary",
        }
    }

    /// Position in the pipeline (0-based).
    pub fn index(self) -> usize {
        match self {
            StageId::Destination => 0,
            StageId::Accommodation => 1,
            StageId::Transportation => 2,
            StageId::Activities => 3,
            StageId::Dining => 4,
            StageId::Itinerary => 5,
        }
    }

    /// Agent role shown in activity logs and progress widgets.
    pub fn role(self) -> &'static str {
        match self {
            StageId::Destination => "Destination Research Specialist",
            StageId::Accommodation => "Accommodation Specialist",
            StageId::Transportation => "Transportation Planner",
            StageId::Activities => "Activities Curator",
            StageId::Dining => "Dining Connoisseur",
            StageId::Itinerary => "Itinerary Creator",
        }
    }

    /// Section heading used when stage output is folded into a document.
    pub fn heading(self) -> &'static str {
        match self {
            StageId::Destination => "Destination Information",
            StageId::Accommodation => "Accommodation Options",
            StageId::Transportation => "Transportation Plan",
            StageId::Activities => "Recommended Activities",
            StageId::Dining => "Dining Recommendations",
            StageId::Itinerary => "Itinerary",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Immutable description of one agent task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: &'static str,
    pub role: &'static str,
    pub goal: &'static str,
    pub instructions: &'static str,
}

const CONTEXT_PLACEHOLDER: &str = "{context}";

const PROMPT_TEMPLATE: &str = "You are the {role}. {goal}

{instructions}

{context}";

impl TaskSpec {
    /// The task that executes a pipeline stage.
    pub fn for_stage(stage: StageId) -> Self {
        match stage {
            StageId::Destination => TaskSpec {
                name: stage.key(),
                role: stage.role(),
                goal: "Research the destination thoroughly for the traveler.",
                instructions: "Describe the destination's highlights, best areas to explore, local \
                    customs and etiquette, weather for the travel dates, safety notes and any \
                    practical tips (currency, language, connectivity). Tailor the research to the \
                    traveler's stated interests.",
            },
            StageId::Accommodation => TaskSpec {
                name: stage.key(),
                role: stage.role(),
                goal: "Find accommodation that matches the traveler's budget and needs.",
                instructions: "Recommend 3-5 places to stay across suitable neighborhoods. For each, \
                    give the approximate nightly price range, why it suits this trip, and any \
                    booking advice. Respect the budget level strictly.",
            },
            StageId::Transportation => TaskSpec {
                name: stage.key(),
                role: stage.role(),
                goal: "Plan efficient travel routes to and around the destination.",
                instructions: "Compare the realistic options for getting from the origin to the \
                    destination (train, flight, bus, car) with typical durations and costs, then \
                    explain how to get around locally. Recommend the best overall option.",
            },
            StageId::Activities => TaskSpec {
                name: stage.key(),
                role: stage.role(),
                goal: "Recommend activities tailored to the traveler's interests.",
                instructions: "Suggest attractions, experiences and hidden gems that match the \
                    preferences and travel style. Include opening hours, entry fees and how much \
                    time each needs where you know them.",
            },
            StageId::Dining => TaskSpec {
                name: stage.key(),
                role: stage.role(),
                goal: "Find the best dining experiences for the trip.",
                instructions: "Recommend local dishes to try and specific restaurants, cafes or \
                    street food spots across price ranges. Honor any dietary restrictions listed \
                    in the special requirements.",
            },
            StageId::Itinerary => TaskSpec {
                name: stage.key(),
                role: stage.role(),
                goal: "Put all research together into a day-by-day travel plan.",
                instructions: "Using the research below, write a complete itinerary with one section \
                    per day (morning, afternoon, evening), including where to stay, how to travel \
                    between places, what to do and where to eat. Finish with an estimated budget \
                    summary and a short packing list.",
            },
        }
    }

    /// Free-form question answering about the current trip.
    pub fn chat() -> Self {
        TaskSpec {
            name: "chat",
            role: "Travel Assistant",
            goal: "Answer the traveler's question about their trip.",
            instructions: "Be direct, friendly and concise. Use the travel plan context when it is \
                relevant, and say so honestly when you do not know something.",
        }
    }

    /// Fill the prompt template with a materialized context string.
    pub fn render_prompt(&self, context: &str) -> String {
        PROMPT_TEMPLATE
            .replace("{role}", self.role)
            .replace("{goal}", self.goal)
            .replace("{instructions}", self.instructions)
            .replacen(CONTEXT_PLACEHOLDER, context, 1)
    }
}

/// Language directive prepended to every stage context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLanguage {
    #[default]
    English,
    Hindi,
    Korean,
    Japanese,
    Chinese,
    Spanish,
    French,
    German,
    Arabic,
}

impl OutputLanguage {
    /// Unknown codes fall back to English.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "hi" | "hindi" => OutputLanguage::Hindi,
            "ko" | "korean" => OutputLanguage::Korean,
            "ja" | "japanese" => OutputLanguage::Japanese,
            "zh" | "chinese" => OutputLanguage::Chinese,
            "es" | "spanish" => OutputLanguage::Spanish,
            "fr" | "french" => OutputLanguage::French,
            "de" | "german" => OutputLanguage::German,
            "ar" | "arabic" => OutputLanguage::Arabic,
            _ => OutputLanguage::English,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            OutputLanguage::English => "en",
            OutputLanguage::Hindi => "hi",
            OutputLanguage::Korean => "ko",
            OutputLanguage::Japanese => "ja",
            OutputLanguage::Chinese => "zh",
            OutputLanguage::Spanish => "es",
            OutputLanguage::French => "fr",
            OutputLanguage::German => "de",
            OutputLanguage::Arabic => "ar",
        }
    }

    pub fn directive(self) -> &'static str {
        match self {
            OutputLanguage::English => "Please output the response in English.",
            OutputLanguage::Hindi => "कृपया उत्तर हिंदी में दें।",
            OutputLanguage::Korean => "한국어로 출력해 주세요.",
            OutputLanguage::Japanese => "日本語で出力してください。",
            OutputLanguage::Chinese => "请用中文输出。",
            OutputLanguage::Spanish => "Por favor, responda en español.",
            OutputLanguage::French => "Veuillez répondre en français.",
            OutputLanguage::German => "Bitte antworten Sie auf Deutsch.",
            OutputLanguage::Arabic => "يرجى الرد باللغة العربية.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_keys() {
        let keys: Vec<_> = StageId::ALL.iter().map(|s| s.key()).collect();
        assert_eq!(
            keys,
            vec!["destination", "accommodation", "transportation", "activities", "dining", "itinerary"]
        );
        for (i, stage) in StageId::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
            assert_eq!(StageId::from_key(stage.key()), Some(*stage));
        }
        assert!(!StageId::RESEARCH.contains(&StageId::Itinerary));
    }

    #[test]
    fn test_stage_serializes_as_key() {
        assert_eq!(serde_json::to_string(&StageId::Dining).unwrap(), "\"dining\"");
    }

    #[test]
    fn test_render_prompt_fills_context() {
        let task = TaskSpec::for_stage(StageId::Dining);
        let prompt = task.render_prompt("Destination: Agra");
        assert!(prompt.starts_with("You are the Dining Connoisseur."));
        assert!(prompt.ends_with("Destination: Agra"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn test_render_prompt_keeps_braces_in_context() {
        let prompt = TaskSpec::chat().render_prompt("Question: what is {role}?");
        assert!(prompt.ends_with("Question: what is {role}?"));
    }

    #[test]
    fn test_language_fallback() {
        assert_eq!(OutputLanguage::from_code("FR"), OutputLanguage::French);
        assert_eq!(OutputLanguage::from_code("xx"), OutputLanguage::English);
        assert_eq!(OutputLanguage::Korean.code(), "ko");
    }
}
