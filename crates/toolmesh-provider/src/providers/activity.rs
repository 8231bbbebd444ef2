use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::fmt::Write as _;

use crate::error::{ToolError, ToolResult};
use crate::provider::{Arguments, ToolProvider};
use toolmesh_core::{CallToolResult, Implementation, ToolDescriptor};

pub const SERVER_NAME: &str = "activity-planner-agent";

const MAX_DURATION_DAYS: u64 = 60;

/// Templated itineraries, restaurant and attraction suggestions
#[derive(Debug, Default)]
pub struct ActivityProvider;

impl ActivityProvider {
    pub fn new() -> Self {
        Self
    }

    fn plan_activities(&self, args: &Arguments<'_>) -> ToolResult<CallToolResult> {
        let location = args.required_str("location")?;
        let days = args.required_u64("duration_days")?;
        if days == 0 || days > MAX_DURATION_DAYS {
            return Err(ToolError::InvalidArguments(format!(
                "Field 'duration_days' must be between 1 and {}",
                MAX_DURATION_DAYS
            )));
        }
        let budget = args.optional_f64("budget_per_day", 0.0)?;
        let interests = args.optional_str_list("interests")?;
        let interests = if interests.is_empty() {
            "General tourism".to_string()
        } else {
            interests.join(", ")
        };

        let mut plan = format!(
            "Activity Plan for {} ({} days)\n\nBudget: ${} per day\nInterests: {}\n\n\
             Day-by-day itinerary:\n",
            location, days, budget, interests
        );
        for day in 1..=days {
            let _ = write!(
                plan,
                "\nDay {}:\n  Morning: Explore local markets and breakfast spots\n  \
                 Afternoon: Visit main attractions and cultural sites\n  \
                 Evening: Dinner and local entertainment\n",
                day
            );
        }
        plan.push_str(
            "\nNote: This is a sample itinerary. \
             Specific recommendations can be obtained using other tools.",
        );

        Ok(CallToolResult::text(plan))
    }

    fn suggest_restaurants(&self, args: &Arguments<'_>) -> ToolResult<CallToolResult> {
        let location = args.required_str("location")?;
        let cuisine = args.optional_str("cuisine_type", "local")?;
        let budget = args.optional_str("budget", "moderate")?;
        if !matches!(budget, "budget" | "moderate" | "luxury") {
            return Err(ToolError::InvalidArguments(format!(
                "Field 'budget' must be one of budget, moderate, luxury; got '{}'",
                budget
            )));
        }

        Ok(CallToolResult::text(format!(
            "Restaurant Recommendations for {location}\n\n\
             Cuisine: {cuisine}\nBudget Level: {budget}\n\n\
             1. Local favorite - Traditional dishes and authentic atmosphere\n\
             2. Popular spot - Known for quality and service\n\
             3. Hidden gem - Off-the-beaten-path local experience\n\
             4. Modern fusion - Contemporary take on local cuisine\n\
             5. Street food areas - Budget-friendly authentic experience\n\n\
             Note: These are general categories. For specific restaurant names and locations, \
             please consult local travel guides or review platforms."
        )))
    }

    fn suggest_attractions(&self, args: &Arguments<'_>) -> ToolResult<CallToolResult> {
        let location = args.required_str("location")?;
        let category = title_case(args.optional_str("category", "cultural")?);

        Ok(CallToolResult::text(format!(
            "{category} Attractions in {location}\n\n\
             Top recommendations:\n\
             1. Major landmark or monument\n\
             2. Museums and galleries\n\
             3. Historical sites\n\
             4. Parks and outdoor spaces\n\
             5. Local neighborhoods worth exploring\n\n\
             Tips:\n\
             - Check opening hours and booking requirements\n\
             - Consider purchasing city passes for savings\n\
             - Plan visits during off-peak hours when possible"
        )))
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[async_trait]
impl ToolProvider for ActivityProvider {
    fn server_info(&self) -> Implementation {
        Implementation {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "plan_activities",
                "Generate activity recommendations for travelers based on location, \
                 duration, and preferences",
                json!({
                    "type": "object",
                    "properties": {
                        "location": {
                            "type": "string",
                            "description": "Destination city or location"
                        },
                        "duration_days": {
                            "type": "integer",
                            "description": "Number of days for the trip"
                        },
                        "budget_per_day": {
                            "type": "number",
                            "description": "Daily budget in the destination currency",
                            "default": 0
                        },
                        "interests": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Traveler interests (e.g., food, culture, adventure)",
                            "default": []
                        }
                    },
                    "required": ["location", "duration_days"]
                }),
            ),
            ToolDescriptor::new(
                "suggest_restaurants",
                "Suggest restaurants and local food experiences",
                json!({
                    "type": "object",
                    "properties": {
                        "location": {
                            "type": "string",
                            "description": "City or area for restaurant recommendations"
                        },
                        "cuisine_type": {
                            "type": "string",
                            "description":
                                "Preferred cuisine type (e.g., local, international, vegetarian)"
                        },
                        "budget": {
                            "type": "string",
                            "enum": ["budget", "moderate", "luxury"],
                            "default": "moderate"
                        }
                    },
                    "required": ["location"]
                }),
            ),
            ToolDescriptor::new(
                "suggest_attractions",
                "Recommend tourist attractions and sightseeing spots",
                json!({
                    "type": "object",
                    "properties": {
                        "location": { "type": "string", "description": "City or area" },
                        "category": {
                            "type": "string",
                            "description":
                                "Category: cultural, historical, nature, entertainment, shopping",
                            "default": "cultural"
                        }
                    },
                    "required": ["location"]
                }),
            ),
        ]
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> ToolResult<CallToolResult> {
        let args = Arguments(&arguments);
        match name {
            "plan_activities" => self.plan_activities(&args),
            "suggest_restaurants" => self.suggest_restaurants(&args),
            "suggest_attractions" => self.suggest_attractions(&args),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }
}
