//! The travel planner stage catalog

use crate::stage::StageDefinition;

pub const RESEARCHER: &str = "Researcher";
pub const WEATHER_ANALYST: &str = "WeatherAnalyst";
pub const PLANNER: &str = "Planner";

const RESEARCHER_INSTRUCTIONS: &str = "\
You research travel destinations. For the destination in the user's request, write a short brief with:
1. Main sights and places worth visiting
2. Local customs and etiquette
3. Getting around
4. When to go
5. Practical tips

Keep it factual and use bullet points. Reply with the brief only.";

const WEATHER_ANALYST_INSTRUCTIONS: &str = "\
You analyze weather and travel conditions. Using the research brief above and the destination the user asked about:
1. Call get_weather for each destination
2. Call get_current_time for the local time
3. Call search_restaurants if dining would help the plan

Then summarize current conditions and what to pack, the best windows for outdoor plans, and any weather advisories.
Always call the tools before describing the weather. Reply with the analysis only.";

const PLANNER_INSTRUCTIONS: &str = "\
You build travel plans. From the research brief and weather analysis above, write:
1. A 3-day itinerary with morning, afternoon and evening activities
2. A packing list suited to the weather
3. A rough daily budget in USD
4. Restaurant suggestions when dining data is available
5. Local tips

Keep it practical and well structured. Reply with the plan only.";

/// Researcher, then WeatherAnalyst (with tools), then Planner
pub fn travel_planner() -> Vec<StageDefinition> {
    vec![
        StageDefinition::new(RESEARCHER, RESEARCHER_INSTRUCTIONS),
        StageDefinition::new(WEATHER_ANALYST, WEATHER_ANALYST_INSTRUCTIONS).with_tools(),
        StageDefinition::new(PLANNER, PLANNER_INSTRUCTIONS),
    ]
}
