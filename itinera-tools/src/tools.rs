//! Travel tools
//!
//! Weather and restaurant data are canned; time is real, resolved for IANA
//! zone names and fixed offsets.

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use itinera_core::dto::tool::ToolSpec;
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required argument '{0}'")]
    MissingArgument(&'static str),
}

/// Tools advertised by `tools/list`
pub fn catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_weather".to_string(),
            description: "Get the current weather for a given location.".to_string(),
            input_schema: object_schema(&[(
                "location",
                "The city or location to get weather for",
            )]),
        },
        ToolSpec {
            name: "get_current_time".to_string(),
            description: "Get the current date and time for a given timezone.".to_string(),
            input_schema: object_schema(&[(
                "timezone_name",
                "Timezone name, e.g. 'UTC', 'US/Eastern', 'Europe/Madrid' or 'UTC+02:00'",
            )]),
        },
        ToolSpec {
            name: "search_restaurants".to_string(),
            description: "Search for restaurants in a given city by cuisine type.".to_string(),
            input_schema: object_schema(&[
                ("city", "The city to search restaurants in"),
                ("cuisine", "Type of cuisine, e.g. 'Italian', 'Japanese'"),
            ]),
        },
    ]
}

fn object_schema(properties: &[(&str, &str)]) -> Value {
    let props: serde_json::Map<String, Value> = properties
        .iter()
        .map(|(name, description)| {
            (
                name.to_string(),
                json!({"type": "string", "description": description}),
            )
        })
        .collect();
    let required: Vec<&str> = properties.iter().map(|(name, _)| *name).collect();

    json!({"type": "object", "properties": props, "required": required})
}

/// Run a tool by name
pub fn call(name: &str, arguments: &Value) -> Result<String, ToolCallError> {
    match name {
        "get_weather" => Ok(get_weather(string_arg(arguments, "location")?)),
        "get_current_time" => Ok(get_current_time(
            string_arg(arguments, "timezone_name")?,
            Utc::now(),
        )),
        "search_restaurants" => Ok(search_restaurants(
            string_arg(arguments, "city")?,
            string_arg(arguments, "cuisine")?,
        )),
        other => Err(ToolCallError::UnknownTool(other.to_string())),
    }
}

fn string_arg<'a>(arguments: &'a Value, name: &'static str) -> Result<&'a str, ToolCallError> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or(ToolCallError::MissingArgument(name))
}

// =============================================================================
// Weather
// =============================================================================

const WEATHER: &[(&str, &str)] = &[
    ("seattle", "Cloudy, 12°C, 80% humidity, light rain expected"),
    ("madrid", "Sunny, 28°C, 30% humidity, clear skies"),
    ("amsterdam", "Rainy, 8°C, 90% humidity, strong winds"),
    ("tokyo", "Clear skies, 22°C, 55% humidity, pleasant"),
    ("london", "Foggy, 10°C, 85% humidity, overcast"),
    ("paris", "Partly cloudy, 18°C, 65% humidity, mild breeze"),
    ("new york", "Sunny, 24°C, 50% humidity, warm"),
    ("barcelona", "Sunny, 26°C, 40% humidity, sea breeze"),
    ("rome", "Warm, 30°C, 35% humidity, clear skies"),
    ("berlin", "Overcast, 14°C, 75% humidity, cool"),
    ("lisbon", "Sunny, 25°C, 45% humidity, light wind"),
    (
        "bangkok",
        "Hot and humid, 34°C, 80% humidity, chance of thunderstorms",
    ),
    ("sydney", "Partly cloudy, 20°C, 60% humidity, mild"),
];

pub fn get_weather(location: &str) -> String {
    let key = location.trim().to_lowercase();

    match WEATHER.iter().find(|(city, _)| key.contains(city)) {
        Some((_, conditions)) => format!("Weather in {location}: {conditions}"),
        None => format!(
            "Weather in {location}: Partly cloudy, 18°C, 60% humidity (default estimate)"
        ),
    }
}

// =============================================================================
// Time
// =============================================================================

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn get_current_time(timezone_name: &str, now: DateTime<Utc>) -> String {
    let name = timezone_name.trim();

    if let Some(offset) = parse_offset(name) {
        return format!(
            "Current time in {}: {} {}",
            name,
            now.with_timezone(&offset).format(TIME_FORMAT),
            describe_offset(&offset)
        );
    }

    match name.parse::<Tz>() {
        Ok(zone) => format!(
            "Current time in {}: {} {}",
            name,
            now.with_timezone(&zone).format(TIME_FORMAT),
            now.with_timezone(&zone).format("%Z")
        ),
        Err(_) => format!(
            "Current time (UTC, '{}' not resolved): {} UTC",
            name,
            now.format(TIME_FORMAT)
        ),
    }
}

/// `UTC`, `GMT`, or a fixed offset like `UTC+02:00`, `UTC-5`, `+05:30`
fn parse_offset(name: &str) -> Option<FixedOffset> {
    let name = name.trim();
    let upper = name.to_ascii_uppercase();
    if matches!(upper.as_str(), "UTC" | "GMT" | "Z" | "ETC/UTC") {
        return FixedOffset::east_opt(0);
    }

    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);

    let (sign, digits) = match rest.split_at_checked(1)? {
        ("+", digits) => (1, digits),
        ("-", digits) => (-1, digits),
        _ => return None,
    };

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (digits.parse::<i32>().ok()?, 0),
    };
    if hours > 14 || minutes >= 60 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn describe_offset(offset: &FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return "UTC".to_string();
    }

    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!("UTC{}{:02}:{:02}", sign, minutes / 60, minutes % 60)
}

// =============================================================================
// Restaurants
// =============================================================================

const RESTAURANTS: &[((&str, &str), &[&str])] = &[
    (
        ("madrid", "italian"),
        &[
            "Trattoria Malatesta - Calle Lope de Vega 9 ★★★★☆",
            "Gioia Madrid - Calle de San Bartolomé 23 ★★★★★",
            "Cinquecento - Calle de Recoletos 6 ★★★★☆",
        ],
    ),
    (
        ("madrid", "spanish"),
        &[
            "Botín - Calle de Cuchilleros 17 ★★★★★ (world's oldest restaurant)",
            "Casa Lucio - Calle de la Cava Baja 35 ★★★★☆",
            "StreetXO - Calle de Serrano 52 ★★★★☆",
        ],
    ),
    (
        ("tokyo", "japanese"),
        &[
            "Sukiyabashi Jiro - Ginza ★★★★★",
            "Ichiran Ramen - Shibuya ★★★★☆",
            "Tsukiji Tamasuji - Tsukiji ★★★★★",
        ],
    ),
    (
        ("tokyo", "ramen"),
        &[
            "Fuunji - Shinjuku ★★★★★",
            "Afuri - Ebisu ★★★★☆",
            "Ichiran - Multiple locations ★★★★☆",
        ],
    ),
    (
        ("paris", "french"),
        &[
            "Le Comptoir du Panthéon - Rue Soufflot ★★★★☆",
            "Chez Janou - Rue Roger Verlomme ★★★★★",
            "Le Bouillon Chartier - Rue du Faubourg Montmartre ★★★★☆",
        ],
    ),
    (
        ("barcelona", "spanish"),
        &[
            "Cal Pep - Plaça de les Olles ★★★★★",
            "Tickets - Avinguda del Paral·lel ★★★★★",
            "Els Quatre Gats - Carrer de Montsió ★★★★☆",
        ],
    ),
    (
        ("seattle", "japanese"),
        &[
            "Shiro's Sushi - 2401 2nd Ave ★★★★★",
            "Jiro Sushi - 1011 Pike St ★★★★☆",
            "Kamonegi - 1054 N 39th St ★★★★★",
        ],
    ),
    (
        ("amsterdam", "dutch"),
        &[
            "De Silveren Spiegel - Kattengat 4-6 ★★★★★",
            "Moeders - Rozengracht 251 ★★★★☆",
            "Haesje Claes - Spuistraat 275 ★★★★☆",
        ],
    ),
];

pub fn search_restaurants(city: &str, cuisine: &str) -> String {
    let key = (city.trim().to_lowercase(), cuisine.trim().to_lowercase());

    let known = RESTAURANTS
        .iter()
        .find(|((c, k), _)| *c == key.0 && *k == key.1);

    match known {
        Some((_, list)) => {
            let lines: Vec<String> = list.iter().map(|r| format!("  • {r}")).collect();
            format!(
                "Restaurants in {city} ({cuisine} cuisine):\n{}",
                lines.join("\n")
            )
        }
        None => format!(
            "Found some {cuisine} restaurants in {city}:\n  \
             • The {cuisine} Kitchen - Downtown ★★★★☆\n  \
             • Casa {cuisine} - Old Town ★★★☆☆\n  \
             • {cuisine} Bistro - Riverside ★★★★★"
        ),
    }
}
