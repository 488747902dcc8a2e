//! AnalysisResult struct - the structured report returned by the backend.

use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Risk rating used for single clauses and for the contract as a whole.
///
/// Only the three named levels are accepted. Backend replies are matched
/// case-insensitively, anything else fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RiskLevel::parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid risk level {raw:?}, expected Low, Medium or High"
            ))
        })
    }
}

/// What kind of contract this is and whose side it leans to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub contract_type: String,
    pub who_it_mainly_protects: String,
    pub overall_tone: String,
}

/// One logical clause of the contract, explained in plain language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    pub title: String,
    pub what_it_means: String,
    pub why_it_matters: String,
    /// Low, Medium, or High
    pub risk_level: RiskLevel,
    /// Situation in which the reader should be especially careful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_out_if: Option<String>,
}

impl Clause {
    /// The caveat, if the backend gave a non-blank one
    pub fn caveat(&self) -> Option<&str> {
        self.watch_out_if
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Overall risk and a plain-language verdict for the whole contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Low, Medium, or High
    pub overall_risk_level: RiskLevel,
    /// Reassuring but honest summary for the reader
    pub plain_verdict: String,
}

/// Web source the backend cited while grounding its answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Source {
    pub uri: String,
    pub title: String,
}

/// Structured contract analysis.
///
/// Everything except `sources` is produced by the backend under the schema
/// returned by [`AnalysisResult::response_schema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overview: Overview,
    pub clauses: Vec<Clause>,
    /// Hidden penalties, one-sided obligations, unfair termination and the like
    pub red_flags: Vec<String>,
    pub summary: Verdict,
    /// Things to do before signing
    pub checklist: Vec<String>,
    /// Only set when search grounding was requested; may contain duplicates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub sources: Option<Vec<Source>>,
}

impl AnalysisResult {
    /// JSON schema the backend output must satisfy
    pub fn response_schema() -> serde_json::Value {
        let schema = SchemaSettings::draft2020_12()
            .with(|s| s.inline_subschemas = true)
            .into_generator()
            .into_root_schema_for::<AnalysisResult>();

        let mut value = schema.to_value();
        if let Some(object) = value.as_object_mut() {
            object.remove("$schema");
            object.remove("title");
            object.remove("description");
        }
        value
    }

    /// Check if the backend returned nothing worth showing
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
            && self.red_flags.is_empty()
            && self.checklist.is_empty()
            && self.summary.plain_verdict.trim().is_empty()
    }

    /// Clauses rated at the given level
    pub fn clauses_at(&self, level: RiskLevel) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(move |c| c.risk_level == level)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};

    pub(crate) fn sample_json() -> Value {
        json!({
            "overview": {
                "contractType": "Freelance Services Agreement",
                "whoItMainlyProtects": "The client",
                "overallTone": "Formal, somewhat one-sided"
            },
            "clauses": [
                {
                    "title": "Payment Terms",
                    "whatItMeans": "You get paid 60 days after sending an invoice.",
                    "whyItMatters": "Long payment windows strain cash flow.",
                    "riskLevel": "Medium",
                    "watchOutIf": "You rely on this income monthly."
                },
                {
                    "title": "Termination",
                    "whatItMeans": "The client can end the deal at any time.",
                    "whyItMatters": "You could lose work without notice.",
                    "riskLevel": "High"
                }
            ],
            "redFlags": ["Termination without notice is one-sided."],
            "summary": {
                "overallRiskLevel": "Medium",
                "plainVerdict": "Mostly standard, but negotiate the termination clause."
            },
            "checklist": ["Ask for a 14-day notice period."]
        })
    }

    #[test]
    fn parses_backend_payload() {
        let result: AnalysisResult = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(result.overview.contract_type, "Freelance Services Agreement");
        assert_eq!(result.clauses.len(), 2);
        assert_eq!(result.clauses[1].risk_level, RiskLevel::High);
        assert_eq!(result.clauses[1].watch_out_if, None);
        assert_eq!(result.summary.overall_risk_level, RiskLevel::Medium);
        assert!(result.sources.is_none());
        assert!(!result.is_empty());
    }

    #[test]
    fn reserializes_to_the_same_json() {
        let value = sample_json();
        let result: AnalysisResult = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), value);
    }

    #[test]
    fn risk_level_accepts_other_casing() {
        let mut value = sample_json();
        value["clauses"][0]["riskLevel"] = json!(" high ");
        value["summary"]["overallRiskLevel"] = json!("LOW");
        let result: AnalysisResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.clauses[0].risk_level, RiskLevel::High);
        assert_eq!(result.summary.overall_risk_level, RiskLevel::Low);
    }

    #[test]
    fn unknown_risk_level_is_rejected() {
        let mut value = sample_json();
        value["clauses"][0]["riskLevel"] = json!("Severe");
        let err = serde_json::from_value::<AnalysisResult>(value).unwrap_err();
        assert!(err.to_string().contains("Severe"));
    }

    #[test]
    fn null_lists_are_rejected() {
        for field in ["clauses", "redFlags", "checklist"] {
            let mut value = sample_json();
            value[field] = Value::Null;
            assert!(
                serde_json::from_value::<AnalysisResult>(value).is_err(),
                "{field} accepted null"
            );
        }
    }

    #[test]
    fn empty_lists_are_fine() {
        let mut value = sample_json();
        value["clauses"] = json!([]);
        value["redFlags"] = json!([]);
        value["checklist"] = json!([]);
        let result: AnalysisResult = serde_json::from_value(value).unwrap();
        assert!(result.red_flags.is_empty());
        // The verdict is still there, so the payload carries something
        assert!(!result.is_empty());
    }

    #[test]
    fn blank_caveat_is_hidden() {
        let mut value = sample_json();
        value["clauses"][0]["watchOutIf"] = json!("   ");
        let result: AnalysisResult = serde_json::from_value(value).unwrap();
        assert_eq!(result.clauses[0].caveat(), None);
    }

    #[test]
    fn schema_requires_every_section_but_not_sources() {
        let schema = AnalysisResult::response_schema();
        assert!(schema.get("$schema").is_none());

        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        for field in ["overview", "clauses", "redFlags", "summary", "checklist"] {
            assert!(required.contains(&field), "{field} not required");
        }
        assert!(schema["properties"].get("sources").is_none());

        let risk = &schema["properties"]["summary"]["properties"]["overallRiskLevel"];
        let levels: Vec<&str> = risk["enum"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(levels, ["Low", "Medium", "High"]);
    }

    #[test]
    fn schema_descriptions_only_guide_the_model() {
        let schema = AnalysisResult::response_schema();
        let summary = schema["properties"]["summary"]["description"]
            .as_str()
            .unwrap_or_default();
        assert!(summary.contains("whole contract"));

        assert!(schema.get("description").is_none());
        let text = schema.to_string();
        assert!(!text.contains("serialized"));
        assert!(!text.contains("`"));
    }
}
