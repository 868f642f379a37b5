use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A roadmap milestone.
///
/// The distributor only looks at the weight and the list order; title,
/// description and topics are carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    /// Explicit proportional weight. See [`Milestone::effective_weight`].
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Set when the user moved this milestone by hand.
    #[serde(default)]
    pub pinned: bool,
}

fn default_true() -> bool {
    true
}

impl Milestone {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            topics: Vec::new(),
            estimated_hours: None,
            weight: None,
            end_date: None,
            enabled: true,
            pinned: false,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_estimated_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Share of the total duration this milestone asks for.
    ///
    /// Falls back to estimated hours, then topic count, then 1.
    pub fn effective_weight(&self) -> f64 {
        if let Some(w) = self.weight {
            return w;
        }
        if let Some(hours) = self.estimated_hours.filter(|h| *h > 0.0) {
            return hours;
        }
        if !self.topics.is_empty() {
            return self.topics.len() as f64;
        }
        1.0
    }
}

/// Single-milestone roadmap used when generation fails or the distributor
/// rejects the generated list.
pub fn fallback_roadmap(goal: &str) -> Vec<Milestone> {
    let mut milestone = Milestone::new("milestone-1", goal).with_weight(1.0);
    milestone.description = format!("Work through \"{goal}\" at your own pace");
    vec![milestone]
}
