pub mod analyzer;
pub mod completion;
pub mod config;
pub mod exchange;
pub mod optimizer;
pub mod planner;
pub mod resolver;

pub use analyzer::RouteAnalyzer;
pub use completion::{
    CompletionBackend, CompletionClient, CompletionError, GeminiClient, GeminiConfig,
    DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL,
};
pub use config::{parse_flag, PlannerConfig, DEFAULT_EUR_TO_FCFA};
pub use exchange::{ExchangeError, Outcome};
pub use optimizer::RouteOptimizer;
pub use planner::{PlanRouteRequest, PlannerError, RouteDetail, RoutePlanner, MIN_COMPARED_ROUTES};
pub use resolver::CoordinateResolver;

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::completion::{CompletionClient, CompletionError};

    /// Replays canned answers in order; once they run out every call fails.
    #[derive(Clone, Default)]
    pub struct ScriptedClient {
        replies: Arc<Mutex<VecDeque<String>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedClient {
        pub fn replying(replies: &[&str]) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.iter().map(|r| r.to_string()).collect())),
                prompts: Arc::default(),
            }
        }

        pub fn failing() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().len()
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().clone()
        }
    }

    impl CompletionClient for ScriptedClient {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.prompts.lock().push(prompt.to_string());
            self.replies
                .lock()
                .pop_front()
                .ok_or(CompletionError::Status {
                    status: 503,
                    body: "scripted outage".to_string(),
                })
        }
    }

    pub fn full_analysis_reply() -> String {
        r#"Voici l'itinéraire :
```json
{
  "optimal_route": {
    "steps": ["Prendre la N3 vers Edéa", "Continuer vers Yaoundé"],
    "estimated_time": "120",
    "estimated_distance": "243,5 km",
    "cost_estimate": 5000
  },
  "alternatives": [
    {"route": "Train Camrail", "time": "2h30", "distance": 262, "cost": "6 000 FCFA"}
  ],
  "recommendations": ["Partir tôt", " "],
  "points_of_interest": ["Edéa"],
  "local_info": {
    "weather_considerations": "Saison des pluies",
    "road_conditions": "Axe lourd très fréquenté",
    "safety_tips": "Évitez la nuit"
  }
}
```"#
            .to_string()
    }
}
