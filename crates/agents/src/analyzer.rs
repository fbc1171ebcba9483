use std::sync::Arc;

use camroute_core::{parse_route_analysis, route_analysis_prompt, RouteAnalysis, TransportMode};
use camroute_observability::{AppMetrics, FallbackKind};
use tracing::warn;

use crate::completion::CompletionClient;
use crate::exchange::{ask, Outcome};

/// Asks the model for a structured route analysis and normalizes its answer.
#[derive(Clone)]
pub struct RouteAnalyzer<C> {
    client: C,
    metrics: Arc<AppMetrics>,
}

impl<C> RouteAnalyzer<C>
where
    C: CompletionClient,
{
    pub fn new(client: C, metrics: Arc<AppMetrics>) -> Self {
        Self { client, metrics }
    }

    /// Never fails: anything unusable yields [`RouteAnalysis::fallback`].
    pub async fn analyze(
        &self,
        departure: &str,
        destination: &str,
        mode: TransportMode,
    ) -> RouteAnalysis {
        self.assess(departure, destination, mode).await.value
    }

    pub async fn assess(
        &self,
        departure: &str,
        destination: &str,
        mode: TransportMode,
    ) -> Outcome<RouteAnalysis> {
        let prompt = route_analysis_prompt(departure, destination, mode);
        match ask(&self.client, &self.metrics, &prompt, parse_route_analysis).await {
            Ok(analysis) => Outcome::remote(analysis),
            Err(error) => {
                warn!(
                    departure,
                    destination,
                    mode = %mode,
                    error = %error,
                    "route analysis unusable, using fallback analysis"
                );
                self.metrics.inc_fallback(FallbackKind::Analysis);
                Outcome::fallback(RouteAnalysis::fallback())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{full_analysis_reply, ScriptedClient};

    async fn assess(reply: &str) -> Outcome<RouteAnalysis> {
        let client = ScriptedClient::replying(&[reply]);
        RouteAnalyzer::new(client, AppMetrics::shared())
            .assess("Douala", "Yaoundé", TransportMode::Car)
            .await
    }

    #[tokio::test]
    async fn well_formed_answer_is_normalized() {
        let outcome = assess(&full_analysis_reply()).await;
        assert!(!outcome.used_fallback);
        let analysis = outcome.value;
        assert_eq!(analysis.primary.duration_minutes, 120.0);
        assert_eq!(analysis.primary.distance_km, 243.5);
        assert_eq!(analysis.primary.cost_fcfa, 5000.0);
        assert_eq!(analysis.alternatives[0].duration_minutes, 150.0);
        assert_eq!(analysis.local_info.safety, "Évitez la nuit");
    }

    #[tokio::test]
    async fn missing_alternatives_yields_full_fallback() {
        let reply = r#"{
            "optimal_route": {"steps": ["a"], "estimated_time": 60, "estimated_distance": 10, "cost_estimate": 1000},
            "recommendations": [],
            "points_of_interest": [],
            "local_info": {"weather_considerations": "", "road_conditions": "", "safety_tips": ""}
        }"#;
        let outcome = assess(reply).await;
        assert!(outcome.used_fallback);
        assert_eq!(outcome.value, RouteAnalysis::fallback());
    }

    #[tokio::test]
    async fn unparseable_answers_share_one_fallback() {
        let first = assess("pas de JSON ici").await.value;
        let second = assess("{\"optimal_route\": tronqué").await.value;
        let third = assess(&full_analysis_reply().replace("\"120\"", "\"bientôt\"")).await.value;
        assert_eq!(first, second);
        assert_eq!(second, third);
        assert_eq!(first, RouteAnalysis::fallback());
    }

    #[tokio::test]
    async fn numbers_are_always_finite_and_non_negative() {
        for reply in [
            full_analysis_reply(),
            full_analysis_reply().replace("5000", "-5000"),
            String::from("nothing"),
        ] {
            let analysis = assess(&reply).await.value;
            assert!(analysis
                .numeric_fields()
                .iter()
                .all(|value| value.is_finite() && *value >= 0.0));
        }
    }

    #[tokio::test]
    async fn service_errors_yield_fallback() {
        let metrics = AppMetrics::shared();
        let analysis = RouteAnalyzer::new(ScriptedClient::failing(), metrics.clone())
            .analyze("Douala", "Kribi", TransportMode::Public)
            .await;
        assert_eq!(analysis, RouteAnalysis::fallback());
        assert_eq!(metrics.snapshot().analysis_fallback_total, 1);
    }
}
