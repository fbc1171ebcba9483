use crate::models::TransportMode;

pub fn coordinate_prompt(address: &str) -> String {
    format!(
        r#"Donne les coordonnées GPS (latitude, longitude) de cette adresse au Cameroun :
{address}

Réponds uniquement avec un objet JSON, sans texte autour, où les deux valeurs sont des nombres décimaux :
{{"latitude": 0.0, "longitude": 0.0}}

Exemple pour la gare de Douala :
{{"latitude": 4.0511, "longitude": 9.7679}}

Les coordonnées doivent se trouver au Cameroun (latitude entre 2 et 13, longitude entre 8 et 16)."#
    )
}

/// Shorter second attempt that leans on the model's knowledge of Cameroonian towns.
pub fn coordinate_retry_prompt(address: &str) -> String {
    format!(
        r#"J'ai besoin des coordonnées GPS de : {address}
Ce lieu est au Cameroun. Appuie-toi sur ta connaissance des villes, quartiers et régions camerounais.
JSON uniquement : {{"latitude": 4.0511, "longitude": 9.7679}}"#
    )
}

pub fn route_analysis_prompt(departure: &str, destination: &str, mode: TransportMode) -> String {
    format!(
        r#"Analyse en détail un itinéraire au Cameroun.

DONNÉES
- Départ : {departure}
- Destination : {destination}
- Mode de transport : {mode_label} ({mode_code})

CONTEXTE LOCAL
- Pays : Cameroun
- Monnaie : franc CFA (FCFA)
- L'état des routes varie fortement selon les régions
- La saison des pluies allonge les trajets
- Transports disponibles : bus, taxi-brousse, moto-taxi, train Camrail

Réponds STRICTEMENT avec ce JSON et rien d'autre :
{{
  "optimal_route": {{
    "steps": ["étape 1", "étape 2"],
    "estimated_time": 120,
    "estimated_distance": 45.5,
    "cost_estimate": 5000
  }},
  "alternatives": [
    {{"route": "description de l'alternative", "time": 150, "distance": 50.0, "cost": 6000}}
  ],
  "recommendations": ["conseil 1", "conseil 2"],
  "points_of_interest": ["lieu 1", "lieu 2"],
  "local_info": {{
    "weather_considerations": "météo",
    "road_conditions": "état des routes",
    "safety_tips": "sécurité"
  }}
}}

RÈGLES
- estimated_time et time en minutes, estimated_distance et distance en kilomètres, cost_estimate et cost en FCFA
- Toutes ces valeurs sont des nombres JSON, sans unité ni séparateur de milliers
- Étapes précises et réalistes, dans l'ordre du trajet
- Aucune explication en dehors du JSON"#,
        mode_label = mode.label(),
        mode_code = mode.as_code(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_prompt_mentions_inputs_and_currency() {
        let prompt = route_analysis_prompt("Douala", "Yaoundé", TransportMode::Public);
        assert!(prompt.contains("Départ : Douala"));
        assert!(prompt.contains("Destination : Yaoundé"));
        assert!(prompt.contains("(public)"));
        assert!(prompt.contains("FCFA"));
        assert!(prompt.contains("\"optimal_route\""));
    }

    #[test]
    fn coordinate_prompt_embeds_address() {
        assert!(coordinate_prompt("Mvan, Yaoundé").contains("Mvan, Yaoundé"));
        assert!(coordinate_retry_prompt("Mvan, Yaoundé").contains("Mvan, Yaoundé"));
    }
}
