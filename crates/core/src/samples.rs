use crate::models::NewLocation;

const SAMPLES: &[(&str, &str, f64, f64)] = &[
    ("Aéroport International de Yaoundé-Nsimalen", "Nsimalen, Yaoundé, Cameroun", 3.7226, 11.5533),
    ("Gare Routière de Yaoundé", "Mvan, Yaoundé, Cameroun", 3.8480, 11.5021),
    ("Aéroport International de Douala", "Douala, Cameroun", 4.0061, 9.7195),
    ("Port de Douala", "Port de Douala, Cameroun", 4.0435, 9.7095),
    ("Université de Yaoundé I", "Ngoa-Ekellé, Yaoundé, Cameroun", 3.8634, 11.5208),
    ("Marché Central de Yaoundé", "Centre-ville, Yaoundé, Cameroun", 3.8676, 11.5174),
    ("Gare de Douala", "Bessengue, Douala, Cameroun", 4.0511, 9.7679),
    ("Université de Dschang", "Dschang, Région de l'Ouest, Cameroun", 5.4467, 10.0539),
    ("Marché de Mokolo - Yaoundé", "Mokolo, Yaoundé, Cameroun", 3.8789, 11.5123),
    ("Stade Omnisports de Yaoundé", "Mfandena, Yaoundé, Cameroun", 3.8456, 11.5123),
    ("Palais des Congrès de Yaoundé", "Tsinga, Yaoundé, Cameroun", 3.8915, 11.5204),
    ("Hôpital Central de Yaoundé", "Centre-ville, Yaoundé, Cameroun", 3.8634, 11.5174),
];

/// Well-known Cameroonian places used to seed an empty catalogue.
pub fn sample_locations() -> Vec<NewLocation> {
    SAMPLES
        .iter()
        .map(|&(name, address, latitude, longitude)| NewLocation {
            name: name.to_string(),
            address: address.to_string(),
            latitude,
            longitude,
        })
        .collect()
}
