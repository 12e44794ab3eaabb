// Fill a row's geographic fields from classified places.

use crate::gazetteer::Gazetteer;
use crate::normalize::{is_blank, norm_text};
use crate::sheet::StoryRow;

const COUNTY_UMBRELLA: &str = "Allegheny County";
const CITY_UMBRELLA: &str = "Pittsburgh, Allegheny County";

/// Assign umbrella, geographic area, and neighborhoods from `places` when the
/// row has no neighborhoods yet. Non-blank fields are never overwritten.
/// All three fields are normalized with `norm_text` afterwards, whether or
/// not anything was assigned.
pub fn assign_geography(row: &mut StoryRow, places: &[String], gazetteer: &Gazetteer) {
    if is_blank(row.neighborhoods.as_deref()) && !places.is_empty() {
        let neighborhoods: Vec<&str> = places
            .iter()
            .filter(|p| gazetteer.is_neighborhood(p))
            .map(String::as_str)
            .collect();
        let municipalities: Vec<&str> = places
            .iter()
            .filter(|p| gazetteer.is_municipality(p))
            .map(String::as_str)
            .collect();

        if !neighborhoods.is_empty() {
            row.neighborhoods = Some(neighborhoods.join(", "));
        } else if !municipalities.is_empty() {
            row.neighborhoods = Some(municipalities.join(", "));
        }

        let mut regions: Vec<&str> = Vec::new();
        for place in places {
            if let Some(region) = gazetteer.region_of(place) {
                if !region.is_empty() && !regions.contains(&region) {
                    regions.push(region);
                }
            }
        }

        if !regions.is_empty() && is_blank(row.geographic_area.as_deref()) {
            row.geographic_area = Some(regions.join(", "));
        }

        if is_blank(row.umbrella.as_deref()) {
            let umbrella = if !municipalities.is_empty() && neighborhoods.is_empty() {
                COUNTY_UMBRELLA
            } else if let Some(county) = regions
                .iter()
                .copied()
                .find(|r| r.to_lowercase().contains("county"))
            {
                county
            } else {
                CITY_UMBRELLA
            };
            row.umbrella = Some(umbrella.to_string());
        }
    }

    row.umbrella = row.umbrella.as_deref().and_then(norm_text);
    row.geographic_area = row.geographic_area.as_deref().and_then(norm_text);
    row.neighborhoods = row.neighborhoods.as_deref().and_then(norm_text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::tests::sample;

    fn places(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn neighborhoods_take_priority_over_municipalities() {
        let g = sample();
        let mut row = StoryRow::new("u");
        assign_geography(&mut row, &places(&["Oakland", "McKeesport", "Shadyside"]), &g);
        assert_eq!(row.neighborhoods.as_deref(), Some("Oakland, Shadyside"));
        assert_eq!(row.geographic_area.as_deref(), Some("East End, Mon Valley"));
        assert_eq!(row.umbrella.as_deref(), Some("Pittsburgh, Allegheny County"));
    }

    #[test]
    fn municipalities_only_means_county_umbrella() {
        let g = sample();
        let mut row = StoryRow::new("u");
        assign_geography(&mut row, &places(&["McKeesport", "Moon"]), &g);
        assert_eq!(row.neighborhoods.as_deref(), Some("McKeesport, Moon"));
        assert_eq!(row.geographic_area.as_deref(), Some("Mon Valley, Airport Corridor"));
        assert_eq!(row.umbrella.as_deref(), Some("Allegheny County"));
    }

    #[test]
    fn county_region_becomes_umbrella() {
        let g = sample();
        let mut row = StoryRow::new("u");
        assign_geography(&mut row, &places(&["Oakland", "Sewickley"]), &g);
        assert_eq!(row.neighborhoods.as_deref(), Some("Oakland"));
        assert_eq!(row.umbrella.as_deref(), Some("North Allegheny County"));
    }

    #[test]
    fn existing_values_are_kept() {
        let g = sample();
        let mut row = StoryRow {
            umbrella: Some("Pittsburgh".into()),
            geographic_area: Some("Citywide".into()),
            ..StoryRow::new("u")
        };
        assign_geography(&mut row, &places(&["Oakland"]), &g);
        assert_eq!(row.umbrella.as_deref(), Some("Pittsburgh"));
        assert_eq!(row.geographic_area.as_deref(), Some("Citywide"));
        assert_eq!(row.neighborhoods.as_deref(), Some("Oakland"));
    }

    #[test]
    fn rows_with_neighborhoods_are_not_reassigned() {
        let g = sample();
        let mut row = StoryRow {
            neighborhoods: Some("hazelwood".into()),
            ..StoryRow::new("u")
        };
        assign_geography(&mut row, &places(&["Oakland"]), &g);
        assert_eq!(row.neighborhoods.as_deref(), Some("Hazelwood"));
        assert_eq!(row.umbrella, None);
        assert_eq!(row.geographic_area, None);
    }

    #[test]
    fn fields_are_normalized_without_places() {
        let g = sample();
        let mut row = StoryRow {
            umbrella: Some("allegheny county".into()),
            geographic_area: Some("…".into()),
            ..StoryRow::new("u")
        };
        assign_geography(&mut row, &[], &g);
        assert_eq!(row.umbrella.as_deref(), Some("Allegheny County"));
        assert_eq!(row.geographic_area, None);
    }
}
