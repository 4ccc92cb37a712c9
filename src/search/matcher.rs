use crate::models::{Pharmacy, StockEntry};

/// Stock entries of `pharmacy` whose medicine name contains `query`, ignoring case. Only
/// available entries are returned. A blank query matches every available entry. Stock order
/// is kept and duplicates are not collapsed.
pub fn match_stock(pharmacy: &Pharmacy, query: &str) -> Vec<StockEntry> {
    let needle = query.trim().to_lowercase();
    pharmacy
        .stock
        .iter()
        .filter(|entry| entry.is_available && name_matches(&entry.medicine_name, &needle))
        .cloned()
        .collect()
}

/// `needle` must already be lower-cased.
fn name_matches(medicine_name: &str, needle: &str) -> bool {
    needle.is_empty() || medicine_name.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(name: &str, available: bool) -> StockEntry {
        StockEntry {
            medicine_name: name.to_string(),
            price: 10.0,
            quantity: Some(5),
            is_available: available,
        }
    }

    fn pharmacy(stock: Vec<StockEntry>) -> Pharmacy {
        Pharmacy {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Test".into(),
            address: "Somewhere".into(),
            location: GeoPoint { lat: 0.0, lng: 0.0 },
            stock,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn substring_match_ignores_case() {
        let p = pharmacy(vec![entry("Paracetamol", true)]);
        assert_eq!(match_stock(&p, "para").len(), 1);
        assert_eq!(match_stock(&p, "PARACETAMOL").len(), 1);
        assert_eq!(match_stock(&p, "cetam").len(), 1);
        assert!(match_stock(&p, "xyz").is_empty());
    }

    #[test]
    fn unavailable_entries_are_suppressed() {
        let p = pharmacy(vec![entry("Paracetamol", false)]);
        assert!(match_stock(&p, "paracetamol").is_empty());
        assert!(match_stock(&p, "").is_empty());
    }

    #[test]
    fn blank_query_matches_all_available() {
        let p = pharmacy(vec![
            entry("Paracetamol", true),
            entry("Amoxicillin", true),
            entry("Insulin", false),
            entry("Cetirizine", true),
        ]);
        let names: Vec<String> = match_stock(&p, "   ").into_iter().map(|e| e.medicine_name).collect();
        assert_eq!(names, vec!["Paracetamol", "Amoxicillin", "Cetirizine"]);
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let p = pharmacy(vec![entry("Aspirin 75mg", true), entry("Aspirin 75mg", true)]);
        assert_eq!(match_stock(&p, "aspirin").len(), 2);
    }

    #[test]
    fn query_is_not_tokenized() {
        // "para tamol" is not a substring even though both words appear
        let p = pharmacy(vec![entry("Paracetamol", true)]);
        assert!(match_stock(&p, "para tamol").is_empty());
    }

    #[test]
    fn every_match_satisfies_the_predicate() {
        let p = pharmacy(vec![
            entry("Paracetamol", true),
            entry("paracetamol syrup", false),
            entry("Ibuprofen", true),
            entry("PARA-AMINO", true),
        ]);
        for query in ["", "para", "PROF", "a", "zzz"] {
            for m in match_stock(&p, query) {
                assert!(m.is_available);
                assert!(m.medicine_name.to_lowercase().contains(&query.to_lowercase()));
            }
        }
    }
}
