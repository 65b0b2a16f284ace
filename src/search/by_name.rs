use serde::Deserialize;

use crate::models::entity::meta;
use crate::models::LocatedEntity;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NameSearchOptions {
    pub limit: usize,
    /// Shorter keywords match nothing
    pub min_chars: usize,
}

impl Default for NameSearchOptions {
    fn default() -> Self {
        Self {
            limit: 15,
            min_chars: 2,
        }
    }
}

/// Case-insensitive substring match on name or address, in input order
pub fn search_by_name<'a, I>(entities: I, keyword: &str, options: NameSearchOptions) -> Vec<LocatedEntity>
where
    I: IntoIterator<Item = &'a LocatedEntity>,
{
    let keyword = keyword.trim().to_lowercase();
    if keyword.chars().count() < options.min_chars.max(1) {
        return Vec::new();
    }

    entities
        .into_iter()
        .filter(|entity| {
            entity.name.to_lowercase().contains(&keyword)
                || entity
                    .meta(meta::ADDRESS)
                    .is_some_and(|address| address.to_lowercase().contains(&keyword))
        })
        .take(options.limit)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    fn lots() -> Vec<LocatedEntity> {
        vec![
            LocatedEntity::new("1", "Gangnam Public Parking", EntityKind::Parking, 37.49, 127.02),
            LocatedEntity::new("2", "역삼1동 공영주차장", EntityKind::Parking, 37.50, 127.03)
                .with_meta(meta::ADDRESS, "서울특별시 강남구 역삼동 123"),
            LocatedEntity::new("3", "종로 공영주차장", EntityKind::Parking, 37.57, 126.98),
        ]
    }

    #[test]
    fn test_matches_name_case_insensitive() {
        let hits = search_by_name(&lots(), "gangnam", NameSearchOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
    }

    #[test]
    fn test_matches_address() {
        let hits = search_by_name(&lots(), "강남구", NameSearchOptions::default());
        let ids: Vec<&str> = hits.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[test]
    fn test_limit_and_order() {
        let options = NameSearchOptions {
            limit: 1,
            ..Default::default()
        };
        let hits = search_by_name(&lots(), "공영주차장", options);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2");
    }

    #[test]
    fn test_short_keyword_matches_nothing() {
        assert!(search_by_name(&lots(), " 강 ", NameSearchOptions::default()).is_empty());
    }
}
