use serde::Serialize;

use crate::error::StoreResult;
use crate::store::{SqliteStore, TreeRecord, TreeSummary};

/// Number of names listed when the search term is empty.
pub const PREVIEW_LIMIT: usize = 25;

const SCORE_LABELS: &[(&str, &str)] = &[
    ("climate_adaptation", "Climate adaptation"),
    ("water_efficiency", "Water efficiency"),
    ("biodiversity_support", "Biodiversity support"),
    ("community_acceptance", "Community acceptance"),
    ("aesthetic_cultural_fit", "Aesthetic & cultural fit"),
    ("shade_public_use", "Shade / public use"),
    ("cost_of_planting", "Cost of planting"),
    ("maintenance_needs", "Maintenance needs"),
    ("lifespan_durability", "Lifespan & durability"),
    ("total_score", "TOTAL score"),
];

pub fn score_label(column: &str) -> &str {
    SCORE_LABELS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, label)| *label)
        .unwrap_or(column)
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub term: String,
    pub preview: bool,
    pub hits: Vec<TreeSummary>,
}

/// Search by common or scientific name. An empty term returns the first
/// [`PREVIEW_LIMIT`] names instead.
pub fn search_catalog(
    store: &SqliteStore,
    term: &str,
    limit: Option<usize>,
) -> StoreResult<SearchResults> {
    let term = term.trim();
    let preview = term.is_empty();
    let limit = if preview {
        Some(limit.unwrap_or(PREVIEW_LIMIT))
    } else {
        limit
    };
    Ok(SearchResults {
        term: term.to_string(),
        preview,
        hits: store.search(term, limit)?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreLine {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeDetail {
    #[serde(flatten)]
    pub record: TreeRecord,
    pub score_table: Vec<ScoreLine>,
}

pub fn tree_detail(store: &SqliteStore, id: i64) -> StoreResult<Option<TreeDetail>> {
    Ok(store.get_tree(id)?.map(|record| TreeDetail {
        score_table: record
            .scores
            .iter()
            .map(|(column, value)| ScoreLine {
                label: score_label(column).to_string(),
                value: *value,
            })
            .collect(),
        record,
    }))
}

/// Render a score without a trailing `.0` for whole numbers.
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;
    use crate::store::tests::seeded_store;

    #[test]
    fn empty_term_is_a_bounded_preview() {
        let names = (0..30).map(|index| format!("Tree {index:02}")).collect::<Vec<_>>();
        let rows = names
            .iter()
            .map(|name| (name.as_str(), None, None))
            .collect::<Vec<_>>();
        let (_temp, store) = seeded_store(&rows);

        let preview = search_catalog(&store, "  ", None).expect("preview");
        assert!(preview.preview);
        assert_eq!(preview.hits.len(), PREVIEW_LIMIT);
        assert_eq!(preview.hits[0].tree_name, "Tree 00");

        let all = search_catalog(&store, "tree", None).expect("search");
        assert!(!all.preview);
        assert_eq!(all.hits.len(), 30);
    }

    #[test]
    fn tree_detail_labels_scores_in_display_order() {
        let (_temp, store) = seeded_store(&[("Olive", Some("Olea europaea"), None)]);
        let connection = Connection::open(&store.config().database).expect("open");
        connection
            .execute(
                "UPDATE tree_data SET total_score = 41, water_efficiency = 4.5 WHERE id = 1",
                [],
            )
            .expect("update");

        let detail = tree_detail(&store, 1).expect("detail").expect("present");
        let labels = detail
            .score_table
            .iter()
            .map(|line| line.label.as_str())
            .collect::<Vec<_>>();
        assert_eq!(labels, vec!["Water efficiency", "TOTAL score"]);
        assert!(tree_detail(&store, 2).expect("detail").is_none());

        let json = serde_json::to_value(&detail).expect("serialize");
        assert_eq!(json["tree_name"], "Olive");
        assert_eq!(json["score_table"][1]["label"], "TOTAL score");
    }

    #[test]
    fn scores_render_without_trailing_zero() {
        assert_eq!(format_score(4.0), "4");
        assert_eq!(format_score(4.5), "4.5");
        assert_eq!(score_label("unknown_column"), "unknown_column");
    }
}
