use tracing::info;

use crate::error::StoreResult;
use crate::store::TreeStore;

/// Rewrite Windows-style separators in stored image paths to `/`.
pub fn fix_path_separators<S: TreeStore + ?Sized>(store: &mut S) -> StoreResult<usize> {
    let changed = store.replace_path_separators()?;
    info!(changed, "image path separators normalized");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::seeded_store;

    #[test]
    fn fix_path_separators_is_idempotent() {
        let (_temp, mut store) = seeded_store(&[
            ("Olive", None, Some("assets\\tree_images\\Olive.png")),
            ("Fig", None, Some("assets\\tree_images/Fig.png")),
        ]);
        assert_eq!(fix_path_separators(&mut store).expect("first pass"), 2);
        assert_eq!(fix_path_separators(&mut store).expect("second pass"), 0);

        let paths = store
            .fetch_image_rows()
            .expect("fetch")
            .into_iter()
            .filter_map(|row| row.image_path)
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec![
                "assets/tree_images/Olive.png".to_string(),
                "assets/tree_images/Fig.png".to_string()
            ]
        );
    }
}
