//! Drawable classification from file names
//!
//! `jbib_000_u.ydd` → male/female component `jbib`, no skin
//! `uppr_003_r.ydd` → component `uppr`, skin variant
//! `p_head_000.ydd` → prop `p_head`
//! `mp_m_freemode_01^jbib_000_u.ydd` → addon-qualified, the part after `^` counts

use super::partition::{PartitionKey, Sex, COMPONENT_TYPES, PROP_TYPES};
use crate::error::{Error, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub key: PartitionKey,
    pub has_skin: bool,
}

/// Determine partition and skin flag of a drawable file
pub fn classify_path(path: &Path, sex: Sex) -> Result<Classification> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .ok_or_else(|| Error::UnresolvedType(path.display().to_string()))?;
    let stem = stem.rsplit('^').next().unwrap_or(&stem);

    // Longest prop prefix wins so `ph_lhand` is not taken for something shorter
    let prop = PROP_TYPES
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            stem.strip_prefix(**name)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('_'))
        })
        .max_by_key(|(_, name)| name.len());
    if let Some((code, _)) = prop {
        return Ok(Classification {
            key: PartitionKey::prop(sex, code as u8),
            has_skin: false,
        });
    }

    let first = stem.split('_').next().unwrap_or_default();
    match COMPONENT_TYPES.iter().position(|name| *name == first) {
        Some(code) => Ok(Classification {
            key: PartitionKey::component(sex, code as u8),
            has_skin: stem.ends_with("_r"),
        }),
        None => Err(Error::UnresolvedType(path.display().to_string())),
    }
}

/// Classify a batch, keeping input order
///
/// Runs on the rayon pool when the batch exceeds `parallel_threshold`.
pub fn classify_all(
    paths: &[PathBuf],
    sex: Sex,
    parallel_threshold: usize,
) -> Vec<(PathBuf, Result<Classification>)> {
    if paths.len() > parallel_threshold {
        paths
            .par_iter()
            .map(|p| (p.clone(), classify_path(p, sex)))
            .collect()
    } else {
        paths
            .iter()
            .map(|p| (p.clone(), classify_path(p, sex)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_component() {
        let c = classify_path(Path::new("/mods/jbib_000_u.ydd"), Sex::Male).unwrap();
        assert_eq!(c.key, PartitionKey::component(Sex::Male, 11));
        assert!(!c.has_skin);

        let c = classify_path(Path::new("UPPR_003_R.ydd"), Sex::Female).unwrap();
        assert_eq!(c.key, PartitionKey::component(Sex::Female, 3));
        assert!(c.has_skin);
    }

    #[test]
    fn test_classify_prop() {
        let c = classify_path(Path::new("p_head_002.ydd"), Sex::Male).unwrap();
        assert_eq!(c.key, PartitionKey::prop(Sex::Male, 0));

        let c = classify_path(Path::new("ph_rhand_000.ydd"), Sex::Male).unwrap();
        assert_eq!(c.key, PartitionKey::prop(Sex::Male, 12));
    }

    #[test]
    fn test_classify_addon_qualified() {
        let c = classify_path(Path::new("mp_f_freemode_01^lowr_010_u.ydd"), Sex::Female).unwrap();
        assert_eq!(c.key, PartitionKey::component(Sex::Female, 4));
    }

    #[test]
    fn test_unresolved() {
        assert!(matches!(
            classify_path(Path::new("my_cool_hat.ydd"), Sex::Male),
            Err(Error::UnresolvedType(_))
        ));
        assert!(matches!(
            classify_path(Path::new("p_headband.ydd"), Sex::Male),
            Err(Error::UnresolvedType(_))
        ));
    }

    #[test]
    fn test_classify_all_keeps_order() {
        let paths: Vec<PathBuf> = (0..10)
            .map(|i| {
                if i % 3 == 0 {
                    PathBuf::from(format!("unknown_{}.ydd", i))
                } else {
                    PathBuf::from(format!("feet_{:03}_u.ydd", i))
                }
            })
            .collect();

        for threshold in [0, 100] {
            let results = classify_all(&paths, Sex::Male, threshold);
            assert_eq!(results.len(), paths.len());
            for (i, (path, result)) in results.iter().enumerate() {
                assert_eq!(path, &paths[i]);
                assert_eq!(result.is_err(), i % 3 == 0);
            }
        }
    }
}
