//! Epoch network derivation: the canonical list of unique acquisition
//! dates over the active interferogram set.

use std::collections::BTreeMap;

use crate::types::{CorrectError, CorrectResult, EpochDate, EpochList, DAYS_PER_YEAR};

/// Build the canonical epoch list from (first, second) date pairs.
/// Recomputed whenever the active interferogram set changes.
pub fn get_epochs<I>(pairs: I) -> CorrectResult<EpochList>
where
    I: IntoIterator<Item = (EpochDate, EpochDate)>,
{
    let mut counts: BTreeMap<EpochDate, usize> = BTreeMap::new();
    for (first, second) in pairs {
        if first >= second {
            return Err(CorrectError::Data(format!(
                "interferogram epoch pair out of order: {} >= {}",
                first, second
            )));
        }
        *counts.entry(first).or_insert(0) += 1;
        *counts.entry(second).or_insert(0) += 1;
    }

    if counts.is_empty() {
        return Err(CorrectError::Data(
            "cannot derive epochs from an empty interferogram set".into(),
        ));
    }

    // BTreeMap iteration gives the dates already sorted
    let dates: Vec<EpochDate> = counts.keys().copied().collect();
    let repeat: Vec<usize> = counts.values().copied().collect();
    let origin = dates[0];
    let spans: Vec<f64> = dates
        .iter()
        .map(|d| (*d - origin).num_days() as f64 / DAYS_PER_YEAR)
        .collect();

    Ok(EpochList { dates, repeat, spans })
}
