//! Derives per-line condition coverage from raw branch points.
//!
//! Points are first grouped by line, then by the report they came from (a
//! "view"). Identical positions inside a view collapse into one. Views that
//! agree on geometry are merged position by position; views that record the
//! same number of positions at different offsets (a rebuilt binary, another
//! instrumenter) are paired by their rank in offset order. When neither
//! applies, the union of all distinct positions is used.

use std::collections::BTreeMap;

use crate::model::{BranchCoverage, BranchPoint};

/// `(start_offset, end_offset, path)` of a point within its line.
type Position = (u32, u32, u32);

/// Distinct positions of one report on one line, sorted, with a covered
/// flag each.
type View = Vec<(Position, bool)>;

/// Compute condition coverage for the points of a single file, ordered by
/// line. Lines with fewer than two merged positions are omitted.
pub fn branch_coverage(points: &[BranchPoint]) -> Vec<BranchCoverage> {
    let mut by_line: BTreeMap<u32, Vec<&BranchPoint>> = BTreeMap::new();
    for point in points {
        by_line.entry(point.line).or_default().push(point);
    }

    by_line
        .into_iter()
        .filter_map(|(line, points)| {
            let positions = merged_positions(report_views(&points));
            if positions.len() < 2 {
                return None;
            }
            let covered = positions.iter().filter(|&&covered| covered).count();
            Some(BranchCoverage {
                line,
                conditions: positions.len() as u32,
                covered_conditions: covered as u32,
            })
        })
        .collect()
}

fn report_views(points: &[&BranchPoint]) -> Vec<View> {
    let mut views: BTreeMap<&str, View> = BTreeMap::new();
    for point in points {
        let view = views.entry(point.coverage_identifier.as_str()).or_default();
        let position = (point.start_offset, point.end_offset, point.path);
        let covered = point.hits > 0;
        match view.iter_mut().find(|(p, _)| *p == position) {
            Some(existing) => existing.1 |= covered,
            None => view.push((position, covered)),
        }
    }
    views
        .into_values()
        .map(|mut view| {
            view.sort_unstable_by_key(|&(position, _)| position);
            view
        })
        .collect()
}

fn merged_positions(views: Vec<View>) -> Vec<bool> {
    let Some(first) = views.first() else {
        return Vec::new();
    };
    if views.len() == 1 {
        return first.iter().map(|&(_, covered)| covered).collect();
    }

    let same_len = views.iter().all(|v| v.len() == first.len());
    let same_geometry =
        same_len && views.iter().all(|v| v.iter().all(|(p, _)| contains(first, p)));

    if same_len && !same_geometry {
        return (0..first.len())
            .map(|i| views.iter().any(|v| v[i].1))
            .collect();
    }

    let mut union: View = Vec::new();
    for view in &views {
        for &(position, covered) in view {
            match union.iter_mut().find(|(p, _)| *p == position) {
                Some(existing) => existing.1 |= covered,
                None => union.push((position, covered)),
            }
        }
    }
    union.into_iter().map(|(_, covered)| covered).collect()
}

fn contains(view: &View, position: &Position) -> bool {
    view.iter().any(|(p, _)| p == position)
}
