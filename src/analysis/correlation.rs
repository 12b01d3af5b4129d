//! Pearson correlation over the numeric performance columns.

use crate::models::{CorrelationMatrix, EnrichedRecord, PerformanceRecord};

type Column = fn(&PerformanceRecord) -> Option<f64>;

const COLUMNS: [Column; 3] = [clicks, impressions, position];

fn clicks(record: &PerformanceRecord) -> Option<f64> {
    record.clicks.map(|v| v as f64)
}

fn impressions(record: &PerformanceRecord) -> Option<f64> {
    record.impressions.map(|v| v as f64)
}

fn position(record: &PerformanceRecord) -> Option<f64> {
    record.position
}

/// Pairwise Pearson correlation of clicks, impressions and position.
///
/// Each pair uses only the rows where both values are present. A cell is
/// `None` when fewer than two such rows exist or either side is constant.
pub fn correlation_matrix(enriched: &[EnrichedRecord<'_>]) -> CorrelationMatrix {
    let mut values = [[None; 3]; 3];

    for i in 0..3 {
        for j in i..3 {
            let pairs: Vec<(f64, f64)> = enriched
                .iter()
                .filter_map(|e| Some((COLUMNS[i](e.record)?, COLUMNS[j](e.record)?)))
                .collect();

            let r = if i == j {
                has_spread(pairs.iter().map(|p| p.0)).then_some(1.0)
            } else {
                pearson(&pairs)
            };

            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        columns: CorrelationMatrix::COLUMNS,
        values,
    }
}

/// True when there are at least two values and not all of them are equal.
fn has_spread(mut values: impl Iterator<Item = f64>) -> bool {
    match values.next() {
        Some(first) => values.any(|v| v != first),
        None => false,
    }
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if !has_spread(pairs.iter().map(|p| p.0)) || !has_spread(pairs.iter().map(|p| p.1)) {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }

    let denom = (sxx * syy).sqrt();
    if denom == 0.0 {
        return None;
    }

    Some((sxy / denom).clamp(-1.0, 1.0))
}
