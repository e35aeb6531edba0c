use std::collections::HashMap;

use super::types::{ratio, CleanRecord, PerformerSummary, RankMetric, Totals};

#[derive(Debug, Default)]
struct Accumulator {
    rows: usize,
    spend: f64,
    sales: f64,
    revenue: f64,
}

impl Accumulator {
    fn add(&mut self, record: &CleanRecord) {
        self.rows += 1;
        self.spend += record.spend;
        self.sales += record.sales_count;
        self.revenue += record.revenue;
    }
}

/// Groups records by performer in order of first appearance.
///
/// Ratios come from the summed totals. Row-level ratios are never averaged.
pub fn aggregate(records: &[&CleanRecord]) -> Vec<PerformerSummary> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Accumulator)> = Vec::new();

    for record in records {
        let slot = *index.entry(record.performer_id.as_str()).or_insert_with(|| {
            groups.push((record.performer_id.as_str(), Accumulator::default()));
            groups.len() - 1
        });
        groups[slot].1.add(record);
    }

    groups
        .into_iter()
        .map(|(performer_id, acc)| PerformerSummary {
            performer_id: performer_id.to_string(),
            row_count: acc.rows,
            total_spend: acc.spend,
            total_sales: acc.sales,
            total_revenue: acc.revenue,
            roi: ratio(acc.revenue, acc.spend),
            cost_per_sale: ratio(acc.spend, acc.sales),
        })
        .collect()
}

/// Orders summaries by `metric`; ties keep their incoming order.
pub fn rank(mut summaries: Vec<PerformerSummary>, metric: RankMetric) -> Vec<PerformerSummary> {
    summaries.sort_by(|a, b| {
        let ord = metric.value(a).total_cmp(&metric.value(b));
        if metric.ascending() {
            ord
        } else {
            ord.reverse()
        }
    });
    summaries
}

/// Blended headline figures, computed the same way as per-performer ratios.
pub fn totals(records: &[&CleanRecord]) -> Totals {
    let mut acc = Accumulator::default();
    for record in records {
        acc.add(record);
    }
    Totals {
        row_count: acc.rows,
        total_spend: acc.spend,
        total_sales: acc.sales,
        total_revenue: acc.revenue,
        roi: ratio(acc.revenue, acc.spend),
        cost_per_sale: ratio(acc.spend, acc.sales),
    }
}
