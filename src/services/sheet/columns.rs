use std::collections::HashSet;

use super::types::{ColumnKind, ColumnProfile, SuggestedMapping};
use crate::services::engine::ColumnRole;

const TIME_KEYWORDS: &[&str] = &["日期与时间", "日期序列", "日期", "时间", "datetime", "timestamp", "date", "time"];
const PERFORMER_KEYWORDS: &[&str] = &["主播姓名", "主播", "姓名", "performer", "streamer", "anchor", "host", "name"];
const SPEND_KEYWORDS: &[&str] = &["千川消耗", "消耗", "花费", "投放", "ad spend", "spend", "ad cost", "cost"];
const SALES_KEYWORDS: &[&str] = &["销售数量", "销量", "成交件数", "订单数", "数量", "units", "orders", "sales", "qty"];
const REVENUE_KEYWORDS: &[&str] = &["销售额", "成交金额", "成交额", "gmv", "revenue", "amount"];

/// Column order of the canonical export: time, performer, spend, sales,
/// price, revenue, unit cost.
const POSITIONAL_MIN_COLUMNS: usize = 7;
const POSITIONAL_LAYOUT: [(ColumnRole, usize); 5] = [
    (ColumnRole::Time, 0),
    (ColumnRole::Performer, 1),
    (ColumnRole::Spend, 2),
    (ColumnRole::Sales, 3),
    (ColumnRole::Revenue, 5),
];

fn keywords(role: ColumnRole) -> &'static [&'static str] {
    match role {
        ColumnRole::Time => TIME_KEYWORDS,
        ColumnRole::Performer => PERFORMER_KEYWORDS,
        ColumnRole::Spend => SPEND_KEYWORDS,
        ColumnRole::Sales => SALES_KEYWORDS,
        ColumnRole::Revenue => REVENUE_KEYWORDS,
    }
}

fn normalized(header: &str) -> String {
    header.trim().to_lowercase().replace(['_', '-'], " ")
}

/// Best unclaimed header for a role: exact keyword matches first, then
/// substring matches, keyword order deciding between candidates.
fn match_keyword(role: ColumnRole, headers: &[String], claimed: &HashSet<usize>) -> Option<usize> {
    let candidates: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| !claimed.contains(idx))
        .map(|(idx, h)| (idx, normalized(h)))
        .collect();

    let words = keywords(role);
    words
        .iter()
        .find_map(|word| candidates.iter().find(|(_, h)| h == word).map(|(idx, _)| *idx))
        .or_else(|| {
            words
                .iter()
                .find_map(|word| candidates.iter().find(|(_, h)| h.contains(word)).map(|(idx, _)| *idx))
        })
}

fn time_by_kind(profiles: &[ColumnProfile], claimed: &HashSet<usize>) -> Option<usize> {
    let unclaimed = || profiles.iter().enumerate().filter(|(idx, _)| !claimed.contains(idx));
    unclaimed()
        .find(|(_, p)| p.kind == ColumnKind::Date)
        .or_else(|| unclaimed().find(|(_, p)| p.looks_like_serial))
        .map(|(idx, _)| idx)
}

/// Suggests a column for each role from header names and column profiles.
pub fn suggest_mapping(headers: &[String], profiles: &[ColumnProfile]) -> SuggestedMapping {
    let mut claimed = HashSet::new();
    let mut picks: Vec<(ColumnRole, usize)> = Vec::new();

    for role in [
        ColumnRole::Time,
        ColumnRole::Performer,
        ColumnRole::Spend,
        ColumnRole::Sales,
        ColumnRole::Revenue,
    ] {
        let pick = match_keyword(role, headers, &claimed).or_else(|| match role {
            ColumnRole::Time => time_by_kind(profiles, &claimed),
            _ => None,
        });
        if let Some(idx) = pick {
            claimed.insert(idx);
            picks.push((role, idx));
        }
    }

    let required = [ColumnRole::Time, ColumnRole::Performer, ColumnRole::Spend, ColumnRole::Sales];
    let complete = required.iter().all(|role| picks.iter().any(|(r, _)| r == role));
    let positional = !complete && headers.len() >= POSITIONAL_MIN_COLUMNS;
    if positional {
        tracing::info!("Headers did not match known names; using the positional column layout");
        picks = POSITIONAL_LAYOUT.to_vec();
    }

    let column = |role: ColumnRole| {
        picks
            .iter()
            .find(|(r, _)| *r == role)
            .and_then(|(_, idx)| headers.get(*idx).cloned())
    };

    SuggestedMapping {
        time: column(ColumnRole::Time),
        performer: column(ColumnRole::Performer),
        spend: column(ColumnRole::Spend),
        sales: column(ColumnRole::Sales),
        revenue: column(ColumnRole::Revenue),
        positional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::SmallVec;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn profile(name: &str, kind: ColumnKind, looks_like_serial: bool) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            kind,
            sample_values: SmallVec::new(),
            null_count: 0,
            unique_count: 0,
            looks_like_serial,
        }
    }

    #[test]
    fn test_chinese_headers() {
        let h = headers(&["日期与时间", "主播姓名", "千川消耗", "销售数量", "售价", "销售额", "单台成本"]);
        let m = suggest_mapping(&h, &[]);

        assert_eq!(m.time.as_deref(), Some("日期与时间"));
        assert_eq!(m.performer.as_deref(), Some("主播姓名"));
        assert_eq!(m.spend.as_deref(), Some("千川消耗"));
        assert_eq!(m.sales.as_deref(), Some("销售数量"));
        assert_eq!(m.revenue.as_deref(), Some("销售额"));
        assert!(!m.positional);
    }

    #[test]
    fn test_english_headers_prefer_exact_matches() {
        let h = headers(&["Unit Cost", "Streamer Name", "Timestamp", "Ad_Spend", "Orders", "GMV"]);
        let m = suggest_mapping(&h, &[]);

        assert_eq!(m.time.as_deref(), Some("Timestamp"));
        assert_eq!(m.performer.as_deref(), Some("Streamer Name"));
        assert_eq!(m.spend.as_deref(), Some("Ad_Spend"));
        assert_eq!(m.sales.as_deref(), Some("Orders"));
        assert_eq!(m.revenue.as_deref(), Some("GMV"));
    }

    #[test]
    fn test_time_falls_back_to_serial_column() {
        let h = headers(&["slot", "主播", "消耗", "销量"]);
        let profiles = vec![
            profile("slot", ColumnKind::Numeric, true),
            profile("主播", ColumnKind::Text, false),
            profile("消耗", ColumnKind::Numeric, false),
            profile("销量", ColumnKind::Numeric, false),
        ];
        let m = suggest_mapping(&h, &profiles);

        assert_eq!(m.time.as_deref(), Some("slot"));
        assert_eq!(m.revenue, None);
    }

    #[test]
    fn test_positional_layout_for_unknown_headers() {
        let h = headers(&["c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8"]);
        let m = suggest_mapping(&h, &[]);

        assert!(m.positional);
        assert_eq!(m.time.as_deref(), Some("c1"));
        assert_eq!(m.performer.as_deref(), Some("c2"));
        assert_eq!(m.spend.as_deref(), Some("c3"));
        assert_eq!(m.sales.as_deref(), Some("c4"));
        assert_eq!(m.revenue.as_deref(), Some("c6"));
    }

    #[test]
    fn test_narrow_unknown_sheet_gets_no_guess() {
        let h = headers(&["a", "b", "c"]);
        assert_eq!(suggest_mapping(&h, &[]), SuggestedMapping::default());
    }
}
