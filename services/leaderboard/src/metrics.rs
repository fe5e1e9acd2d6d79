use serde::Serialize;

/// A rankable player statistic: its request key, the curated column holding
/// it, and a display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub key: &'static str,
    pub column: &'static str,
    pub label: &'static str,
}

const fn metric(key: &'static str, column: &'static str, label: &'static str) -> Metric {
    Metric { key, column, label }
}

pub const METRICS: [Metric; 14] = [
    metric("power", "power", "Power"),
    metric("killpoints", "killpoints", "Kill Points"),
    metric("deads", "deads", "Deaths"),
    metric("total_kills", "total kills", "Total Kills"),
    metric("t1_kills", "t1 kills", "T1 Kills"),
    metric("t2_kills", "t2 kills", "T2 Kills"),
    metric("t3_kills", "t3 kills", "T3 Kills"),
    metric("t4_kills", "t4 kills", "T4 Kills"),
    metric("t5_kills", "t5 kills", "T5 Kills"),
    metric("t45_kills", "t45 kills", "T4+T5 Kills"),
    metric("rss_gathered", "rss gathered", "RSS Gathered"),
    metric("rss_assistance", "rss assistance", "RSS Assistance"),
    metric("helps", "helps", "Helps"),
    metric("ranged", "ranged", "Ranged"),
];

pub fn find_metric(key: &str) -> Option<&'static Metric> {
    METRICS.iter().find(|metric| metric.key == key)
}

pub fn metric_column(key: &str) -> Option<&'static str> {
    find_metric(key).map(|metric| metric.column)
}
