use std::collections::BTreeMap;

use harq_lab_abstract::{MacNodeId, StatSample, StatsSink, Tick};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricPoint {
    pub tick: Tick,
    pub node: MacNodeId,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
}

/// Collects engine statistics as time series keyed by metric name
/// (`harqErrorRateDl`, `macDelayUl`, ...).
#[derive(Debug, Default)]
pub struct MetricStore {
    now: Tick,
    series: BTreeMap<String, Vec<MetricPoint>>,
    discarded: usize,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples recorded from now on are stamped with `tick`.
    pub fn set_time(&mut self, tick: Tick) {
        self.now = tick;
    }

    pub fn series(&self, name: &str) -> Option<&[MetricPoint]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn count(&self, name: &str) -> usize {
        self.series(name).map_or(0, <[MetricPoint]>::len)
    }

    pub fn mean(&self, name: &str) -> Option<f64> {
        let points = self.series(name)?;
        if points.is_empty() {
            return None;
        }
        Some(points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64)
    }

    /// PDUs dropped after their last failed attempt, all directions.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    pub fn summaries(&self) -> Vec<MetricSummary> {
        self.series
            .iter()
            .map(|(name, points)| MetricSummary {
                name: name.clone(),
                count: points.len(),
                mean: self.mean(name).unwrap_or(0.0),
            })
            .collect()
    }
}

impl StatsSink for MetricStore {
    fn record(&mut self, sample: StatSample) {
        if sample.metric.is_packet_loss() && sample.value > 0.0 {
            self.discarded += 1;
        }
        self.series
            .entry(sample.metric.name())
            .or_default()
            .push(MetricPoint {
                tick: self.now,
                node: sample.node,
                value: sample.value,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harq_lab_abstract::{Direction, Metric, MetricKind};

    #[test]
    fn aggregates_by_name_and_counts_discards() {
        let mut store = MetricStore::new();
        store.set_time(4);
        for value in [0.0, 1.0, 1.0, 0.0] {
            store.record(StatSample {
                metric: Metric::new(MetricKind::HarqErrorRate, Direction::Dl),
                node: MacNodeId(2),
                value,
            });
        }
        store.record(StatSample {
            metric: Metric::new(MetricKind::MacPacketLoss, Direction::Ul),
            node: MacNodeId(2),
            value: 1.0,
        });

        assert_eq!(store.mean("harqErrorRateDl"), Some(0.5));
        assert_eq!(store.count("harqErrorRateDl"), 4);
        assert_eq!(store.series("macPacketLossUl").unwrap()[0].tick, 4);
        assert_eq!(store.discarded(), 1);
        assert_eq!(store.mean("macDelayDl"), None);
        assert_eq!(store.summaries().len(), 2);
    }
}
