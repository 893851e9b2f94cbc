//! Minimal Prometheus-compatible metrics: counters and a latency
//! histogram, collected without an external metrics crate. Grounded on
//! the teacher's hand-rolled `MetricsRegistry` (atomics + a bucketed
//! histogram, text-rendered on demand) rather than pulling in a new
//! dependency for three gauges.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

#[derive(Debug, Default, Clone)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: Vec<(f64, Arc<AtomicU64>)>,
    sum_millis: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    fn new(bounds: &[f64]) -> Self {
        Self {
            buckets: bounds.iter().map(|b| (*b, Arc::new(AtomicU64::new(0)))).collect(),
            sum_millis: Arc::new(AtomicU64::new(0)),
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn observe(&self, value_ms: f64) {
        self.sum_millis.fetch_add((value_ms * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        for (bound, count) in &self.buckets {
            if value_ms <= *bound {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    fn sum(&self) -> f64 {
        self.sum_millis.load(Ordering::Relaxed) as f64 / 1000.0
    }
}

/// Measures wall time from construction to [`Timer::observe`].
pub struct Timer(Instant);

impl Timer {
    pub fn start() -> Self {
        Self(Instant::now())
    }

    pub fn observe(self, histogram: &Histogram) {
        histogram.observe(self.0.elapsed().as_secs_f64() * 1000.0);
    }
}

const LATENCY_BUCKETS_MS: &[f64] = &[50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0];

/// The counters and histograms §4.9 requires over `{requests, provider
/// calls, generation latency}`. Held once per process in [`AppState`](crate::http::AppState).
pub struct Metrics {
    pub http_requests_total: Counter,
    pub http_requests_failed_total: Counter,
    pub generation_latency_ms: Histogram,
    provider_calls: RwLock<HashMap<String, Counter>>,
    provider_errors: RwLock<HashMap<String, Counter>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            http_requests_total: Counter::default(),
            http_requests_failed_total: Counter::default(),
            generation_latency_ms: Histogram::new(LATENCY_BUCKETS_MS),
            provider_calls: RwLock::new(HashMap::new()),
            provider_errors: RwLock::new(HashMap::new()),
        }
    }
}

impl Metrics {
    pub fn record_provider_call(&self, provider: &str, succeeded: bool) {
        let map = if succeeded { &self.provider_calls } else { &self.provider_errors };
        if let Some(counter) = map.read().unwrap_or_else(|e| e.into_inner()).get(provider) {
            counter.inc();
            return;
        }
        let mut map = map.write().unwrap_or_else(|e| e.into_inner());
        map.entry(provider.to_string()).or_default().inc();
    }

    /// Renders the text exposition format `/metrics` returns.
    pub fn export_prometheus(&self) -> String {
        let mut out = String::new();

        out.push_str("# TYPE prompt_alchemy_http_requests_total counter\n");
        out.push_str(&format!("prompt_alchemy_http_requests_total {}\n", self.http_requests_total.get()));
        out.push_str("# TYPE prompt_alchemy_http_requests_failed_total counter\n");
        out.push_str(&format!("prompt_alchemy_http_requests_failed_total {}\n", self.http_requests_failed_total.get()));

        out.push_str("# TYPE prompt_alchemy_generation_latency_ms histogram\n");
        for (bound, count) in &self.generation_latency_ms.buckets {
            out.push_str(&format!(
                "prompt_alchemy_generation_latency_ms_bucket{{le=\"{bound}\"}} {}\n",
                count.load(Ordering::Relaxed)
            ));
        }
        out.push_str(&format!(
            "prompt_alchemy_generation_latency_ms_bucket{{le=\"+Inf\"}} {}\n",
            self.generation_latency_ms.count()
        ));
        out.push_str(&format!("prompt_alchemy_generation_latency_ms_sum {}\n", self.generation_latency_ms.sum()));
        out.push_str(&format!("prompt_alchemy_generation_latency_ms_count {}\n", self.generation_latency_ms.count()));

        out.push_str("# TYPE prompt_alchemy_provider_calls_total counter\n");
        for (name, counter) in self.provider_calls.read().unwrap_or_else(|e| e.into_inner()).iter() {
            out.push_str(&format!("prompt_alchemy_provider_calls_total{{provider=\"{name}\",outcome=\"ok\"}} {}\n", counter.get()));
        }
        for (name, counter) in self.provider_errors.read().unwrap_or_else(|e| e.into_inner()).iter() {
            out.push_str(&format!("prompt_alchemy_provider_calls_total{{provider=\"{name}\",outcome=\"error\"}} {}\n", counter.get()));
        }

        out
    }
}
