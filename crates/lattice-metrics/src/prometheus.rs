//! Prometheus text exposition format.
//!
//! Renders merged metric families into the text format scraped from the
//! exporter endpoint: a `# HELP` and `# TYPE` line per metric, one data
//! line per series, and `_bucket`/`_count`/`_sum` lines for histograms.

use crate::snapshot::{LabelSet, MetricFamily, SeriesValue};

/// Render metric families into Prometheus exposition text.
///
/// Families and series are emitted in the order given; [`crate::Registry::collect`]
/// and the exporter's merge both produce sorted output, so rendering is
/// deterministic end to end.
pub fn render(families: &[MetricFamily]) -> String {
    let mut out = String::new();
    for family in families {
        out.push_str(&format!("# HELP {} {}\n", family.name, family.help));
        out.push_str(&format!("# TYPE {} {}\n", family.name, family.kind.as_str()));
        for point in &family.series {
            match &point.value {
                SeriesValue::Counter { total } => {
                    data_line(&mut out, &family.name, &point.labels, None, *total);
                }
                SeriesValue::Gauge { value, .. } => {
                    data_line(&mut out, &family.name, &point.labels, None, *value);
                }
                SeriesValue::Histogram { count, sum, buckets } => {
                    let bucket_name = format!("{}_bucket", family.name);
                    for bucket in buckets {
                        data_line(
                            &mut out,
                            &bucket_name,
                            &point.labels,
                            Some(&fmt_value(bucket.le)),
                            bucket.count as f64,
                        );
                    }
                    data_line(&mut out, &bucket_name, &point.labels, Some("+Inf"), *count as f64);
                    data_line(
                        &mut out,
                        &format!("{}_count", family.name),
                        &point.labels,
                        None,
                        *count as f64,
                    );
                    data_line(&mut out, &format!("{}_sum", family.name), &point.labels, None, *sum);
                }
            }
        }
    }
    out
}

/// One `name{labels} value` line; `le` is appended last when given.
fn data_line(out: &mut String, name: &str, labels: &LabelSet, le: Option<&str>, value: f64) {
    out.push_str(name);
    if !labels.is_empty() || le.is_some() {
        out.push('{');
        let mut first = true;
        for (key, val) in labels {
            if !first {
                out.push(',');
            }
            out.push_str(&format!("{key}=\"{}\"", escape(val)));
            first = false;
        }
        if let Some(le) = le {
            if !first {
                out.push(',');
            }
            out.push_str(&format!("le=\"{le}\""));
        }
        out.push('}');
    }
    out.push_str(&format!(" {}\n", fmt_value(value)));
}

/// Integral values render without a fractional part.
fn fmt_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
