//! Statsd payload encoding.
//!
//! A payload is a single metric in the form `<name>:<value>|<type>`, optionally followed by a sample rate
//! (`|@<rate>`) and tags (`|#<tags>`).

use std::fmt::Write as _;

use metrics::Label;

/// Statsd metric type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricType {
    /// A cumulative count.
    Counter,

    /// An instantaneous value.
    Gauge,

    /// A duration, or any other distribution of magnitudes.
    Timing,

    /// A unique-membership event.
    Set,
}

impl MetricType {
    /// Returns the wire suffix for this metric type.
    pub const fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "c",
            MetricType::Gauge => "g",
            MetricType::Timing => "ms",
            MetricType::Set => "s",
        }
    }

    /// Returns `true` if payloads of this type go through the sampler.
    pub const fn is_sampled(self) -> bool {
        matches!(self, MetricType::Counter | MetricType::Timing)
    }
}

/// Encodes a single metric as a statsd payload.
///
/// The value is written as a fixed-point decimal with six fractional digits. The name is written as-is: delimiter
/// characters (`:` and `|`) are not escaped, so a malformed name produces a malformed payload.
pub fn encode(name: &str, value: f64, metric_type: MetricType) -> String {
    let suffix = metric_type.as_str();

    // Six fractional digits, plus the separators, covers the common case without reallocating.
    let mut payload = String::with_capacity(name.len() + suffix.len() + 16);
    let _ = write!(payload, "{name}:{value:.6}|{suffix}");
    payload
}

/// Appends the given labels to the payload as DogStatsD-style tags.
///
/// Tags go last in the payload, after any sample rate annotation. Nothing is written when there are no labels.
pub fn append_tags<'a, I>(payload: &mut String, labels: I)
where
    I: IntoIterator<Item = &'a Label>,
{
    let mut wrote_tag = false;
    for label in labels {
        if wrote_tag {
            payload.push(',');
        } else {
            payload.push_str("|#");
            wrote_tag = true;
        }

        write_tag(payload, label);
    }
}

fn write_tag(buf: &mut String, label: &Label) {
    // If the label value is empty, we treat it as a bare label. This means all we write is something like
    // `label_name`, instead of a more naive form, like `label_name:`.
    buf.push_str(label.key());
    if label.value().is_empty() {
        return;
    }

    buf.push(':');
    buf.push_str(label.value());
}
