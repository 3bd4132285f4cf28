use ckpt_harness_summary_model::{Metric, MetricValue};

/// A named, case-sensitive substring that identifies a metric line in tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricMarker {
    pub name: &'static str,
    pub marker: &'static str,
}

/// Printed by the checkpoint tool once the guest program finishes.
pub const EXECUTION_TIME: MetricMarker = MetricMarker {
    name: "execution_time",
    marker: "Execution time:",
};

/// Every line of `output` that contains `marker`, in the order they appear.
pub fn extract_marker_lines<'a>(output: &'a str, marker: &str) -> Vec<&'a str> {
    output
        .lines()
        .filter(|line| line.contains(marker))
        .collect()
}

/// At most one metric per marker, taken from the first matching line.
///
/// The value is the raw line. Use [parse_seconds] to interpret it as a duration.
pub fn extract_metrics(output: &str, markers: &[MetricMarker]) -> Vec<Metric> {
    markers
        .iter()
        .filter_map(|marker| {
            extract_marker_lines(output, marker.marker)
                .first()
                .map(|line| Metric {
                    name: marker.name.to_string(),
                    marker: marker.marker.to_string(),
                    value: MetricValue::Text(line.trim_end().to_string()),
                })
        })
        .collect()
}

/// Parse the duration that follows `marker` in `line`, in seconds.
///
/// Accepts a number optionally followed by `s`, `ms` or `us`, e.g. `Execution time: 1.23s`.
pub fn parse_seconds(line: &str, marker: &str) -> Option<f64> {
    let (_, rest) = line.split_once(marker)?;
    let token = rest.split_whitespace().next()?;

    let (number, divisor) = if let Some(n) = token.strip_suffix("ms") {
        (n, 1_000.0)
    } else if let Some(n) = token.strip_suffix("us") {
        (n, 1_000_000.0)
    } else if let Some(n) = token.strip_suffix('s') {
        (n, 1.0)
    } else {
        (token, 1.0)
    };

    number.parse::<f64>().ok().map(|n| n / divisor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "Loading module test/bt.aot\n\
        Checkpoint requested\n\
        Execution time: 1.23s\n\
        Exiting\n";

    #[test]
    fn extracts_single_marker_line() {
        assert_eq!(
            extract_marker_lines(OUTPUT, EXECUTION_TIME.marker),
            vec!["Execution time: 1.23s"]
        );
    }

    #[test]
    fn no_marker_gives_empty() {
        assert!(extract_marker_lines("nothing to see\nhere", EXECUTION_TIME.marker).is_empty());
        assert!(extract_marker_lines("", EXECUTION_TIME.marker).is_empty());
    }

    #[test]
    fn marker_is_case_sensitive() {
        assert!(extract_marker_lines("execution time: 1s", EXECUTION_TIME.marker).is_empty());
    }

    #[test]
    fn every_matching_line_in_order() {
        let output = "Execution time: 1s\nother\nrestore Execution time: 2s\n";
        assert_eq!(
            extract_marker_lines(output, EXECUTION_TIME.marker),
            vec!["Execution time: 1s", "restore Execution time: 2s"]
        );
    }

    #[test]
    fn metric_uses_first_matching_line() {
        let output = "Execution time: 1s\r\nExecution time: 2s\n";
        let metrics = extract_metrics(output, &[EXECUTION_TIME]);
        assert_eq!(metrics.len(), 1);
        assert_eq!(
            metrics[0].value,
            MetricValue::Text("Execution time: 1s".to_string())
        );
        assert_eq!(metrics[0].name, "execution_time");
    }

    #[test]
    fn no_metric_without_marker() {
        assert!(extract_metrics("Segmentation fault", &[EXECUTION_TIME]).is_empty());
    }

    #[test]
    fn parse_seconds_units() {
        let m = EXECUTION_TIME.marker;
        assert_eq!(parse_seconds("Execution time: 1.23s", m), Some(1.23));
        assert_eq!(parse_seconds("Execution time: 1500ms", m), Some(1.5));
        assert_eq!(parse_seconds("Execution time: 42", m), Some(42.0));
        assert_eq!(parse_seconds("Execution time: 250us", m), Some(0.00025));
        assert_eq!(parse_seconds("Execution time: soon", m), None);
        assert_eq!(parse_seconds("Execution time:", m), None);
        assert_eq!(parse_seconds("no marker", m), None);
    }
}
