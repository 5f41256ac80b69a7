use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

static METRIC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 ()/%_.-]*?)\s*:\s*([-+]?\d+(?:\.\d+)?)").unwrap()
});

/// First number following `<field>:` in the load tool's text report.
///
/// Fails if no line carries the field; there is no fallback value.
pub fn extract_metric(output: &str, field: &str) -> Result<f64> {
    let pattern = format!(r"{}\s*:\s*([-+]?\d+(?:\.\d+)?)", regex::escape(field));
    let re = Regex::new(&pattern).context("Invalid metric field")?;

    for line in output.lines() {
        if let Some(caps) = re.captures(line) {
            return caps[1]
                .parse::<f64>()
                .context(format!("Unparseable value for {}", field));
        }
    }

    anyhow::bail!("No \"{}\" line in load tool output", field)
}

/// Every `<label>: <number>` line, in report order.
pub fn parse_report(output: &str) -> Vec<(String, f64)> {
    output
        .lines()
        .filter_map(|line| {
            let caps = METRIC_LINE.captures(line)?;
            let value = caps[2].parse::<f64>().ok()?;
            Some((caps[1].trim().to_string(), value))
        })
        .collect()
}
