//! `history` handler: the gateway's resource-usage series.

use tabled::Tabled;

use fortiwatch_core::{FleetSnapshot, UsageSeries};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "Series")]
    name: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Samples")]
    samples: usize,
    #[tabled(rename = "Since")]
    since: String,
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.1}"))
}

fn series_row(series: &UsageSeries) -> SeriesRow {
    let values = series.points.iter().map(|p| p.value);
    let min = values.clone().reduce(f64::min);
    let max = values.reduce(f64::max);
    SeriesRow {
        name: series.name.clone(),
        current: fmt_value(series.current),
        min: fmt_value(min),
        max: fmt_value(max),
        samples: series.points.len(),
        since: series
            .points
            .iter()
            .map(|p| p.timestamp)
            .min()
            .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
    }
}

pub fn handle(snapshot: &FleetSnapshot, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(&global.output, &snapshot.usage, series_row, |s| {
        s.name.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use fortiwatch_core::model::UsagePoint;

    use super::*;

    #[test]
    fn row_summarises_points() {
        let series = UsageSeries {
            name: "cpu".into(),
            current: Some(12.0),
            points: vec![
                UsagePoint {
                    timestamp: Utc.timestamp_opt(1_700_000_060, 0).unwrap(),
                    value: 30.0,
                },
                UsagePoint {
                    timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                    value: 5.5,
                },
            ],
        };
        let row = series_row(&series);
        assert_eq!(row.min, "5.5");
        assert_eq!(row.max, "30.0");
        assert_eq!(row.samples, 2);
        assert_eq!(row.since, "2023-11-14 22:13");
    }
}
