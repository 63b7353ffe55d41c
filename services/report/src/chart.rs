//! Terminal bar charts for hourly peak series.
//!
//! Renders one chart per metric: a captioned block of `█` bars with a value
//! scale on the left and hour indices along the bottom. Series wider than
//! the chart are downsampled per column by maximum, so peaks survive.

/// Chart dimensions in terminal cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartGeometry {
    /// Total width including the value gutter.
    pub width: usize,
    /// Number of bar rows.
    pub height: usize,
}

impl Default for ChartGeometry {
    fn default() -> Self {
        Self {
            width: 96,
            height: 14,
        }
    }
}

/// Render one series as a captioned bar chart.
pub fn render(caption: &str, series: &[(i64, f64)], geometry: &ChartGeometry) -> String {
    let mut out = String::new();
    out.push_str(caption);
    out.push('\n');

    if series.is_empty() {
        out.push_str("  (no data)\n");
        return out;
    }

    let max = series.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);
    let scale = if max > 0.0 { max } else { 1.0 };
    let label_width = format!("{max:.1}").len().max(4);
    let columns = geometry.width.saturating_sub(label_width + 2).max(1);
    let bars = downsample(series, columns);

    for row in (1..=geometry.height).rev() {
        let threshold = scale * row as f64 / geometry.height as f64;
        let mut line = format!("{threshold:>label_width$.1} │");
        for &value in &bars {
            line.push(if value >= threshold { '█' } else { ' ' });
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out.push_str(&" ".repeat(label_width + 1));
    out.push('└');
    out.push_str(&"─".repeat(columns));
    out.push('\n');
    out.push_str(hour_labels(series, columns, label_width).trim_end());
    out.push('\n');
    out
}

/// Map `series` onto `columns` bars, taking the per-column maximum when the
/// series is wider than the chart and stretching it when narrower.
fn downsample(series: &[(i64, f64)], columns: usize) -> Vec<f64> {
    let n = series.len();
    let mut bars = Vec::with_capacity(columns);
    for col in 0..columns {
        let lo = col * n / columns;
        let hi = ((col + 1) * n / columns).max(lo + 1).min(n);
        let value = series[lo..hi]
            .iter()
            .map(|(_, v)| *v)
            .fold(0.0_f64, f64::max);
        bars.push(value);
    }
    bars
}

fn hour_labels(series: &[(i64, f64)], columns: usize, label_width: usize) -> String {
    let n = series.len();
    let mut labels = vec![' '; label_width + 2 + columns];
    let step = (columns / 8).max(1);
    let mut col = 0;
    while col < columns {
        let hour = series[col * n / columns].0.to_string();
        for (i, ch) in hour.chars().enumerate() {
            let pos = label_width + 2 + col + i;
            if pos < labels.len() {
                labels[pos] = ch;
            }
        }
        col += step;
    }
    labels.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_geometry() -> ChartGeometry {
        ChartGeometry {
            width: 20,
            height: 4,
        }
    }

    #[test]
    fn test_render_includes_caption_and_bars() {
        let series = vec![(0, 0.0), (1, 4.0)];
        let chart = render("Peak Streams", &series, &create_test_geometry());
        let lines: Vec<&str> = chart.lines().collect();

        assert_eq!(lines[0], "Peak Streams");
        assert!(lines[1].starts_with(" 4.0"));
        assert!(lines[1].contains('█'));
        assert!(chart.contains('└'));
    }

    #[test]
    fn test_peak_column_reaches_top_row() {
        let series = vec![(0, 1.0), (1, 2.0), (2, 4.0)];
        let chart = render("peaks", &series, &create_test_geometry());
        let top_row = chart.lines().nth(1).unwrap();
        let bottom_row = chart.lines().nth(4).unwrap();
        assert!(top_row.contains('█'));
        assert!(bottom_row.matches('█').count() > top_row.matches('█').count());
    }

    #[test]
    fn test_all_zero_series_renders_flat() {
        let series = vec![(0, 0.0), (1, 0.0)];
        let chart = render("flat", &series, &create_test_geometry());
        assert!(!chart.contains('█'));
        assert!(chart.contains('└'));
    }

    #[test]
    fn test_empty_series_renders_placeholder() {
        let chart = render("empty", &[], &create_test_geometry());
        assert!(chart.contains("(no data)"));
    }

    #[test]
    fn test_wide_series_downsamples_by_maximum() {
        // 100 hours into at most 20 cells; the single spike must survive.
        let mut series: Vec<(i64, f64)> = (0..100).map(|h| (h, 0.0)).collect();
        series[57].1 = 9.0;
        let bars = downsample(&series, 20);
        assert_eq!(bars.len(), 20);
        assert_eq!(bars.iter().copied().fold(0.0, f64::max), 9.0);
    }

    #[test]
    fn test_hour_labels_start_at_first_hour() {
        let series: Vec<(i64, f64)> = (0..24).map(|h| (h, 1.0)).collect();
        let labels = hour_labels(&series, 14, 4);
        assert!(labels.contains('0'));
    }
}
