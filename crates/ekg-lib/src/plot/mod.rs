use serde::{Deserialize, Serialize};

use crate::metrics::ArrhythmiaReport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub radius: u32,
    pub color: Color,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Series {
    Line(LineSeries),
    Markers(MarkerSeries),
}

impl Series {
    pub fn points(&self) -> &[[f64; 2]] {
        match self {
            Series::Line(line) => &line.points,
            Series::Markers(markers) => &markers.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis { label: None },
            y: Axis { label: None },
            series: Vec::new(),
        }
    }

    pub fn add_series(&mut self, series: Series) {
        self.series.push(series);
    }

    /// `(x_min, x_max, y_min, y_max)` over all series, `None` for an empty figure.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.series.iter().flat_map(|s| s.points().iter());
        let first = points.next()?;
        let init = (first[0], first[0], first[1], first[1]);
        Some(points.fold(init, |(x0, x1, y0, y1), p| {
            (x0.min(p[0]), x1.max(p[0]), y0.min(p[1]), y1.max(p[1]))
        }))
    }
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

/// Signal trace plus markers at flagged samples. The x axis is in seconds when
/// the sampling rate is known and in sample indices otherwise.
pub fn figure_from_signal(
    samples: &[f64],
    sampling_rate: Option<f64>,
    flags: Option<&ArrhythmiaReport>,
    max_points: usize,
) -> Figure {
    let dt = sampling_rate.map(|fs| 1.0 / fs).unwrap_or(1.0);
    let points: Vec<[f64; 2]> = samples
        .iter()
        .enumerate()
        .map(|(i, value)| [i as f64 * dt, *value])
        .collect();
    let mut fig = Figure::new(Some("EKG signal".to_string()));
    fig.x.label = Some(if sampling_rate.is_some() {
        "time (s)".into()
    } else {
        "sample".into()
    });
    fig.y.label = Some("voltage (µV)".into());
    fig.add_series(Series::Line(LineSeries {
        name: "EKG".into(),
        points: decimate_points(&points, max_points),
        style: Style {
            width: 1.4,
            color: Color(0x1F77B4),
        },
    }));
    if let Some(report) = flags.filter(|r| r.count > 0) {
        let marked = report
            .indices
            .iter()
            .filter_map(|&i| points.get(i).copied())
            .collect();
        fig.add_series(Series::Markers(MarkerSeries {
            name: "flagged".into(),
            points: marked,
            radius: 3,
            color: Color(0xD62728),
        }));
    }
    fig
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::detect_arrhythmias;

    #[test]
    fn decimation_caps_point_count() {
        let points: Vec<[f64; 2]> = (0..5000).map(|i| [i as f64, 0.0]).collect();
        let out = decimate_points(&points, 1000);
        assert_eq!(out.len(), 1000);
        assert_eq!(out[0], [0.0, 0.0]);
    }

    #[test]
    fn signal_figure_uses_seconds_when_rate_known() {
        let samples = [0.0, 1.0, 2.0, 3.0];
        let fig = figure_from_signal(&samples, Some(2.0), None, 1024);
        assert_eq!(fig.series.len(), 1);
        assert_eq!(fig.series[0].points()[3], [1.5, 3.0]);
        assert_eq!(fig.x.label.as_deref(), Some("time (s)"));
        assert_eq!(fig.bounds(), Some((0.0, 1.5, 0.0, 3.0)));
    }

    #[test]
    fn flagged_samples_become_markers() {
        let samples = [0.0, 0.0, 0.0, 100.0, 0.0, 0.0, 0.0];
        let report = detect_arrhythmias(&samples, 1.5);
        let fig = figure_from_signal(&samples, None, Some(&report), 1024);
        assert_eq!(fig.series.len(), 2);
        match &fig.series[1] {
            Series::Markers(m) => assert_eq!(m.points, vec![[3.0, 100.0], [4.0, 0.0]]),
            other => panic!("expected markers, got {:?}", other),
        }
    }

    #[test]
    fn empty_figure_has_no_bounds() {
        assert!(Figure::new(None::<String>).bounds().is_none());
    }

    #[test]
    fn color_splits_channels() {
        assert_eq!(Color(0xD62728).rgb(), (0xD6, 0x27, 0x28));
    }
}
