use std::time::Duration;

use tracing::trace;

use crate::farm::RiskBand;
use crate::geo::{Coordinate, Viewport, meters_to_degrees};
use crate::map::{MapSurface, Overlay};
use crate::region::RegionCatalog;

/// Terminal characters are roughly twice as tall as they are wide.
const CHAR_ASPECT: f64 = 2.0;

fn band_char(band: RiskBand) -> char {
    match band {
        RiskBand::High => '#',
        RiskBand::Medium => '+',
        RiskBand::Low => '.',
    }
}

fn band_rank(ch: char) -> u8 {
    match ch {
        '#' => 3,
        '+' => 2,
        '.' => 1,
        _ => 0,
    }
}

/// A [`MapSurface`] that draws onto a character grid.
pub struct AsciiMap {
    width: usize,
    height: usize,
    viewport: Option<Viewport>,
    overlays: Vec<Overlay>,
    labels: Vec<(Coordinate, String)>,
    last_animation: Option<Duration>,
}

/// Projection from the (aspect-corrected) viewport onto grid cells.
struct Projection {
    min_lon: f64,
    max_lat: f64,
    lon_per_col: f64,
    lat_per_row: f64,
}

impl Projection {
    fn new(viewport: &Viewport, width: usize, height: usize) -> Self {
        let lon_range = viewport.span.longitude_delta();
        let lat_range = viewport.span.latitude_delta();

        // Widen whichever axis is short so cells come out square on screen
        let desired_lon = lat_range * (width as f64) / (height as f64) / CHAR_ASPECT;
        let desired_lat = lon_range * (height as f64) / (width as f64) * CHAR_ASPECT;
        let (final_lon_range, final_lat_range) = if desired_lon > lon_range {
            (desired_lon, lat_range)
        } else {
            (lon_range, desired_lat)
        };

        Self {
            min_lon: viewport.center.longitude - final_lon_range / 2.0,
            max_lat: viewport.center.latitude + final_lat_range / 2.0,
            lon_per_col: final_lon_range / width as f64,
            lat_per_row: final_lat_range / height as f64,
        }
    }

    fn cell(&self, point: &Coordinate) -> (isize, isize) {
        let col = ((point.longitude - self.min_lon) / self.lon_per_col).floor() as isize;
        let row = ((self.max_lat - point.latitude) / self.lat_per_row).floor() as isize;
        (row, col)
    }

    fn cell_center(&self, row: isize, col: isize) -> Coordinate {
        Coordinate::new(
            self.max_lat - (row as f64 + 0.5) * self.lat_per_row,
            self.min_lon + (col as f64 + 0.5) * self.lon_per_col,
        )
    }
}

impl AsciiMap {
    /// Region names from `catalog` are drawn as labels.
    pub fn new(width: usize, height: usize, catalog: &RegionCatalog) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            viewport: None,
            overlays: Vec::new(),
            labels: catalog
                .iter()
                .map(|r| (r.center, r.display_name.clone()))
                .collect(),
            last_animation: None,
        }
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    pub fn overlays(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn last_animation(&self) -> Option<Duration> {
        self.last_animation
    }

    pub fn legend() -> &'static str {
        "# high risk   + moderate risk   . low risk"
    }

    pub fn render(&self) -> String {
        let Some(viewport) = &self.viewport else {
            return "(no map position yet: pick a region or search for a place)".to_string();
        };
        let projection = Projection::new(viewport, self.width, self.height);
        let mut grid = vec![vec![' '; self.width]; self.height];

        for overlay in &self.overlays {
            self.paint_circle(&projection, overlay, &mut grid);
        }

        for (center, name) in &self.labels {
            let (row, col) = projection.cell(center);
            let start_col = col.saturating_sub(name.len() as isize / 2);
            for (j, ch) in name.chars().enumerate() {
                self.put(&mut grid, row, start_col.saturating_add(j as isize), |existing| {
                    if existing == ' ' { Some(ch) } else { None }
                });
            }
        }

        grid.iter()
            .map(|row| row.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn paint_circle(&self, projection: &Projection, overlay: &Overlay, grid: &mut [Vec<char>]) {
        let ch = band_char(overlay.band);
        let (r_lat, r_lon) = meters_to_degrees(overlay.radius_meters, overlay.center.latitude);
        let (row0, col0) = projection.cell(&overlay.center);

        // A circle smaller than a cell still shows up as one character
        let paint = |existing: char| {
            if band_rank(ch) > band_rank(existing) {
                Some(ch)
            } else {
                None
            }
        };
        self.put(grid, row0, col0, paint);

        // Only cells on the grid are visited, however large the circle.
        let row_reach = (r_lat / projection.lat_per_row).ceil() as isize;
        let col_reach = (r_lon / projection.lon_per_col).ceil() as isize;
        let rows = row0.saturating_sub(row_reach).max(0)
            ..=row0.saturating_add(row_reach).min(self.height as isize - 1);
        let cols = col0.saturating_sub(col_reach).max(0)
            ..=col0.saturating_add(col_reach).min(self.width as isize - 1);
        for row in rows {
            for col in cols.clone() {
                let c = projection.cell_center(row, col);
                let dy = (c.latitude - overlay.center.latitude) / r_lat;
                let dx = (c.longitude - overlay.center.longitude) / r_lon;
                if dx * dx + dy * dy <= 1.0 {
                    self.put(grid, row, col, paint);
                }
            }
        }
    }

    fn put(
        &self,
        grid: &mut [Vec<char>],
        row: isize,
        col: isize,
        decide: impl Fn(char) -> Option<char>,
    ) {
        if row < 0 || col < 0 || row as usize >= self.height || col as usize >= self.width {
            return;
        }
        let cell = &mut grid[row as usize][col as usize];
        if let Some(ch) = decide(*cell) {
            *cell = ch;
        }
    }
}

impl MapSurface for AsciiMap {
    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.last_animation = None;
    }

    fn animate_to(&mut self, viewport: Viewport, duration: Duration) {
        // A terminal has no frames to tween; land on the target directly.
        trace!(?duration, "animate_to");
        self.viewport = Some(viewport);
        self.last_animation = Some(duration);
    }

    fn render_overlays(&mut self, overlays: &[Overlay]) {
        self.overlays = overlays.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::ZoomSpan;

    fn overlay(lat: f64, lon: f64, level: u8) -> Overlay {
        let band = RiskBand::from_level(level);
        Overlay {
            farm_id: 1,
            center: Coordinate::new(lat, lon),
            radius_meters: f64::from(level) * 1000.0,
            band,
            fill_color: band.fill_color(),
            stroke_color: crate::map::OVERLAY_STROKE,
        }
    }

    fn map() -> AsciiMap {
        AsciiMap::new(80, 24, &RegionCatalog::embedded().unwrap())
    }

    #[test]
    fn renders_placeholder_without_viewport() {
        assert!(map().render().starts_with("(no map position"));
    }

    #[test]
    fn grid_has_requested_size() {
        let mut m = map();
        m.set_viewport(Viewport::new(Coordinate::new(60.0, 8.0), ZoomSpan::DEFAULT));
        let out = m.render();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 24);
        assert!(lines.iter().all(|l| l.chars().count() == 80));
        assert!(out.contains("Norway"));
    }

    #[test]
    fn overlays_use_band_characters() {
        let mut m = map();
        m.animate_to(
            Viewport::new(Coordinate::new(60.0, 8.0), ZoomSpan::DEFAULT),
            Duration::from_secs(1),
        );
        m.render_overlays(&[overlay(62.0, 5.0, 70), overlay(58.0, 11.0, 20)]);
        let out = m.render();
        assert!(out.contains('#'));
        assert!(out.contains('.'));
        assert!(!out.contains('+'));
        assert_eq!(m.last_animation(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn higher_band_wins_overlap() {
        let mut m = map();
        m.set_viewport(Viewport::new(Coordinate::new(60.0, 8.0), ZoomSpan::DEFAULT));
        m.render_overlays(&[overlay(59.0, 8.0, 90), overlay(59.0, 8.0, 10)]);
        let out = m.render();
        assert!(out.contains('#'));
        assert!(!out.contains('.'));
    }

    #[test]
    fn tiny_span_renders_promptly() {
        let mut m = map();
        let span = ZoomSpan::square(1e-9).unwrap();
        m.set_viewport(Viewport::new(Coordinate::new(60.0, 8.0), span));
        m.render_overlays(&[overlay(60.0, 8.0, 60), overlay(61.0, 9.0, 65)]);
        let out = m.render();
        assert_eq!(out.lines().count(), 24);
        assert!(out.lines().all(|l| l.chars().all(|c| c == '+')));
    }

    #[test]
    fn offscreen_overlays_are_clipped() {
        let mut m = map();
        m.set_viewport(Viewport::new(Coordinate::new(60.0, 8.0), ZoomSpan::DEFAULT));
        m.render_overlays(&[overlay(-33.9, 151.2, 90)]);
        assert!(!m.render().contains('#'));
    }
}
