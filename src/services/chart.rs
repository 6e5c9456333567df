use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::FontStyle;
use serde::Serialize;

use crate::models::{CustomerNutritionInfo, Nutrient, NutrientRange, RangePosition};

pub const CHART_SIZE: (u32, u32) = (1000, 2400);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hex(pub u8, pub u8, pub u8);

impl Hex {
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }

    fn rgb(&self) -> RGBColor {
        RGBColor(self.0, self.1, self.2)
    }
}

impl Serialize for Hex {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

pub const BELOW_COLOR: Hex = Hex(0xFF, 0x44, 0x44);
pub const ABOVE_COLOR: Hex = Hex(0xFF, 0xA5, 0x00);
const GUIDE_COLOR: Hex = Hex(0x66, 0x66, 0x66);
const BACKGROUND: Hex = Hex(0x1E, 0x1A, 0x30);
const TEXT_COLOR: Hex = Hex(0xE8, 0xE6, 0xF0);

pub struct SeriesConfig {
    pub nutrient: Nutrient,
    pub title: &'static str,
    pub color: Hex,
    pub unit: &'static str,
}

pub const SERIES: [SeriesConfig; 6] = [
    SeriesConfig { nutrient: Nutrient::Calories, title: "Calories", color: Hex(0xFF, 0x6B, 0x6B), unit: "kcal" },
    SeriesConfig { nutrient: Nutrient::Carbohydrates, title: "Carbohydrates", color: Hex(0xFF, 0xD9, 0x3D), unit: "g" },
    SeriesConfig { nutrient: Nutrient::Protein, title: "Protein", color: Hex(0x96, 0xE0, 0x72), unit: "g" },
    SeriesConfig { nutrient: Nutrient::Fat, title: "Fat", color: Hex(0xE8, 0xA2, 0xFF), unit: "g" },
    SeriesConfig { nutrient: Nutrient::Fiber, title: "Dietary Fiber", color: Hex(0x45, 0xB7, 0xD1), unit: "g" },
    SeriesConfig { nutrient: Nutrient::Sodium, title: "Sodium", color: Hex(0xFF, 0x8B, 0x94), unit: "mg" },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: String,
    pub value: f64,
}

/// A point outside the recommended band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    pub index: usize,
    pub value: f64,
    pub below: bool,
    pub color: Hex,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPanel {
    pub key: &'static str,
    pub title: &'static str,
    pub unit: &'static str,
    pub color: Hex,
    pub range: NutrientRange,
    pub points: Vec<ChartPoint>,
    pub highlights: Vec<Highlight>,
}

impl ChartPanel {
    fn new(config: &SeriesConfig, info: &CustomerNutritionInfo) -> Self {
        let range = info.recommended_nutrition.range(config.nutrient);

        // History arrives newest first; plot oldest to newest
        let points: Vec<ChartPoint> = info
            .recent_nutrition
            .iter()
            .rev()
            .map(|day| ChartPoint {
                date: day.date.format("%Y-%m-%d").to_string(),
                value: day.total(config.nutrient),
            })
            .collect();

        let highlights = points
            .iter()
            .enumerate()
            .filter_map(|(index, point)| {
                let (below, color) = match range.classify(point.value) {
                    RangePosition::Below => (true, BELOW_COLOR),
                    RangePosition::Above => (false, ABOVE_COLOR),
                    RangePosition::Within => return None,
                };
                Some(Highlight {
                    index,
                    value: point.value,
                    below,
                    color,
                    label: format!("{:.1}", point.value),
                })
            })
            .collect();

        Self {
            key: config.nutrient.key(),
            title: config.title,
            unit: config.unit,
            color: config.color,
            range,
            points,
            highlights,
        }
    }

    pub fn legend_label(&self) -> String {
        format!("{} ({})", self.title, self.unit)
    }

    pub fn band_label(&self) -> String {
        format!("Recommended ({}-{})", self.range.min, self.range.max)
    }

    fn y_bounds(&self) -> (f64, f64) {
        let (lo, hi) = self
            .points
            .iter()
            .map(|p| p.value)
            .fold((self.range.min, self.range.max), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let pad = if hi > lo { (hi - lo) * 0.1 } else { 1.0 };
        (lo - pad, hi + pad)
    }

    fn x_label(&self, x: f64) -> String {
        let rounded = x.round();
        if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
            return String::new();
        }
        self.points
            .get(rounded as usize)
            .map(|p| p.date.clone())
            .unwrap_or_default()
    }

    fn draw<DB: DrawingBackend>(&self, area: &DrawingArea<DB, Shift>) -> Result<()> {
        let text = TEXT_COLOR.rgb();
        let series = self.color.rgb();
        let band = WHITE.mix(0.1);
        let guide = GUIDE_COLOR.rgb().mix(0.5);

        let x_start = -0.5f64;
        let x_end = self.points.len().max(1) as f64 - 0.5;
        let (y_min, y_max) = self.y_bounds();

        let mut chart = ChartBuilder::on(area)
            .caption(self.title, ("sans-serif", 16, &text))
            .margin(20)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x_start..x_end, y_min..y_max)
            .map_err(plot_err)?;

        chart
            .configure_mesh()
            .x_labels(self.points.len().max(1))
            .x_label_formatter(&|x| self.x_label(*x))
            .x_desc("Date")
            .y_desc(self.unit)
            .label_style(("sans-serif", 12, &text))
            .axis_desc_style(("sans-serif", 14, &text))
            .bold_line_style(text.mix(0.1))
            .light_line_style(text.mix(0.0))
            .axis_style(text.mix(0.4))
            .draw()
            .map_err(plot_err)?;

        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x_start, self.range.min), (x_end, self.range.max)],
                band.filled(),
            )))
            .map_err(plot_err)?
            .label(self.band_label())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], band.filled()));

        for bound in [self.range.min, self.range.max] {
            chart
                .draw_series(LineSeries::new(
                    vec![(x_start, bound), (x_end, bound)],
                    guide.stroke_width(1),
                ))
                .map_err(plot_err)?;
        }

        let coords: Vec<(f64, f64)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, p.value))
            .collect();

        chart
            .draw_series(LineSeries::new(coords.clone(), series.stroke_width(2)))
            .map_err(plot_err)?
            .label(self.legend_label())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], series.stroke_width(2)));

        chart
            .draw_series(coords.iter().map(|&c| Circle::new(c, 4, series.filled())))
            .map_err(plot_err)?;

        for h in &self.highlights {
            let color = h.color.rgb();
            chart
                .draw_series(std::iter::once(
                    EmptyElement::at((h.index as f64, h.value))
                        + Circle::new((0, 0), 6, color.filled())
                        + Text::new(
                            h.label.clone(),
                            (6, -18),
                            ("sans-serif", 14).into_font().style(FontStyle::Bold).color(&color),
                        ),
                ))
                .map_err(plot_err)?;
        }

        chart
            .configure_series_labels()
            .background_style(BACKGROUND.rgb().mix(0.8))
            .border_style(text.mix(0.3))
            .label_font(("sans-serif", 12, &text))
            .draw()
            .map_err(plot_err)?;

        Ok(())
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("chart rendering failed: {}", e)
}

/// One panel per nutrient, stacked vertically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionChart {
    pub panels: Vec<ChartPanel>,
}

impl NutritionChart {
    pub fn build(info: &CustomerNutritionInfo) -> Self {
        Self {
            panels: SERIES.iter().map(|config| ChartPanel::new(config, info)).collect(),
        }
    }

    #[cfg(test)]
    pub fn panel(&self, nutrient: Nutrient) -> Option<&ChartPanel> {
        self.panels.iter().find(|p| p.key == nutrient.key())
    }

    pub fn render_svg(&self) -> Result<String> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
            root.fill(&BACKGROUND.rgb()).map_err(plot_err)?;

            let areas = root.split_evenly((self.panels.len().max(1), 1));
            for (panel, area) in self.panels.iter().zip(areas.iter()) {
                panel.draw(area)?;
            }

            root.present().map_err(plot_err)?;
        }
        Ok(svg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyNutrition, RecommendedNutrition};
    use chrono::NaiveDate;

    fn day(d: u32, calories: f64, sodium: f64) -> DailyNutrition {
        DailyNutrition {
            date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
            total_calories: calories,
            total_carbohydrates: 280.0,
            total_protein: 60.0,
            total_fat: 50.0,
            total_fiber: 25.0,
            total_sodium: sodium,
        }
    }

    fn info(days: Vec<DailyNutrition>) -> CustomerNutritionInfo {
        let r = NutrientRange::new;
        CustomerNutritionInfo {
            recent_nutrition: days,
            recommended_nutrition: RecommendedNutrition {
                calories: r(1800.0, 2200.0),
                carbohydrates: r(250.0, 325.0),
                protein: r(50.0, 70.0),
                fat: r(40.0, 65.0),
                fiber: r(20.0, 30.0),
                sodium: r(1500.0, 2000.0),
            },
        }
    }

    #[test]
    fn test_six_panels_in_fixed_order() {
        let chart = NutritionChart::build(&info(vec![day(3, 2000.0, 1800.0)]));

        let titles: Vec<&str> = chart.panels.iter().map(|p| p.title).collect();
        assert_eq!(
            titles,
            vec!["Calories", "Carbohydrates", "Protein", "Fat", "Dietary Fiber", "Sodium"]
        );
        assert_eq!(chart.panels[0].legend_label(), "Calories (kcal)");
        assert_eq!(chart.panels[5].band_label(), "Recommended (1500-2000)");
    }

    #[test]
    fn test_dates_are_ascending() {
        let chart = NutritionChart::build(&info(vec![
            day(3, 2000.0, 1800.0),
            day(2, 1900.0, 1700.0),
            day(1, 2100.0, 1600.0),
        ]));

        let panel = chart.panel(Nutrient::Calories).unwrap();
        let dates: Vec<&str> = panel.points.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-02", "2024-03-03"]);
        assert_eq!(panel.points[0].value, 2100.0);
    }

    #[test]
    fn test_in_range_values_have_no_highlights() {
        let chart = NutritionChart::build(&info(vec![day(2, 1800.0, 2000.0), day(1, 2200.0, 1500.0)]));

        for panel in &chart.panels {
            assert!(panel.highlights.is_empty(), "{} has highlights", panel.title);
        }
    }

    #[test]
    fn test_out_of_range_highlight_colors() {
        let chart = NutritionChart::build(&info(vec![day(2, 1500.0, 2500.0), day(1, 2000.0, 1800.0)]));

        let calories = chart.panel(Nutrient::Calories).unwrap();
        assert_eq!(calories.highlights.len(), 1);
        let low = &calories.highlights[0];
        assert!(low.below);
        assert_eq!(low.index, 1);
        assert_eq!(low.color.hex(), "#FF4444");
        assert_eq!(low.label, "1500.0");

        let sodium = chart.panel(Nutrient::Sodium).unwrap();
        assert_eq!(sodium.highlights.len(), 1);
        let high = &sodium.highlights[0];
        assert!(!high.below);
        assert_eq!(high.color.hex(), "#FFA500");
        assert_eq!(high.label, "2500.0");

        assert!(chart.panel(Nutrient::Protein).unwrap().highlights.is_empty());
    }

    #[test]
    fn test_empty_history_still_has_panels() {
        let chart = NutritionChart::build(&info(Vec::new()));

        assert_eq!(chart.panels.len(), 6);
        assert!(chart.panels.iter().all(|p| p.points.is_empty() && p.highlights.is_empty()));
        assert!(chart.render_svg().unwrap().contains("<svg"));
    }

    #[test]
    fn test_render_svg_contains_annotations() {
        let chart = NutritionChart::build(&info(vec![day(2, 1500.0, 2500.0), day(1, 2000.0, 1800.0)]));

        let svg = chart.render_svg().unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Dietary Fiber"));
        assert!(svg.contains("2500.0"));
        assert!(svg.contains("1500.0"));
    }

    #[test]
    fn test_x_labels_only_on_whole_indices() {
        let chart = NutritionChart::build(&info(vec![day(2, 2000.0, 1800.0), day(1, 2000.0, 1800.0)]));
        let panel = &chart.panels[0];

        assert_eq!(panel.x_label(0.0), "2024-03-01");
        assert_eq!(panel.x_label(1.0), "2024-03-02");
        assert_eq!(panel.x_label(0.5), "");
        assert_eq!(panel.x_label(5.0), "");
    }
}
