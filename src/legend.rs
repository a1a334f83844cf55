use crate::color::{Color, ColorScale};
use serde::Serialize;

/// One swatch of the legend: the range `(lower, upper]` and the color its
/// values are painted with. The last entry is open-ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub lower: f64,
    pub upper: Option<f64>,
    pub color: Color,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub entries: Vec<LegendEntry>,
}

impl Legend {
    pub fn from_scale(scale: &ColorScale) -> Self {
        let thresholds = scale.thresholds();
        let entries = thresholds
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let upper = thresholds.get(i + 1).map(|next| next.bound);
                let color = match upper {
                    Some(upper) => scale.color_for(upper),
                    None => t.color,
                };
                let label = match upper {
                    Some(upper) => format!("{}\u{2013}{}", t.bound, upper),
                    None => format!("{}+", t.bound),
                };
                LegendEntry {
                    lower: t.bound,
                    upper,
                    color,
                    label,
                }
            })
            .collect();

        Self { entries }
    }

    pub fn render_html(&self) -> String {
        self.entries
            .iter()
            .map(|e| match e.upper {
                Some(upper) => format!(
                    "<i style=\"background: {}\"></i> {}&ndash;{}<br>",
                    e.color, e.lower, upper
                ),
                None => format!("<i style=\"background: {}\"></i> {}+", e.color, e.lower),
            })
            .collect()
    }
}
