use crate::types::DensityRecord;
use serde::Serialize;

pub const PLACEHOLDER: &str = "Hover over a zone";

/// Attributes of a zone displayed in the info box.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoFields {
    pub zone: String,
    pub surface: f64,
    pub population: f64,
    pub population_density: f64,
    pub historic_center: bool,
}

impl From<&DensityRecord> for InfoFields {
    fn from(record: &DensityRecord) -> Self {
        Self {
            zone: record.zone.clone(),
            surface: record.surface,
            population: record.population,
            population_density: record.population_density,
            historic_center: record.historic_center,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum InfoState {
    #[default]
    Idle,
    Showing(InfoFields),
}

#[derive(Debug, Clone)]
pub struct InfoPanel {
    title: String,
    state: InfoState,
}

impl InfoPanel {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: InfoState::Idle,
        }
    }

    pub fn show(&mut self, fields: InfoFields) {
        self.state = InfoState::Showing(fields);
    }

    pub fn clear(&mut self) {
        self.state = InfoState::Idle;
    }

    pub fn state(&self) -> &InfoState {
        &self.state
    }

    pub fn render_html(&self) -> String {
        let mut html = format!("<h4>{}</h4>", escape_html(&self.title));
        match &self.state {
            InfoState::Idle => html.push_str(PLACEHOLDER),
            InfoState::Showing(data) => {
                html.push_str(&format!("<div><b>{}</b></div>", escape_html(&data.zone)));
                html.push_str(&format!(
                    "<div>Surface: <pre>{} Km<sup>2</sup></pre></div>",
                    data.surface
                ));
                html.push_str(&format!("<div>Population: <pre>{} Ab.</pre></div>", data.population));
                html.push_str(&format!(
                    "<div>Population density: <pre>{} Ab / Km<sup>2</sup></pre></div>",
                    data.population_density
                ));
                html.push_str(&format!("<div>History center: {}</div>", yes_no(data.historic_center)));
            }
        }
        html
    }

    pub fn render_text(&self) -> String {
        match &self.state {
            InfoState::Idle => format!("{}\n{}", self.title, PLACEHOLDER),
            InfoState::Showing(data) => format!(
                "{}\n{}\nSurface: {} Km2\nPopulation: {} Ab.\nPopulation density: {} Ab / Km2\nHistory center: {}",
                self.title,
                data.zone,
                data.surface,
                data.population,
                data.population_density,
                yes_no(data.historic_center),
            ),
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centro() -> InfoFields {
        InfoFields {
            zone: "Centro".to_string(),
            surface: 4.5,
            population: 36900.0,
            population_density: 8200.0,
            historic_center: true,
        }
    }

    #[test]
    fn starts_idle_with_placeholder() {
        let panel = InfoPanel::new("Bologna Population Density");
        assert_eq!(panel.state(), &InfoState::Idle);
        assert_eq!(panel.render_html(), "<h4>Bologna Population Density</h4>Hover over a zone");
    }

    #[test]
    fn show_then_clear() {
        let mut panel = InfoPanel::new("Density");
        panel.show(centro());
        assert_eq!(panel.state(), &InfoState::Showing(centro()));

        let html = panel.render_html();
        assert!(html.contains("<b>Centro</b>"));
        assert!(html.contains("<pre>4.5 Km<sup>2</sup></pre>"));
        assert!(html.contains("<pre>36900 Ab.</pre>"));
        assert!(html.contains("<pre>8200 Ab / Km<sup>2</sup></pre>"));
        assert!(html.contains("History center: Yes"));

        panel.clear();
        assert_eq!(panel.state(), &InfoState::Idle);
        assert!(panel.render_html().ends_with(PLACEHOLDER));
    }

    #[test]
    fn text_rendering_reports_flag() {
        let mut panel = InfoPanel::new("Density");
        let mut fields = centro();
        fields.historic_center = false;
        panel.show(fields);
        let text = panel.render_text();
        assert!(text.starts_with("Density\nCentro\n"));
        assert!(text.ends_with("History center: No"));
    }

    #[test]
    fn zone_names_are_escaped() {
        let mut panel = InfoPanel::new("Density");
        let mut fields = centro();
        fields.zone = "<script>".to_string();
        panel.show(fields);
        assert!(panel.render_html().contains("&lt;script&gt;"));
    }
}
